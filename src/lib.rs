#![doc = include_str!("../README.md")]

pub mod addr;
pub mod burst;
pub mod cache_metrics;
pub mod classify;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod flow;
pub mod metrics_store;
pub mod packet;
pub mod protocol;
pub mod ring_buffer;
pub mod sample;
pub mod sample_stream;
pub mod signatures;

pub use addr::IpAddress;
pub use burst::{BurstTracker, BurstTrackerStats};
pub use cache_metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use classify::{ClassifierStats, TrafficClassifier};
pub use config::{AnalyticsConfig, AnalyticsConfigBuilder};
pub use core::{AnalyticsCore, AnalyticsCoreBuilder};
pub use events::{AnalyticsEvent, EventHooks};
pub use flow::{FlowTracker, FlowTrackerStats, UNTRACKED_FLOW_ID};
pub use metrics_store::{MetricsSnapshot, MetricsStore, StoreFormat};
pub use packet::{IpVersionHint, PacketMetadata, QuicPacketType};
pub use ring_buffer::MetricsRingBuffer;
pub use sample::{BurstMetrics, Direction, PacketSample, TrafficClassification};
pub use sample_stream::{PacketSampleStream, StreamCursor};
pub use signatures::{AppSignature, AppSignatureStore, SignatureLoadError};
