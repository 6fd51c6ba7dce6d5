//! `AnalyticsCore` — the facade wiring the parser through flow/burst
//! tracking, classification, and persistence, per spec.md §5.
//!
//! Mirrors the teacher's `NetflowParser`/`NetflowParserBuilder` split: a
//! lenient [`AnalyticsCoreBuilder`] assembles a fully-configured core from
//! an [`AnalyticsConfig`] and an on-disk directory, and [`AnalyticsCore`]
//! itself exposes one entrypoint, [`AnalyticsCore::on_packet`], plus
//! inspection methods for the ring buffer, sample stream, and signature
//! catalog. Every stage runs synchronously on the calling thread — no
//! suspension points, per spec.md §5 — and internal state is behind coarse
//! per-component locks so the whole facade is `Send + Sync`.

use crate::burst::BurstTracker;
use crate::classify::TrafficClassifier;
use crate::config::AnalyticsConfig;
use crate::error::SignatureValidationError;
use crate::events::{AnalyticsEvent, EventHooks};
use crate::flow::FlowTracker;
use crate::metrics_store::{MetricsSnapshot, MetricsStore};
use crate::packet::{self, IpVersionHint};
use crate::ring_buffer::MetricsRingBuffer;
use crate::sample::{Direction, PacketSample};
use crate::sample_stream::{PacketSampleStream, StreamCursor};
use crate::signatures::{AppSignature, AppSignatureStore};
use log::warn;
use std::path::PathBuf;
use std::sync::Mutex;

/// Builder assembling an [`AnalyticsCore`] from a config and a working
/// directory. Loading the signature catalog never fails the build: a
/// missing or invalid file just starts the classifier with an empty
/// catalog and raises [`AnalyticsEvent::SignatureReloadFailed`] on the
/// registered hooks.
pub struct AnalyticsCoreBuilder {
    config: AnalyticsConfig,
    base_dir: PathBuf,
    events: EventHooks,
}

impl AnalyticsCoreBuilder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: AnalyticsConfig::default(),
            base_dir: base_dir.into(),
            events: EventHooks::new(),
        }
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_config(mut self, config: AnalyticsConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn on_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AnalyticsEvent) + Send + Sync + 'static,
    {
        self.events.register(hook);
        self
    }

    pub fn build(self) -> AnalyticsCore {
        let signature_path = self.base_dir.join(&self.config.signature_file_name);
        let signature_store = match AppSignatureStore::open(signature_path.clone(), self.config.signature_check_interval_secs) {
            Ok(store) => Some(store),
            Err(e) => {
                self.events.trigger(AnalyticsEvent::SignatureReloadFailed {
                    reason: e.to_string(),
                });
                None
            }
        };

        let mut classifier = TrafficClassifier::new(
            self.config.max_classifier_entries,
            self.config.classifier_ttl_seconds,
            self.events.clone(),
        );
        if let Some(store) = &signature_store {
            classifier.set_signatures(store.signatures().to_vec());
        }

        let sample_stream = if self.config.packet_stream_enabled {
            Some(PacketSampleStream::new(
                self.base_dir.join("packet_samples.ndjson"),
                self.config.packet_stream_max_bytes,
            ))
        } else {
            None
        };

        let metrics_store = MetricsStore::new(
            self.base_dir.join("metrics_snapshots.log"),
            self.config.metrics_store_format,
            4096,
            self.config.packet_stream_max_bytes,
        );

        AnalyticsCore {
            flows: Mutex::new(FlowTracker::new(
                self.config.max_tracked_flows,
                self.config.flow_ttl_seconds,
                self.events.clone(),
            )),
            bursts: Mutex::new(BurstTracker::new(
                self.config.max_bursts,
                self.config.burst_threshold_ms,
                self.events.clone(),
            )),
            classifier: Mutex::new(classifier),
            signature_store: Mutex::new(signature_store),
            ring_buffer: MetricsRingBuffer::new(self.config.metrics_ring_buffer_size),
            sample_stream,
            metrics_store,
            last_snapshot_at: Mutex::new(None),
            signature_path,
            config: self.config,
            events: self.events,
        }
    }
}

/// A running analytics pipeline for one tunnel interface. Cheap to share
/// across threads behind an `Arc` — every method takes `&self`.
pub struct AnalyticsCore {
    config: AnalyticsConfig,
    flows: Mutex<FlowTracker>,
    bursts: Mutex<BurstTracker>,
    classifier: Mutex<TrafficClassifier>,
    signature_store: Mutex<Option<AppSignatureStore>>,
    ring_buffer: MetricsRingBuffer,
    sample_stream: Option<PacketSampleStream>,
    metrics_store: MetricsStore,
    last_snapshot_at: Mutex<Option<f64>>,
    signature_path: PathBuf,
    events: EventHooks,
}

impl AnalyticsCore {
    pub fn builder(base_dir: impl Into<PathBuf>) -> AnalyticsCoreBuilder {
        AnalyticsCoreBuilder::new(base_dir)
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Decodes `bytes`, attaches flow/burst/classification state, and
    /// records the result in the ring buffer and (if enabled) the sample
    /// stream. Returns `None` if `bytes` does not decode as a recognized IP
    /// packet — the soft-fail policy of spec.md §7 means this is a normal
    /// outcome for non-IP or truncated captures, not an error.
    pub fn on_packet(
        &self,
        bytes: &[u8],
        ip_version_hint: Option<IpVersionHint>,
        direction: Direction,
        timestamp: f64,
    ) -> Option<PacketSample> {
        let metadata = packet::parse(bytes, ip_version_hint)?;

        self.reload_signatures_if_due(timestamp);

        let flow_id = self.flows.lock().unwrap_or_else(|e| e.into_inner()).record(&metadata, timestamp);
        let (burst_id, burst_metrics) = self
            .bursts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(flow_id, metadata.length, timestamp);
        let classification = self
            .classifier
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .classify(&metadata, direction, timestamp);

        let mut sample = PacketSample::from_metadata(metadata, timestamp, direction, flow_id, burst_id);
        sample.burst_metrics = Some(burst_metrics);
        sample.traffic_classification = classification;

        self.ring_buffer.append(sample.clone());
        if let Some(stream) = &self.sample_stream {
            if let Err(e) = stream.append(&sample) {
                warn!("packet sample stream append failed, dropping sample: {e}");
            }
        }

        self.maybe_snapshot_metrics(timestamp);

        Some(sample)
    }

    fn reload_signatures_if_due(&self, timestamp: f64) {
        let mut guard = self.signature_store.lock().unwrap_or_else(|e| e.into_inner());
        let Some(store) = guard.as_mut() else {
            return;
        };
        if store.maybe_reload(timestamp) {
            self.classifier
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .set_signatures(store.signatures().to_vec());
        }
    }

    fn maybe_snapshot_metrics(&self, timestamp: f64) {
        let mut last = self.last_snapshot_at.lock().unwrap_or_else(|e| e.into_inner());
        let due = match *last {
            None => true,
            Some(prev) => timestamp - prev >= self.config.metrics_snapshot_interval_secs as f64,
        };
        if !due {
            return;
        }
        *last = Some(timestamp);
        drop(last);

        let snapshot = MetricsSnapshot {
            timestamp,
            tracked_flows: self.flows.lock().unwrap_or_else(|e| e.into_inner()).len() as u64,
            tracked_bursts: self.bursts.lock().unwrap_or_else(|e| e.into_inner()).len() as u64,
            classifier_cache_entries: self.classifier.lock().unwrap_or_else(|e| e.into_inner()).len() as u64,
            ring_buffer_len: self.ring_buffer.len() as u64,
        };
        if let Err(e) = self.metrics_store.append(&snapshot) {
            warn!("metrics snapshot append failed: {e}");
        }
    }

    /// Installs a new signature catalog, validating it first and persisting
    /// it to the configured signature file so it survives a restart.
    pub fn install_signatures(&self, signatures: Vec<AppSignature>) -> Result<(), SignatureValidationError> {
        crate::signatures::validate(&signatures)?;
        self.classifier
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_signatures(signatures.clone());

        let _ = AppSignatureStore::write(&self.signature_path, &signatures);
        let mut guard = self.signature_store.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some(store) => store.adopt(signatures),
            None => {
                if let Ok(store) = AppSignatureStore::open(
                    self.signature_path.clone(),
                    self.config.signature_check_interval_secs,
                ) {
                    *guard = Some(store);
                }
            }
        }
        Ok(())
    }

    pub fn ring_buffer_snapshot(&self, limit: Option<usize>) -> Vec<PacketSample> {
        self.ring_buffer.snapshot(limit)
    }

    pub fn flow_tracker_stats(&self) -> crate::flow::FlowTrackerStats {
        self.flows.lock().unwrap_or_else(|e| e.into_inner()).stats()
    }

    pub fn burst_tracker_stats(&self) -> crate::burst::BurstTrackerStats {
        self.bursts.lock().unwrap_or_else(|e| e.into_inner()).stats()
    }

    pub fn classifier_stats(&self) -> crate::classify::ClassifierStats {
        self.classifier.lock().unwrap_or_else(|e| e.into_inner()).stats()
    }

    /// Reads samples appended to the on-disk stream since `cursor`. Returns
    /// an empty batch if the sample stream was disabled in configuration.
    pub fn read_new_samples(&self, cursor: Option<StreamCursor>) -> Option<(Vec<PacketSample>, StreamCursor)> {
        self.sample_stream.as_ref().map(|s| s.read_new(cursor))
    }

    pub fn all_persisted_samples(&self) -> Vec<PacketSample> {
        self.sample_stream.as_ref().map(|s| s.read_all()).unwrap_or_default()
    }

    pub fn metrics_history(&self) -> Vec<MetricsSnapshot> {
        self.metrics_store.load()
    }

    /// Closes the on-disk sample stream. Idempotent; a no-op if the stream
    /// was disabled.
    pub fn close(&self) {
        if let Some(stream) = &self.sample_stream {
            stream.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::IpAddress;

    fn udp_dns_query_packet() -> Vec<u8> {
        // IPv4 + UDP header wrapping a minimal DNS query for "example.com".
        let mut dns = vec![
            0x12, 0x34, // id
            0x01, 0x00, // flags: standard query
            0x00, 0x01, // qdcount
            0x00, 0x00, // ancount
            0x00, 0x00, // nscount
            0x00, 0x00, // arcount
        ];
        for label in ["example", "com"] {
            dns.push(label.len() as u8);
            dns.extend_from_slice(label.as_bytes());
        }
        dns.push(0x00);
        dns.extend_from_slice(&[0x00, 0x01]); // qtype A
        dns.extend_from_slice(&[0x00, 0x01]); // qclass IN

        let udp_len = 8 + dns.len();
        let mut udp = vec![
            0xd2, 0x04, // src port 53764
            0x00, 0x35, // dst port 53
        ];
        udp.extend_from_slice(&(udp_len as u16).to_be_bytes());
        udp.extend_from_slice(&[0x00, 0x00]); // checksum
        udp.extend_from_slice(&dns);

        let total_len = 20 + udp.len();
        let mut ip = vec![
            0x45, 0x00, // version/ihl, dscp
        ];
        ip.extend_from_slice(&(total_len as u16).to_be_bytes());
        ip.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // id, flags/frag
        ip.push(64); // ttl
        ip.push(17); // udp
        ip.extend_from_slice(&[0x00, 0x00]); // checksum
        ip.extend_from_slice(&[10, 0, 0, 1]);
        ip.extend_from_slice(&[8, 8, 8, 8]);
        ip.extend_from_slice(&udp);
        ip
    }

    #[test]
    fn on_packet_decodes_tracks_and_classifies_a_dns_query() {
        let dir = tempfile::tempdir().unwrap();
        let core = AnalyticsCore::builder(dir.path()).build();
        let sample = core
            .on_packet(&udp_dns_query_packet(), None, Direction::Outbound, 1.0)
            .unwrap();
        assert_eq!(sample.dns_query_name.as_deref(), Some("example.com"));
        assert_eq!(sample.dst_address, IpAddress::v4([8, 8, 8, 8]));
        assert!(sample.flow_id > 0);
        assert_eq!(sample.burst_metrics.unwrap().packet_count, 1);
        assert_eq!(core.ring_buffer_snapshot(None).len(), 1);
    }

    #[test]
    fn malformed_bytes_yield_none_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let core = AnalyticsCore::builder(dir.path()).build();
        assert!(core.on_packet(&[], None, Direction::Outbound, 0.0).is_none());
        assert!(core.ring_buffer_snapshot(None).is_empty());
    }

    #[test]
    fn build_succeeds_without_a_signature_file_and_rejects_an_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let core = AnalyticsCore::builder(dir.path()).build();
        let result = core.install_signatures(vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn installed_signature_is_picked_up_by_the_next_classification() {
        let dir = tempfile::tempdir().unwrap();
        let core = AnalyticsCore::builder(dir.path()).build();
        core.install_signatures(vec![AppSignature {
            label: "Resolver".to_string(),
            domains: vec!["*.example.com".to_string()],
        }])
        .unwrap();

        let sample = core
            .on_packet(&udp_dns_query_packet(), None, Direction::Outbound, 1.0)
            .unwrap();
        let classification = sample.traffic_classification.unwrap();
        assert_eq!(classification.label.as_deref(), Some("Resolver"));
    }

    #[test]
    fn tracker_stats_reflect_a_single_packet() {
        let dir = tempfile::tempdir().unwrap();
        let core = AnalyticsCore::builder(dir.path()).build();
        core.on_packet(&udp_dns_query_packet(), None, Direction::Outbound, 1.0);
        assert_eq!(core.flow_tracker_stats().created, 1);
        assert_eq!(core.burst_tracker_stats().created, 1);
        assert_eq!(core.classifier_stats().created, 1);
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let core = AnalyticsCore::builder(dir.path()).build();
        core.close();
        core.close();
    }
}
