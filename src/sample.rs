//! `PacketSample` and the aggregates attached to it by the tracking stages.
//!
//! This is the wire schema of spec.md §6: one JSON object per NDJSON line in
//! `PacketSampleStream`, and the element type of `MetricsRingBuffer`.

use crate::addr::IpAddress;
use crate::packet::{PacketMetadata, QuicPacketType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Per-(flow, burst) counters and derived throughput, per spec.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstMetrics {
    pub packet_count: u64,
    pub byte_count: u64,
    pub duration_ms: u64,
    pub packets_per_second: f64,
    pub bytes_per_second: f64,
}

/// Best-effort application classification of a flow, per spec.md §4.4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficClassification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// One parsed, tracked, and (optionally) classified packet — the unit handed
/// to `MetricsRingBuffer`, `PacketSampleStream`, and `MetricsStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketSample {
    pub timestamp: f64,
    pub direction: Direction,
    pub ip_version: u8,
    pub transport: u8,
    pub length: u32,
    pub flow_id: u64,
    pub burst_id: u64,
    pub src_address: IpAddress,
    pub dst_address: IpAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_query_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_cname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_answer_addresses: Option<Vec<IpAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrable_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quic_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quic_packet_type: Option<QuicPacketType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quic_destination_connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quic_source_connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst_metrics: Option<BurstMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_classification: Option<TrafficClassification>,
}

impl PacketSample {
    /// Builds a sample from parser output plus the tracking fields assigned
    /// by `FlowTracker`/`BurstTracker`. Burst metrics and classification are
    /// filled in afterward by the caller (see `AnalyticsCore::on_packet`).
    pub fn from_metadata(
        metadata: PacketMetadata,
        timestamp: f64,
        direction: Direction,
        flow_id: u64,
        burst_id: u64,
    ) -> Self {
        Self {
            timestamp,
            direction,
            ip_version: metadata.ip_version,
            transport: metadata.transport,
            length: metadata.length,
            flow_id,
            burst_id,
            src_address: metadata.src_address,
            dst_address: metadata.dst_address,
            src_port: metadata.src_port,
            dst_port: metadata.dst_port,
            dns_query_name: metadata.dns_query_name,
            dns_cname: metadata.dns_cname,
            dns_answer_addresses: metadata.dns_answer_addresses,
            registrable_domain: metadata.registrable_domain,
            tls_server_name: metadata.tls_server_name,
            quic_version: metadata.quic_version,
            quic_packet_type: metadata.quic_packet_type,
            quic_destination_connection_id: metadata.quic_destination_connection_id,
            quic_source_connection_id: metadata.quic_source_connection_id,
            burst_metrics: None,
            traffic_classification: None,
        }
    }
}
