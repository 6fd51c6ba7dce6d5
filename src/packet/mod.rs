//! `PacketParser` — decodes a single raw IP frame into `PacketMetadata`.
//!
//! Pure, stateless, and fails soft: malformed input yields `None` rather than
//! an error, per spec.md §4.1 and the soft-fail policy in §7.

mod dns;
mod ipv4;
mod ipv6;
mod quic;
mod quic_crypto;
mod tcp;
mod tls;

use crate::addr::IpAddress;
use serde::{Deserialize, Serialize};

/// QUIC long-header packet type, version-mapped per spec.md §4.1 step 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuicPacketType {
    Initial,
    #[serde(rename = "zeroRTT")]
    ZeroRtt,
    Handshake,
    Retry,
}

/// Hint for which IP version to assume when the first byte's high nibble is
/// ambiguous (never actually ambiguous for valid IPv4/IPv6, but a packet
/// below one byte has no nibble to read at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersionHint {
    V4,
    V6,
}

/// Parser output for a single packet, before flow/burst/classification
/// tracking is attached (see `PacketSample`).
#[derive(Debug, Clone, PartialEq)]
pub struct PacketMetadata {
    pub ip_version: u8,
    pub transport: u8,
    pub src_address: IpAddress,
    pub dst_address: IpAddress,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub length: u32,
    pub dns_query_name: Option<String>,
    pub dns_cname: Option<String>,
    pub dns_answer_addresses: Option<Vec<IpAddress>>,
    pub registrable_domain: Option<String>,
    pub tls_server_name: Option<String>,
    pub quic_version: Option<u32>,
    pub quic_packet_type: Option<QuicPacketType>,
    pub quic_destination_connection_id: Option<String>,
    pub quic_source_connection_id: Option<String>,
}

impl PacketMetadata {
    pub(crate) fn new(ip_version: u8, transport: u8, src: IpAddress, dst: IpAddress, length: u32) -> Self {
        Self {
            ip_version,
            transport,
            src_address: src,
            dst_address: dst,
            src_port: None,
            dst_port: None,
            length,
            dns_query_name: None,
            dns_cname: None,
            dns_answer_addresses: None,
            registrable_domain: None,
            tls_server_name: None,
            quic_version: None,
            quic_packet_type: None,
            quic_destination_connection_id: None,
            quic_source_connection_id: None,
        }
    }
}

/// Two rightmost labels of a DNS name — the documented eTLD+1 heuristic of
/// spec.md §4.1/§9 (not a real public-suffix-list lookup).
pub(crate) fn registrable_domain_heuristic(name: &str) -> Option<String> {
    let labels: Vec<&str> = name.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }
    Some(labels[labels.len() - 2..].join("."))
}

/// Decodes a single raw IP packet.
///
/// `ip_version_hint` is consulted only when the packet is non-empty but its
/// first byte's high nibble is neither 4 nor 6 (should not happen for a real
/// IP packet, but malformed/truncated captures can land here).
pub fn parse(bytes: &[u8], ip_version_hint: Option<IpVersionHint>) -> Option<PacketMetadata> {
    let first = *bytes.first()?;
    let version_nibble = first >> 4;
    let version = match version_nibble {
        4 => 4,
        6 => 6,
        _ => match ip_version_hint {
            Some(IpVersionHint::V4) => 4,
            Some(IpVersionHint::V6) => 6,
            None => return None,
        },
    };

    match version {
        4 => ipv4::parse(bytes),
        6 => ipv6::parse(bytes),
        _ => unreachable!(),
    }
}
