//! TCP header decoding and inline TLS ClientHello/SNI detection, spec.md
//! §4.1 step 4.

use super::{tls, PacketMetadata};

const FIXED_HEADER_LEN: usize = 20;
const TLS_CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const TLS_HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;

pub(super) fn parse(payload: &[u8], metadata: &mut PacketMetadata) {
    if payload.len() < FIXED_HEADER_LEN {
        log::trace!("tcp: {} bytes, shorter than the fixed 20-byte header", payload.len());
        return;
    }
    let data_offset_words = payload[12] >> 4;
    let header_len = data_offset_words as usize * 4;
    if data_offset_words < 5 || payload.len() < header_len {
        log::trace!("tcp: data offset {data_offset_words} words invalid for a {}-byte segment", payload.len());
        return;
    }

    metadata.src_port = Some(u16::from_be_bytes([payload[0], payload[1]]));
    metadata.dst_port = Some(u16::from_be_bytes([payload[2], payload[3]]));

    let segment = &payload[header_len..];
    match sniff_client_hello_sni(segment) {
        Some(server_name) => {
            metadata.registrable_domain = super::registrable_domain_heuristic(&server_name);
            metadata.tls_server_name = Some(server_name);
        }
        None => log::trace!("tcp: segment is not a single-segment TLS ClientHello with SNI"),
    }
}

/// Looks for a single TLS handshake record carrying a ClientHello and, if
/// found, extracts its SNI server name. A ClientHello spanning multiple TCP
/// segments is not reassembled — each segment is inspected independently.
fn sniff_client_hello_sni(segment: &[u8]) -> Option<String> {
    if segment.len() < 9 || segment[0] != TLS_CONTENT_TYPE_HANDSHAKE {
        return None;
    }
    let record_len = u16::from_be_bytes([segment[3], segment[4]]) as usize;
    let record_end = 5 + record_len;
    if record_end > segment.len() {
        return None;
    }
    let handshake = &segment[5..record_end];
    if handshake.len() < 4 || handshake[0] != TLS_HANDSHAKE_TYPE_CLIENT_HELLO {
        return None;
    }
    let body_len = u32::from_be_bytes([0, handshake[1], handshake[2], handshake[3]]) as usize;
    let body_end = 4 + body_len;
    if body_end > handshake.len() {
        return None;
    }
    tls::parse_client_hello(&handshake[4..body_end])
}
