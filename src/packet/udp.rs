//! UDP header decoding and dispatch to DNS/QUIC, spec.md §4.1 step 4.

use super::{dns, quic, PacketMetadata};

const HEADER_LEN: usize = 8;
const DNS_PORT: u16 = 53;

pub(super) fn parse(payload: &[u8], metadata: &mut PacketMetadata) {
    if payload.len() < HEADER_LEN {
        log::trace!("udp: {} bytes, shorter than the fixed 8-byte header", payload.len());
        return;
    }
    let src_port = u16::from_be_bytes([payload[0], payload[1]]);
    let dst_port = u16::from_be_bytes([payload[2], payload[3]]);
    metadata.src_port = Some(src_port);
    metadata.dst_port = Some(dst_port);

    let body = &payload[HEADER_LEN..];
    if src_port == DNS_PORT || dst_port == DNS_PORT {
        dns::parse(body, metadata);
    } else {
        quic::parse(body, metadata);
    }
}
