//! IPv6 header decoding and extension-header chain walk, spec.md §4.1 step 3.

use super::{tcp, udp, PacketMetadata};
use crate::addr::IpAddress;
use crate::protocol::is_ipv6_extension_header;

const FIXED_HEADER_LEN: usize = 40;
/// Bound on extension headers walked per packet, guarding against a
/// pathological chain that never reaches a real upper-layer header.
const MAX_EXTENSION_HEADERS: usize = 8;

pub(super) fn parse(bytes: &[u8]) -> Option<PacketMetadata> {
    if bytes.len() < FIXED_HEADER_LEN {
        log::trace!("ipv6: {} bytes, shorter than the fixed 40-byte header", bytes.len());
        return None;
    }
    let payload_len = u16::from_be_bytes([bytes[4], bytes[5]]) as u32;
    let mut next_header = bytes[6];
    let src = IpAddress::v6(bytes[8..24].try_into().ok()?);
    let dst = IpAddress::v6(bytes[24..40].try_into().ok()?);

    let mut offset = FIXED_HEADER_LEN;
    let mut hops = 0;
    while is_ipv6_extension_header(next_header) {
        hops += 1;
        if hops > MAX_EXTENSION_HEADERS || offset + 2 > bytes.len() {
            log::debug!("ipv6: extension header chain exceeded {MAX_EXTENSION_HEADERS} hops or ran past the buffer");
            return None;
        }
        let this_next_header = bytes[offset];
        let ext_len = if next_header == 44 {
            // Fragment header: fixed 8 bytes total.
            8usize
        } else if next_header == 51 {
            // AH: length field counts 4-byte words, minus 2, per RFC 4302.
            (bytes[offset + 1] as usize + 2) * 4
        } else {
            // Hop-by-hop / routing / destination options: length field counts
            // 8-byte units, not including the first 8 bytes.
            (bytes[offset + 1] as usize + 1) * 8
        };
        if ext_len == 0 || offset + ext_len > bytes.len() {
            log::trace!("ipv6: extension header length {ext_len} invalid or runs past the buffer");
            return None;
        }
        offset += ext_len;
        next_header = this_next_header;
    }

    let total_length = FIXED_HEADER_LEN as u32 + payload_len;
    let mut metadata =
        PacketMetadata::new(6, next_header, src, dst, total_length.max(bytes.len() as u32));
    let payload = &bytes[offset..];

    match next_header {
        6 => tcp::parse(payload, &mut metadata),
        17 => udp::parse(payload, &mut metadata),
        _ => {}
    }

    Some(metadata)
}
