//! IPv4 header decoding, spec.md §4.1 step 2.

use super::{tcp, udp, PacketMetadata};
use crate::addr::IpAddress;

const MIN_IHL_WORDS: u8 = 5;

pub(super) fn parse(bytes: &[u8]) -> Option<PacketMetadata> {
    if bytes.len() < 20 {
        log::trace!("ipv4: {} bytes, shorter than the fixed 20-byte header", bytes.len());
        return None;
    }
    let ihl_words = bytes[0] & 0x0F;
    if ihl_words < MIN_IHL_WORDS {
        log::trace!("ipv4: IHL {ihl_words} below minimum of {MIN_IHL_WORDS}");
        return None;
    }
    let header_len = ihl_words as usize * 4;
    if bytes.len() < header_len {
        log::trace!("ipv4: header claims {header_len} bytes, only {} present", bytes.len());
        return None;
    }

    let total_length = u16::from_be_bytes([bytes[2], bytes[3]]) as u32;
    let protocol = bytes[9];
    let src = IpAddress::v4([bytes[12], bytes[13], bytes[14], bytes[15]]);
    let dst = IpAddress::v4([bytes[16], bytes[17], bytes[18], bytes[19]]);

    let mut metadata = PacketMetadata::new(4, protocol, src, dst, total_length.max(bytes.len() as u32));
    let payload = &bytes[header_len..];

    match protocol {
        6 => tcp::parse(payload, &mut metadata),
        17 => udp::parse(payload, &mut metadata),
        _ => {}
    }

    Some(metadata)
}
