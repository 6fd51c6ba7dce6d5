//! QUIC long-header decoding, spec.md §4.1 step 5: packet-type mapping,
//! connection ID extraction, and (Initial packets only) a hand-off into
//! `quic_crypto` for header-protection removal and AEAD decryption.

use super::{quic_crypto, PacketMetadata, QuicPacketType};

const VERSION_1: u32 = 0x0000_0001;
const VERSION_2: u32 = 0x6b33_43cf;

pub(super) fn parse(payload: &[u8], metadata: &mut PacketMetadata) {
    if payload.len() < 5 {
        log::trace!("quic: {} bytes, too short for a long header", payload.len());
        return;
    }
    let first = payload[0];
    if first & 0x80 == 0 {
        // Short header: no connection state here to identify the
        // destination connection, so nothing further can be attributed.
        return;
    }
    let version = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    if version == 0 {
        return; // Version Negotiation packet, not a long-header data packet.
    }

    let mut pos = 5;
    let Some(dcid_len) = payload.get(pos).copied() else { return };
    pos += 1;
    let dcid_end = pos + dcid_len as usize;
    if dcid_end > payload.len() {
        return;
    }
    let dcid = &payload[pos..dcid_end];
    pos = dcid_end;

    let Some(scid_len) = payload.get(pos).copied() else { return };
    pos += 1;
    let scid_end = pos + scid_len as usize;
    if scid_end > payload.len() {
        return;
    }
    let scid = &payload[pos..scid_end];
    pos = scid_end;

    let type_bits = (first >> 4) & 0x03;
    let packet_type = match (version, type_bits) {
        (VERSION_1, 0) => QuicPacketType::Initial,
        (VERSION_1, 1) => QuicPacketType::ZeroRtt,
        (VERSION_1, 2) => QuicPacketType::Handshake,
        (VERSION_1, 3) => QuicPacketType::Retry,
        (VERSION_2, 0) => QuicPacketType::Retry,
        (VERSION_2, 1) => QuicPacketType::Initial,
        (VERSION_2, 2) => QuicPacketType::ZeroRtt,
        (VERSION_2, 3) => QuicPacketType::Handshake,
        _ => {
            log::debug!("quic: version {version:#x} not recognized as QUICv1 or QUICv2, can't map packet type bits");
            return;
        }
    };

    metadata.quic_version = Some(version);
    metadata.quic_packet_type = Some(packet_type);
    metadata.quic_destination_connection_id = Some(hex_encode(dcid));
    metadata.quic_source_connection_id = Some(hex_encode(scid));

    if packet_type == QuicPacketType::Retry {
        return; // No packet number or length field to walk past.
    }

    let token_len = if packet_type == QuicPacketType::Initial {
        let Some((len, next)) = read_varint(payload, pos) else { return };
        pos = next;
        let token_end = pos + len as usize;
        if token_end > payload.len() {
            return;
        }
        pos = token_end;
        len
    } else {
        0
    };
    let _ = token_len;

    let Some((remainder_len, after_length)) = read_varint(payload, pos) else { return };
    let packet_number_offset = after_length;
    let remainder_end = after_length + remainder_len as usize;
    if remainder_end > payload.len() {
        return;
    }

    // Only Initial packets use a key derivable from the connection ID alone;
    // 0-RTT and Handshake keys require state from earlier in the handshake
    // this parser never observes, so they are left undecrypted.
    if packet_type == QuicPacketType::Initial {
        if let Some(server_name) = quic_crypto::decrypt_initial_and_extract_sni(
            payload,
            packet_number_offset,
            remainder_end,
            dcid,
            version,
        ) {
            metadata.registrable_domain = super::registrable_domain_heuristic(&server_name);
            metadata.tls_server_name = Some(server_name);
        }
    }
}

/// Reads a QUIC variable-length integer (RFC 9000 §16) at `pos`.
pub(super) fn read_varint(data: &[u8], pos: usize) -> Option<(u64, usize)> {
    let first = *data.get(pos)?;
    let len = 1usize << (first >> 6);
    if pos + len > data.len() {
        return None;
    }
    let mut value = (first & 0x3F) as u64;
    for i in 1..len {
        value = (value << 8) | data[pos + i] as u64;
    }
    Some((value, pos + len))
}

fn hex_encode(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}
