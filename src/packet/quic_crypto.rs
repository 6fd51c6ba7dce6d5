//! QUIC Initial packet header-protection removal and AEAD decryption, per
//! RFC 9001 (QUIC v1) and RFC 9369 (QUIC v2), plus CRYPTO frame reassembly
//! far enough to recover a ClientHello's SNI extension.
//!
//! Only Initial packets are handled: their keys derive from the destination
//! connection ID alone, which is all this stateless parser ever sees.

use super::quic::read_varint;
use super::tls;
use ring::{aead, hkdf};

const INITIAL_SALT_V1: [u8; 20] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c, 0xad,
    0xcc, 0xbb, 0x7f, 0x0a,
];
const INITIAL_SALT_V2: [u8; 20] = [
    0x0d, 0xed, 0xe3, 0xde, 0xf7, 0x00, 0xa6, 0xdb, 0x81, 0x93, 0x81, 0xbe, 0x6e, 0x26, 0x9d, 0xcb,
    0xf9, 0xbd, 0x2e, 0xd9,
];
const VERSION_1: u32 = 0x0000_0001;
const VERSION_2: u32 = 0x6b33_43cf;
const SAMPLE_LEN: usize = 16;
const FRAME_TYPE_PADDING: u8 = 0x00;
const FRAME_TYPE_PING: u8 = 0x01;
const FRAME_TYPE_ACK: u8 = 0x02;
const FRAME_TYPE_ACK_ECN: u8 = 0x03;
const FRAME_TYPE_CRYPTO: u8 = 0x06;

struct OutputLen(usize);

impl hkdf::KeyType for OutputLen {
    fn len(&self) -> usize {
        self.0
    }
}

fn expand_label(prk: &hkdf::Prk, label: &[u8], length: usize) -> Option<Vec<u8>> {
    let mut info = Vec::with_capacity(2 + 1 + 6 + label.len() + 1);
    info.extend_from_slice(&(length as u16).to_be_bytes());
    info.push((6 + label.len()) as u8);
    info.extend_from_slice(b"tls13 ");
    info.extend_from_slice(label);
    info.push(0); // no context
    let okm = prk.expand(&[&info], OutputLen(length)).ok()?;
    let mut out = vec![0u8; length];
    okm.fill(&mut out).ok()?;
    Some(out)
}

/// Derives the client-direction Initial key, IV, and header-protection key
/// for `version`, keyed on the destination connection ID of the first
/// Initial packet of the connection.
fn client_initial_keys(dcid: &[u8], version: u32) -> Option<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let (salt, key_label, iv_label, hp_label): (&[u8], &[u8], &[u8], &[u8]) = match version {
        VERSION_1 => (&INITIAL_SALT_V1, b"quic key", b"quic iv", b"quic hp"),
        VERSION_2 => (&INITIAL_SALT_V2, b"quicv2 key", b"quicv2 iv", b"quicv2 hp"),
        _ => return None,
    };

    let initial_secret = hkdf::Salt::new(hkdf::HKDF_SHA256, salt).extract(dcid);
    let client_secret_bytes = expand_label(&initial_secret, b"client in", 32)?;
    let client_secret = hkdf::Prk::new_less_safe(hkdf::HKDF_SHA256, &client_secret_bytes);

    let key = expand_label(&client_secret, key_label, 16)?;
    let iv = expand_label(&client_secret, iv_label, 12)?;
    let hp = expand_label(&client_secret, hp_label, 16)?;
    Some((key, iv, hp))
}

fn build_nonce(iv: &[u8], packet_number: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(iv);
    let pn_bytes = packet_number.to_be_bytes();
    for i in 0..8 {
        nonce[4 + i] ^= pn_bytes[i];
    }
    nonce
}

/// Removes header protection and opens the AEAD payload of the Initial
/// packet occupying `packet[..remainder_end]`, then scans the decrypted
/// frames for a CRYPTO frame carrying a ClientHello and returns its SNI.
pub(super) fn decrypt_initial_and_extract_sni(
    packet: &[u8],
    packet_number_offset: usize,
    remainder_end: usize,
    dcid: &[u8],
    version: u32,
) -> Option<String> {
    let (key_bytes, iv_bytes, hp_bytes) = client_initial_keys(dcid, version)?;

    let hp_key = aead::quic::HeaderProtectionKey::new(&aead::quic::AES_128, &hp_bytes).ok()?;
    let sample_offset = packet_number_offset + 4;
    if sample_offset + SAMPLE_LEN > packet.len() {
        return None;
    }
    let mut sample = [0u8; SAMPLE_LEN];
    sample.copy_from_slice(&packet[sample_offset..sample_offset + SAMPLE_LEN]);
    let mask = hp_key.new_mask(sample).ok()?;

    let mut buf = packet[..remainder_end].to_vec();
    buf[0] ^= mask[0] & 0x0F; // long header: only the low 4 bits are protected
    let pn_len = ((buf[0] & 0x03) + 1) as usize;
    if packet_number_offset + pn_len > buf.len() {
        return None;
    }
    for i in 0..pn_len {
        buf[packet_number_offset + i] ^= mask[1 + i];
    }
    let mut packet_number: u64 = 0;
    for i in 0..pn_len {
        packet_number = (packet_number << 8) | buf[packet_number_offset + i] as u64;
    }

    let payload_start = packet_number_offset + pn_len;
    if payload_start > buf.len() {
        return None;
    }

    let unbound = aead::UnboundKey::new(&aead::AES_128_GCM, &key_bytes).ok()?;
    let less_safe = aead::LessSafeKey::new(unbound);
    let nonce = aead::Nonce::assume_unique_for_key(build_nonce(&iv_bytes, packet_number));
    let aad_bytes = buf[..payload_start].to_vec();
    let aad = aead::Aad::from(aad_bytes.as_slice());
    let mut in_out = buf[payload_start..].to_vec();
    let plaintext = match less_safe.open_in_place(nonce, aad, &mut in_out) {
        Ok(plaintext) => plaintext,
        Err(_) => {
            log::debug!("quic: Initial AEAD open failed, dropping payload decode");
            return None;
        }
    };

    let crypto_data = extract_crypto_data(plaintext);
    if crypto_data.len() < 4 || crypto_data[0] != 1 {
        log::trace!("quic: CRYPTO frame data is not a reassembled ClientHello");
        return None;
    }
    let body_len =
        u32::from_be_bytes([0, crypto_data[1], crypto_data[2], crypto_data[3]]) as usize;
    let body_end = 4 + body_len;
    if body_end > crypto_data.len() {
        return None;
    }
    tls::parse_client_hello(&crypto_data[4..body_end])
}

/// Walks decrypted frames, collecting CRYPTO frame data and reassembling it
/// in offset order. Stops (returning what it has so far) at the first frame
/// type it doesn't know how to skip — good enough for a single Initial
/// datagram, which never needs full connection-level frame support.
fn extract_crypto_data(payload: &[u8]) -> Vec<u8> {
    let mut pos = 0usize;
    let mut chunks: Vec<(u64, &[u8])> = Vec::new();

    while pos < payload.len() {
        match payload[pos] {
            FRAME_TYPE_PADDING | FRAME_TYPE_PING => pos += 1,
            FRAME_TYPE_CRYPTO => {
                pos += 1;
                let Some((offset, p1)) = read_varint(payload, pos) else { break };
                let Some((length, p2)) = read_varint(payload, p1) else { break };
                let end = p2 + length as usize;
                if end > payload.len() {
                    break;
                }
                chunks.push((offset, &payload[p2..end]));
                pos = end;
            }
            frame_type @ (FRAME_TYPE_ACK | FRAME_TYPE_ACK_ECN) => {
                pos += 1;
                let Some(after) = skip_ack_frame(payload, pos, frame_type == FRAME_TYPE_ACK_ECN)
                else {
                    break;
                };
                pos = after;
            }
            _ => break,
        }
    }

    chunks.sort_by_key(|(offset, _)| *offset);
    let mut assembled = Vec::new();
    for (offset, data) in chunks {
        let offset = offset as usize;
        if offset == assembled.len() {
            assembled.extend_from_slice(data);
        } else if offset < assembled.len() {
            let overlap = assembled.len() - offset;
            if overlap < data.len() {
                assembled.extend_from_slice(&data[overlap..]);
            }
        } else {
            break; // gap: can't reassemble across reordered frames here
        }
    }
    assembled
}

fn skip_ack_frame(payload: &[u8], pos: usize, ecn: bool) -> Option<usize> {
    let (_, p) = read_varint(payload, pos)?; // largest acknowledged
    let (_, p) = read_varint(payload, p)?; // ack delay
    let (range_count, mut p) = read_varint(payload, p)?;
    let (_, next) = read_varint(payload, p)?; // first ack range
    p = next;
    for _ in 0..range_count {
        let (_, next) = read_varint(payload, p)?; // gap
        let (_, next) = read_varint(payload, next)?; // ack range length
        p = next;
    }
    if ecn {
        for _ in 0..3 {
            let (_, next) = read_varint(payload, p)?;
            p = next;
        }
    }
    Some(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_varint(value: u64) -> Vec<u8> {
        if value < 0x40 {
            vec![value as u8]
        } else if value < 0x4000 {
            let v = (value as u16) | 0x4000;
            v.to_be_bytes().to_vec()
        } else {
            panic!("test helper only supports small varints");
        }
    }

    fn build_crypto_frame(data: &[u8]) -> Vec<u8> {
        let mut frame = vec![FRAME_TYPE_CRYPTO];
        frame.extend_from_slice(&encode_varint(0)); // offset
        frame.extend_from_slice(&encode_varint(data.len() as u64));
        frame.extend_from_slice(data);
        frame
    }

    fn build_client_hello_crypto_data(server_name: &str) -> Vec<u8> {
        let body = tls::tests::client_hello_body_with_sni(server_name);
        let mut handshake = vec![1u8]; // ClientHello
        let len = body.len() as u32;
        handshake.extend_from_slice(&len.to_be_bytes()[1..]);
        handshake.extend_from_slice(&body);
        handshake
    }

    /// Builds a real Initial packet with the production key schedule, then
    /// decrypts it with the production function — a round trip self-check
    /// in place of hand-copied RFC test vectors, which can't be verified
    /// without running the toolchain.
    fn build_encrypted_initial_packet(dcid: &[u8], version: u32, server_name: &str) -> Vec<u8> {
        let (key_bytes, iv_bytes, hp_bytes) = client_initial_keys(dcid, version).unwrap();

        let handshake = build_client_hello_crypto_data(server_name);
        let crypto_frame = build_crypto_frame(&handshake);
        let mut frame_payload = crypto_frame;
        while frame_payload.len() < 1200 - 64 {
            frame_payload.push(FRAME_TYPE_PADDING);
        }

        let packet_number: u64 = 2;
        let pn_len = 1usize;
        let nonce = aead::Nonce::assume_unique_for_key(build_nonce(&iv_bytes, packet_number));
        let unbound = aead::UnboundKey::new(&aead::AES_128_GCM, &key_bytes).unwrap();
        let less_safe = aead::LessSafeKey::new(unbound);

        let mut header = vec![0xC0]; // long header + fixed bit, Initial type, pn_len=1
        header.extend_from_slice(&version.to_be_bytes());
        header.push(dcid.len() as u8);
        header.extend_from_slice(dcid);
        header.push(0); // empty scid
        header.push(0); // empty token
        let remainder_len = pn_len + frame_payload.len() + 16; // + AEAD tag
        header.extend_from_slice(&encode_varint(remainder_len as u64));
        let packet_number_offset = header.len();
        header.push(packet_number as u8);

        let aad = aead::Aad::from(header.as_slice());
        let mut in_out = frame_payload.clone();
        let tag = less_safe.seal_in_place_separate_tag(nonce, aad, &mut in_out).unwrap();
        in_out.extend_from_slice(tag.as_ref());

        let mut packet = header.clone();
        packet.extend_from_slice(&in_out);

        let hp_key = aead::quic::HeaderProtectionKey::new(&aead::quic::AES_128, &hp_bytes).unwrap();
        let sample_offset = packet_number_offset + 4;
        let mut sample = [0u8; SAMPLE_LEN];
        sample.copy_from_slice(&packet[sample_offset..sample_offset + SAMPLE_LEN]);
        let mask = hp_key.new_mask(sample).unwrap();
        packet[0] ^= mask[0] & 0x0F;
        packet[packet_number_offset] ^= mask[1];

        packet
    }

    #[test]
    fn round_trip_recovers_sni_from_self_built_initial_packet() {
        let dcid = [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];
        let packet = build_encrypted_initial_packet(&dcid, VERSION_1, "decrypted.example");

        // Recompute the same offsets the production long-header walk would.
        let packet_number_offset = 1 + 4 + 1 + dcid.len() + 1 + 1 + 2;
        let remainder_end = packet.len();

        let sni = decrypt_initial_and_extract_sni(
            &packet,
            packet_number_offset,
            remainder_end,
            &dcid,
            VERSION_1,
        );
        assert_eq!(sni.as_deref(), Some("decrypted.example"));
    }

    #[test]
    fn unknown_version_yields_no_keys() {
        assert!(client_initial_keys(&[1, 2, 3, 4], 0xdead_beef).is_none());
    }
}
