//! Exercises the public `packet::parse` entrypoint directly, independent of
//! flow/burst tracking.

use tunnel_analytics_core::packet;

fn tcp_client_hello_packet(server_name: &str) -> Vec<u8> {
    let mut hello = vec![0x03, 0x03];
    hello.extend_from_slice(&[0u8; 32]); // random
    hello.push(0x00); // session id len
    hello.extend_from_slice(&[0x00, 0x02, 0x13, 0x01]); // one cipher suite
    hello.push(0x01);
    hello.push(0x00); // one compression method

    let mut sni = vec![0x00]; // host_name type
    sni.extend_from_slice(&(server_name.len() as u16).to_be_bytes());
    sni.extend_from_slice(server_name.as_bytes());
    let mut sni_list = (sni.len() as u16).to_be_bytes().to_vec();
    sni_list.extend_from_slice(&sni);
    let mut sni_ext = vec![0x00, 0x00];
    sni_ext.extend_from_slice(&(sni_list.len() as u16).to_be_bytes());
    sni_ext.extend_from_slice(&sni_list);

    hello.extend_from_slice(&(sni_ext.len() as u16).to_be_bytes());
    hello.extend_from_slice(&sni_ext);

    let mut handshake = vec![0x01];
    let len = hello.len() as u32;
    handshake.extend_from_slice(&len.to_be_bytes()[1..]);
    handshake.extend_from_slice(&hello);

    let mut record = vec![0x16, 0x03, 0x01];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);

    let mut tcp = vec![0xea, 0x60, 0x01, 0xbb]; // ports 60000 -> 443
    tcp.extend_from_slice(&[0, 0, 0, 1]); // seq
    tcp.extend_from_slice(&[0, 0, 0, 0]); // ack
    tcp.push(0x50); // data offset 5 (20 bytes)
    tcp.push(0x18);
    tcp.extend_from_slice(&[0xff, 0xff]); // window
    tcp.extend_from_slice(&[0x00, 0x00]); // checksum
    tcp.extend_from_slice(&[0x00, 0x00]); // urgent ptr
    tcp.extend_from_slice(&record);

    let total_len = 20 + tcp.len();
    let mut ip = vec![0x45, 0x00];
    ip.extend_from_slice(&(total_len as u16).to_be_bytes());
    ip.extend_from_slice(&[0, 0, 0, 0]);
    ip.push(64);
    ip.push(6);
    ip.extend_from_slice(&[0, 0]);
    ip.extend_from_slice(&[10, 0, 0, 9]);
    ip.extend_from_slice(&[93, 184, 216, 34]);
    ip.extend_from_slice(&tcp);
    ip
}

#[test]
fn tcp_packet_carrying_a_client_hello_yields_sni_and_registrable_domain() {
    let metadata = packet::parse(&tcp_client_hello_packet("www.example.com"), None).unwrap();
    assert_eq!(metadata.tls_server_name.as_deref(), Some("www.example.com"));
    assert_eq!(metadata.registrable_domain.as_deref(), Some("example.com"));
    assert_eq!(metadata.src_port, Some(60000));
    assert_eq!(metadata.dst_port, Some(443));
}

#[test]
fn ipv6_packet_with_hop_by_hop_header_still_reaches_the_udp_header() {
    // 40-byte fixed header, next_header = 0 (Hop-by-Hop), then an 8-byte
    // extension header (hdr_ext_len = 0 -> 8 bytes total) whose own
    // next_header points at UDP (17).
    let mut packet = vec![0x60, 0, 0, 0];
    let udp_len: u16 = 8;
    packet.extend_from_slice(&udp_len.to_be_bytes());
    packet.push(0); // next header: hop-by-hop
    packet.push(64); // hop limit
    packet.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]); // src
    packet.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]); // dst

    packet.push(17); // hop-by-hop's next header: UDP
    packet.push(0); // hdr ext len 0 -> (0+1)*8 = 8 bytes total
    packet.extend_from_slice(&[0u8; 6]);

    packet.extend_from_slice(&[0x30, 0x39, 0x00, 0x35]); // ports 12345 -> 53
    packet.extend_from_slice(&8u16.to_be_bytes());
    packet.extend_from_slice(&[0, 0]);

    let metadata = packet::parse(&packet, None).unwrap();
    assert_eq!(metadata.ip_version, 6);
    assert_eq!(metadata.transport, 17);
    assert_eq!(metadata.src_port, Some(12345));
    assert_eq!(metadata.dst_port, Some(53));
}

#[test]
fn quic_initial_long_header_exposes_version_and_connection_ids_even_without_matching_keys() {
    // A structurally valid v1 Initial header whose payload isn't a real
    // AEAD ciphertext; decryption fails quietly and SNI stays absent, but
    // version/type/connection-id metadata is still reported.
    let mut packet = vec![0xC3]; // long header, fixed bit, Initial (00), pn_len-1 bits
    packet.extend_from_slice(&1u32.to_be_bytes()); // version 1
    packet.push(8); // dcid len
    packet.extend_from_slice(&[0xAA; 8]);
    packet.push(0); // scid len
    packet.push(0); // token len varint (0)
    packet.push(0x40);
    packet.push(64); // remainder length varint (2-byte form, value 64)
    packet.extend_from_slice(&[0u8; 64]);

    let metadata = packet::parse(&packet, None).unwrap();
    assert_eq!(metadata.quic_version, Some(1));
    assert_eq!(metadata.quic_packet_type, Some(packet::QuicPacketType::Initial));
    assert!(metadata.quic_destination_connection_id.is_some());
    assert!(metadata.tls_server_name.is_none());
}

#[test]
fn truncated_ipv4_header_fails_soft() {
    assert!(packet::parse(&[0x45, 0x00, 0x00], None).is_none());
}
