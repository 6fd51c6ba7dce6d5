//! DNS message parsing: query name, first CNAME target, and A/AAAA answer
//! addresses, per spec.md §4.1 step 4.
//!
//! Name decoding follows RFC 1035 compression pointers with a jump cap, so a
//! message crafted with a pointer cycle fails soft instead of looping.

use super::PacketMetadata;
use crate::addr::IpAddress;

const HEADER_LEN: usize = 12;
const MAX_POINTER_JUMPS: u32 = 10;
const TYPE_A: u16 = 1;
const TYPE_CNAME: u16 = 5;
const TYPE_AAAA: u16 = 28;

pub(super) fn parse(body: &[u8], metadata: &mut PacketMetadata) {
    if body.len() < HEADER_LEN {
        log::trace!("dns: {} bytes, shorter than the fixed 12-byte header", body.len());
        return;
    }
    let qdcount = u16::from_be_bytes([body[4], body[5]]);
    let ancount = u16::from_be_bytes([body[6], body[7]]);

    let mut pos = HEADER_LEN;
    let mut query_name = None;
    for _ in 0..qdcount {
        let Some((name, next)) = read_name(body, pos) else {
            return;
        };
        pos = next;
        if query_name.is_none() {
            query_name = Some(name);
        }
        if pos + 4 > body.len() {
            return;
        }
        pos += 4; // qtype + qclass
    }

    if let Some(name) = &query_name {
        metadata.registrable_domain = super::registrable_domain_heuristic(name);
        metadata.dns_query_name = Some(name.clone());
    }

    let mut cname = None;
    let mut addresses = Vec::new();
    for _ in 0..ancount {
        let Some((_, next)) = read_name(body, pos) else {
            break;
        };
        pos = next;
        if pos + 10 > body.len() {
            break;
        }
        let rtype = u16::from_be_bytes([body[pos], body[pos + 1]]);
        let rdlength = u16::from_be_bytes([body[pos + 8], body[pos + 9]]) as usize;
        pos += 10;
        let rdata_end = pos + rdlength;
        if rdata_end > body.len() {
            break;
        }
        match rtype {
            TYPE_CNAME => {
                if cname.is_none() {
                    if let Some((target, _)) = read_name(body, pos) {
                        cname = Some(target);
                    }
                }
            }
            TYPE_A if rdlength == 4 => {
                addresses.push(IpAddress::v4([
                    body[pos],
                    body[pos + 1],
                    body[pos + 2],
                    body[pos + 3],
                ]));
            }
            TYPE_AAAA if rdlength == 16 => {
                if let Ok(bytes) = body[pos..pos + 16].try_into() {
                    addresses.push(IpAddress::v6(bytes));
                }
            }
            _ => {}
        }
        pos = rdata_end;
    }

    if let Some(c) = cname {
        metadata.dns_cname = Some(c);
    }
    if !addresses.is_empty() {
        metadata.dns_answer_addresses = Some(addresses);
    }
}

/// Decodes a (possibly compressed) domain name starting at `start`. Returns
/// the name and the offset immediately following it in the original byte
/// stream — i.e. after the terminating pointer or null label, never inside a
/// jumped-to region.
fn read_name(msg: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels = Vec::new();
    let mut pos = start;
    let mut end_pos = None;
    let mut jumps = 0u32;

    loop {
        let len = *msg.get(pos)?;
        if len == 0 {
            if end_pos.is_none() {
                end_pos = Some(pos + 1);
            }
            break;
        } else if len & 0xC0 == 0xC0 {
            let b2 = *msg.get(pos + 1)?;
            if end_pos.is_none() {
                end_pos = Some(pos + 2);
            }
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                log::debug!("dns: name decoding exceeded {MAX_POINTER_JUMPS} compression pointer jumps");
                return None;
            }
            pos = (((len & 0x3F) as usize) << 8) | b2 as usize;
        } else {
            let label_start = pos + 1;
            let label_end = label_start + len as usize;
            if label_end > msg.len() {
                return None;
            }
            labels.push(std::str::from_utf8(&msg[label_start..label_end]).ok()?);
            pos = label_end;
        }
    }

    Some((labels.join("."), end_pos?))
}
