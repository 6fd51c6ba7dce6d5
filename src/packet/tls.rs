//! TLS ClientHello SNI extraction, shared between the raw-TCP path
//! (`tcp.rs`) and the QUIC CRYPTO-frame path (`quic_crypto.rs`), per
//! spec.md §4.1 step 4 and step 6.

const EXTENSION_SERVER_NAME: u16 = 0x0000;
const SERVER_NAME_TYPE_HOST_NAME: u8 = 0x00;

/// Parses a ClientHello handshake body (the bytes after the 4-byte handshake
/// header: legacy_version through the extensions vector) and returns the
/// `host_name` entry of its `server_name` extension, if present.
pub(super) fn parse_client_hello(body: &[u8]) -> Option<String> {
    let mut pos = 0usize;
    // client_version (2) + random (32)
    pos = pos.checked_add(2 + 32)?;
    pos = skip_vector_u8(body, pos)?; // session_id
    pos = skip_vector_u16(body, pos)?; // cipher_suites
    pos = skip_vector_u8(body, pos)?; // compression_methods

    if pos + 2 > body.len() {
        return None;
    }
    let extensions_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
    pos += 2;
    let extensions_end = pos.checked_add(extensions_len)?;
    if extensions_end > body.len() {
        return None;
    }

    while pos + 4 <= extensions_end {
        let ext_type = u16::from_be_bytes([body[pos], body[pos + 1]]);
        let ext_len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
        let ext_start = pos + 4;
        let ext_end = ext_start.checked_add(ext_len)?;
        if ext_end > extensions_end {
            return None;
        }
        if ext_type == EXTENSION_SERVER_NAME {
            if let Some(name) = parse_server_name_extension(&body[ext_start..ext_end]) {
                return Some(name);
            }
        }
        pos = ext_end;
    }
    log::trace!("tls: ClientHello parsed with no server_name extension present");
    None
}

fn parse_server_name_extension(ext: &[u8]) -> Option<String> {
    if ext.len() < 2 {
        return None;
    }
    let list_len = u16::from_be_bytes([ext[0], ext[1]]) as usize;
    let mut pos = 2usize;
    let list_end = pos.checked_add(list_len)?.min(ext.len());
    while pos + 3 <= list_end {
        let name_type = ext[pos];
        let name_len = u16::from_be_bytes([ext[pos + 1], ext[pos + 2]]) as usize;
        let name_start = pos + 3;
        let name_end = name_start.checked_add(name_len)?;
        if name_end > list_end {
            return None;
        }
        if name_type == SERVER_NAME_TYPE_HOST_NAME {
            return std::str::from_utf8(&ext[name_start..name_end])
                .ok()
                .map(str::to_owned);
        }
        pos = name_end;
    }
    None
}

fn skip_vector_u8(body: &[u8], pos: usize) -> Option<usize> {
    let len = *body.get(pos)? as usize;
    let start = pos + 1;
    let end = start.checked_add(len)?;
    if end > body.len() {
        return None;
    }
    Some(end)
}

fn skip_vector_u16(body: &[u8], pos: usize) -> Option<usize> {
    if pos + 2 > body.len() {
        return None;
    }
    let len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
    let start = pos + 2;
    let end = start.checked_add(len)?;
    if end > body.len() {
        return None;
    }
    Some(end)
}
