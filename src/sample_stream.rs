//! `PacketSampleStream` — an NDJSON log of `PacketSample`s with size-based
//! rotation and offset-cursor tailing, per spec.md §4.6.
//!
//! Built on `std::os::unix::fs::MetadataExt` for device/inode identity,
//! since the on-device host this core runs on is always Apple's unix-like
//! kernel — a cursor that outlives a log rotation is detected by the file's
//! identity changing underneath it, not just by its length shrinking.

use crate::error::PersistenceError;
use crate::sample::PacketSample;
use std::fs;
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Identifies a read position that survives across calls: the device/inode
/// pair detects rotation (a new file took the old path), the offset is
/// where to resume within that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    device: u64,
    inode: u64,
    offset: u64,
}

pub struct PacketSampleStream {
    path: PathBuf,
    max_bytes: u64,
    closed: AtomicBool,
    write_lock: Mutex<()>,
}

impl PacketSampleStream {
    pub fn new(path: PathBuf, max_bytes: u64) -> Self {
        Self {
            path,
            max_bytes: max_bytes.max(1),
            closed: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    /// Appends one NDJSON line. A no-op once [`Self::close`] has been
    /// called.
    pub fn append(&self, sample: &PacketSample) -> Result<(), PersistenceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut line = serde_json::to_string(sample)?;
        line.push('\n');
        if line.len() as u64 > self.max_bytes {
            return Err(PersistenceError::RecordTooLarge {
                record_bytes: line.len(),
                max_bytes: self.max_bytes as usize,
            });
        }

        let current_len = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if current_len + line.len() as u64 > self.max_bytes {
            self.rotate(line.len() as u64)?;
        }

        let mut file = fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Keeps only the most recent complete lines that fit alongside
    /// `incoming_bytes` within `max_bytes`.
    fn rotate(&self, incoming_bytes: u64) -> Result<(), PersistenceError> {
        let text = fs::read_to_string(&self.path).unwrap_or_default();
        let budget = self.max_bytes.saturating_sub(incoming_bytes);

        let mut kept: Vec<&str> = Vec::new();
        let mut kept_bytes: u64 = 0;
        for line in text.lines().rev() {
            let line_bytes = line.len() as u64 + 1;
            if kept_bytes + line_bytes > budget {
                break;
            }
            kept_bytes += line_bytes;
            kept.push(line);
        }
        kept.reverse();

        let mut rewritten = String::new();
        for line in kept {
            rewritten.push_str(line);
            rewritten.push('\n');
        }
        fs::write(&self.path, rewritten)?;
        Ok(())
    }

    /// Reads every sample currently persisted, skipping malformed lines.
    pub fn read_all(&self) -> Vec<PacketSample> {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        text.lines().filter_map(|line| serde_json::from_str(line).ok()).collect()
    }

    /// Reads samples appended since `cursor`, returning them plus the
    /// cursor to pass next time. A `None` cursor (or one pointing at a file
    /// that was rotated or truncated out from under it) reads from the
    /// start of the current file.
    pub fn read_new(&self, cursor: Option<StreamCursor>) -> (Vec<PacketSample>, StreamCursor) {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(_) => {
                return (
                    Vec::new(),
                    cursor.unwrap_or(StreamCursor { device: 0, inode: 0, offset: 0 }),
                )
            }
        };
        let (device, inode, len) = (metadata.dev(), metadata.ino(), metadata.len());

        let start_offset = match cursor {
            Some(c) if c.device == device && c.inode == inode && c.offset <= len => c.offset,
            _ => 0,
        };

        let text = fs::read_to_string(&self.path).unwrap_or_default();
        let bytes = text.as_bytes();
        let tail = if (start_offset as usize) <= bytes.len() {
            &bytes[start_offset as usize..]
        } else {
            &bytes[..0]
        };
        let samples = String::from_utf8_lossy(tail)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        (samples, StreamCursor { device, inode, offset: len })
    }

    /// Idempotent: calling this more than once is harmless.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::IpAddress;
    use crate::sample::Direction;
    use tempfile::NamedTempFile;

    fn sample(flow_id: u64) -> PacketSample {
        PacketSample {
            timestamp: 0.0,
            direction: Direction::Outbound,
            ip_version: 4,
            transport: 17,
            length: 10,
            flow_id,
            burst_id: 0,
            src_address: IpAddress::v4([0, 0, 0, 0]),
            dst_address: IpAddress::v4([0, 0, 0, 0]),
            src_port: None,
            dst_port: None,
            dns_query_name: None,
            dns_cname: None,
            dns_answer_addresses: None,
            registrable_domain: None,
            tls_server_name: None,
            quic_version: None,
            quic_packet_type: None,
            quic_destination_connection_id: None,
            quic_source_connection_id: None,
            burst_metrics: None,
            traffic_classification: None,
        }
    }

    #[test]
    fn appends_and_reads_all_back() {
        let file = NamedTempFile::new().unwrap();
        let stream = PacketSampleStream::new(file.path().to_path_buf(), 1_000_000);
        stream.append(&sample(1)).unwrap();
        stream.append(&sample(2)).unwrap();
        let all = stream.read_all();
        assert_eq!(all.iter().map(|s| s.flow_id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn read_new_only_returns_samples_appended_since_cursor() {
        let file = NamedTempFile::new().unwrap();
        let stream = PacketSampleStream::new(file.path().to_path_buf(), 1_000_000);
        stream.append(&sample(1)).unwrap();
        let (first_batch, cursor) = stream.read_new(None);
        assert_eq!(first_batch.len(), 1);

        stream.append(&sample(2)).unwrap();
        let (second_batch, _cursor2) = stream.read_new(Some(cursor));
        assert_eq!(second_batch.iter().map(|s| s.flow_id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn rotation_keeps_only_recent_complete_lines() {
        let file = NamedTempFile::new().unwrap();
        let line_len = serde_json::to_string(&sample(1)).unwrap().len() as u64 + 1;
        let stream = PacketSampleStream::new(file.path().to_path_buf(), line_len * 2);
        for id in 1..=5 {
            stream.append(&sample(id)).unwrap();
        }
        let all = stream.read_all();
        assert!(all.len() <= 2);
        assert_eq!(all.last().unwrap().flow_id, 5);
    }

    #[test]
    fn close_is_idempotent_and_silences_further_appends() {
        let file = NamedTempFile::new().unwrap();
        let stream = PacketSampleStream::new(file.path().to_path_buf(), 1_000_000);
        stream.append(&sample(1)).unwrap();
        stream.close();
        stream.close();
        stream.append(&sample(2)).unwrap();
        assert_eq!(stream.read_all().len(), 1);
    }
}
