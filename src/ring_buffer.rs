//! `MetricsRingBuffer` — fixed-capacity, overwrite-oldest buffer of recent
//! `PacketSample`s, per spec.md §4.5.

use crate::sample::PacketSample;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct MetricsRingBuffer {
    capacity: usize,
    buffer: Mutex<VecDeque<PacketSample>>,
}

impl MetricsRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffer: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Appends `sample`, dropping the oldest entry if the buffer is full.
    pub fn append(&self, sample: PacketSample) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(sample);
    }

    /// Returns the most recent `limit` samples, oldest first. `None` returns
    /// everything currently buffered.
    pub fn snapshot(&self, limit: Option<usize>) -> Vec<PacketSample> {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        match limit {
            Some(limit) if limit < buffer.len() => {
                buffer.iter().skip(buffer.len() - limit).cloned().collect()
            }
            _ => buffer.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
