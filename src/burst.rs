//! `BurstTracker` — per-flow packet/byte burst counters and throughput, per
//! spec.md §4.3.
//!
//! A burst continues across packets whose gap from the previous packet in
//! that flow is at most `burstThresholdMs`; a strictly larger gap starts a
//! new burst. `burstId` is per-flow and 0-based: it increments only when
//! that flow's own gap threshold is exceeded, independent of any other
//! flow's burst count. Bounded to `maxBursts` live entries using the same
//! sequence-tagged [`BinaryHeap`] lazy-deletion scheme as [`crate::flow`];
//! a flow whose burst state is capacity-evicted starts again at 0 if it
//! reappears, since nothing else records its prior count.

use crate::cache_metrics::CacheMetrics;
use crate::events::{AnalyticsEvent, EventHooks};
use crate::sample::BurstMetrics;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

const MAX_HEAP_LEN: usize = 1024;
const MIN_DURATION_MS: u64 = 1;

/// Point-in-time occupancy and lifecycle counters for a [`BurstTracker`].
pub type BurstTrackerStats = crate::cache_metrics::CacheMetricsSnapshot;

#[derive(Debug, Clone, Copy)]
struct BurstEntry {
    burst_id: u64,
    start_ts: f64,
    last_ts: f64,
    packet_count: u64,
    byte_count: u64,
    sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
    sequence: u64,
    flow_id: u64,
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sequence.cmp(&other.sequence)
    }
}

pub struct BurstTracker {
    bursts: HashMap<u64, BurstEntry>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    next_sequence: u64,
    max_bursts: usize,
    threshold_ms: f64,
    events: EventHooks,
    metrics: CacheMetrics,
}

impl BurstTracker {
    pub fn new(max_bursts: usize, burst_threshold_ms: f64, events: EventHooks) -> Self {
        Self {
            bursts: HashMap::new(),
            heap: BinaryHeap::new(),
            next_sequence: 0,
            max_bursts: max_bursts.max(1),
            threshold_ms: burst_threshold_ms.max(0.0),
            events,
            metrics: CacheMetrics::new(),
        }
    }

    /// Snapshot of this tracker's lifecycle counters.
    pub fn stats(&self) -> BurstTrackerStats {
        self.metrics.snapshot()
    }

    /// Records one packet of `length` bytes on `flow_id` at `timestamp`
    /// (seconds) and returns the burst id plus the burst's running metrics.
    pub fn record(&mut self, flow_id: u64, length: u32, timestamp: f64) -> (u64, BurstMetrics) {
        self.next_sequence += 1;
        let sequence = self.next_sequence;

        let entry = if let Some(entry) = self.bursts.get_mut(&flow_id) {
            let gap_ms = (timestamp - entry.last_ts).max(0.0) * 1000.0;
            if gap_ms > self.threshold_ms {
                let old_burst_id = entry.burst_id;
                *entry = BurstEntry {
                    burst_id: old_burst_id + 1,
                    start_ts: timestamp,
                    last_ts: timestamp,
                    packet_count: 1,
                    byte_count: length as u64,
                    sequence,
                };
                self.metrics.record_created();
                self.events.trigger(AnalyticsEvent::BurstReset {
                    flow_id,
                    burst_id: old_burst_id,
                });
            } else {
                entry.last_ts = timestamp;
                entry.packet_count += 1;
                entry.byte_count += length as u64;
                entry.sequence = sequence;
                self.metrics.record_reused();
            }
            *entry
        } else {
            if self.bursts.len() >= self.max_bursts {
                self.evict_one();
            }
            // burstId is per-flow and starts at 0: a flow that reappears
            // after its entry was capacity-evicted starts counting again.
            let entry = BurstEntry {
                burst_id: 0,
                start_ts: timestamp,
                last_ts: timestamp,
                packet_count: 1,
                byte_count: length as u64,
                sequence,
            };
            self.bursts.insert(flow_id, entry);
            self.metrics.record_created();
            entry
        };

        self.heap.push(Reverse(HeapEntry { sequence, flow_id }));
        self.compact_if_needed();

        self.events.trigger(AnalyticsEvent::BurstAdvanced {
            flow_id,
            burst_id: entry.burst_id,
        });

        (entry.burst_id, metrics_for(&entry))
    }

    pub fn len(&self) -> usize {
        self.bursts.len()
    }

    fn evict_one(&mut self) {
        loop {
            let Some(Reverse(top)) = self.heap.pop() else {
                return;
            };
            if let Some(entry) = self.bursts.get(&top.flow_id).copied() {
                if entry.sequence == top.sequence {
                    self.bursts.remove(&top.flow_id);
                    self.metrics.record_evicted();
                    return;
                }
            }
        }
    }

    fn compact_if_needed(&mut self) {
        if self.heap.len() <= MAX_HEAP_LEN {
            return;
        }
        self.heap = self
            .bursts
            .iter()
            .map(|(&flow_id, entry)| Reverse(HeapEntry { sequence: entry.sequence, flow_id }))
            .collect();
        self.metrics.record_heap_compaction();
    }
}

fn metrics_for(entry: &BurstEntry) -> BurstMetrics {
    let duration_ms = ((entry.last_ts - entry.start_ts) * 1000.0).round() as u64;
    let duration_ms = duration_ms.max(MIN_DURATION_MS);
    let duration_secs = duration_ms as f64 / 1000.0;
    BurstMetrics {
        packet_count: entry.packet_count,
        byte_count: entry.byte_count,
        duration_ms,
        packets_per_second: entry.packet_count as f64 / duration_secs,
        bytes_per_second: entry.byte_count as f64 / duration_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_packet_starts_a_burst() {
        let mut tracker = BurstTracker::new(10, 1500.0, EventHooks::new());
        let (burst_id, metrics) = tracker.record(1, 100, 0.0);
        assert_eq!(burst_id, 0);
        assert_eq!(metrics.packet_count, 1);
        assert_eq!(metrics.byte_count, 100);
        assert_eq!(metrics.duration_ms, MIN_DURATION_MS);
    }

    #[test]
    fn packets_within_threshold_continue_the_same_burst() {
        let mut tracker = BurstTracker::new(10, 1500.0, EventHooks::new());
        let (id1, _) = tracker.record(1, 100, 0.0);
        let (id2, metrics) = tracker.record(1, 200, 0.5);
        assert_eq!(id1, id2);
        assert_eq!(metrics.packet_count, 2);
        assert_eq!(metrics.byte_count, 300);
        assert_eq!(metrics.duration_ms, 500);
    }

    #[test]
    fn exceeding_the_gap_threshold_starts_a_new_burst() {
        let mut tracker = BurstTracker::new(10, 1500.0, EventHooks::new());
        let (id1, _) = tracker.record(1, 100, 0.0);
        let (id2, metrics) = tracker.record(1, 100, 5.0); // 5s gap >> 1500ms
        assert_eq!(id1, 0);
        assert_eq!(id2, 1);
        assert_eq!(metrics.packet_count, 1);
    }

    #[test]
    fn burst_id_is_scoped_per_flow_and_unaffected_by_other_flows() {
        let mut tracker = BurstTracker::new(10, 1500.0, EventHooks::new());
        let (flow1_id0, _) = tracker.record(1, 100, 0.0);
        let (flow2_id0, _) = tracker.record(2, 100, 0.0);
        assert_eq!(flow1_id0, 0);
        assert_eq!(flow2_id0, 0);

        // Flow 1 resets into a new burst; flow 2's burst id is untouched.
        let (flow1_id1, _) = tracker.record(1, 100, 5.0);
        let (flow2_id0_again, _) = tracker.record(2, 100, 0.1);
        assert_eq!(flow1_id1, 1);
        assert_eq!(flow2_id0_again, 0);
    }

    #[test]
    fn identical_timestamps_continue_rather_than_reset() {
        let mut tracker = BurstTracker::new(10, 1500.0, EventHooks::new());
        let (id1, _) = tracker.record(1, 100, 2.0);
        let (id2, metrics) = tracker.record(1, 50, 2.0);
        assert_eq!(id1, id2);
        assert_eq!(metrics.packet_count, 2);
        assert_eq!(metrics.duration_ms, MIN_DURATION_MS);
    }

    #[test]
    fn capacity_eviction_keeps_most_recent_flow() {
        let mut tracker = BurstTracker::new(1, 1500.0, EventHooks::new());
        tracker.record(1, 10, 0.0);
        tracker.record(2, 10, 0.0);
        assert_eq!(tracker.len(), 1);
        let (burst_id, metrics) = tracker.record(1, 10, 0.1);
        assert_eq!(metrics.packet_count, 1); // flow 1's prior burst was evicted
        // Flow 1's burst state was evicted, so its per-flow counter restarts at 0.
        assert_eq!(burst_id, 0);
    }

    #[test]
    fn stats_track_creation_reuse_and_reset() {
        let mut tracker = BurstTracker::new(10, 1500.0, EventHooks::new());
        tracker.record(1, 100, 0.0); // created
        tracker.record(1, 100, 0.5); // reused (within threshold)
        tracker.record(1, 100, 5.0); // reset -> new burst created
        let stats = tracker.stats();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.reused, 1);
    }
}
