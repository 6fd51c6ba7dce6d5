//! `TrafficClassifier` — best-effort application attribution from DNS/TLS
//! signals, a built-in CDN/ASN table, and an IP-address cache for packets
//! that carry neither, per spec.md §4.4.
//!
//! Signal priority is TLS SNI, then DNS CNAME target, then DNS query name,
//! then a cached classification keyed by the direction-selected IP
//! (`dstAddress` outbound, `srcAddress` inbound) — the same sequence-tagged
//! bounded LRU used by [`crate::flow`] and [`crate::burst`], but with an
//! absolute write-time deadline rather than an access-refreshed one.

use crate::addr::IpAddress;
use crate::cache_metrics::CacheMetrics;
use crate::events::{AnalyticsEvent, EventHooks};
use crate::packet::PacketMetadata;
use crate::sample::{Direction, TrafficClassification};
use crate::signatures::AppSignature;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

const MAX_HEAP_LEN: usize = 1024;

/// Point-in-time occupancy and lifecycle counters for a [`TrafficClassifier`]'s
/// IP-address cache.
pub type ClassifierStats = crate::cache_metrics::CacheMetricsSnapshot;

/// Small, deliberately non-exhaustive table of well-known CDN domain
/// suffixes. Real ASN attribution needs a routing-table snapshot this
/// stateless, on-device parser never has; this exists to label the handful
/// of CDNs common enough to be worth a confidence bump.
const CDN_TABLE: &[(&str, &str, &str)] = &[
    ("cloudfront.net", "CloudFront", "AS16509"),
    ("akamaiedge.net", "Akamai", "AS20940"),
    ("fastly.net", "Fastly", "AS54113"),
    ("googleusercontent.com", "Google", "AS15169"),
    ("edgekey.net", "Akamai", "AS20940"),
];

fn cdn_lookup(hostname: &str) -> (Option<String>, Option<String>) {
    let lower = hostname.to_ascii_lowercase();
    for (suffix, cdn, asn) in CDN_TABLE {
        if lower == *suffix || lower.ends_with(&format!(".{suffix}")) {
            return (Some((*cdn).to_string()), Some((*asn).to_string()));
        }
    }
    (None, None)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    classification: TrafficClassification,
    /// Absolute expiry, fixed at write time (`writeTime + ttlCache`). Reads
    /// bump `sequence` for LRU ordering but never extend this.
    deadline: f64,
    sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
    sequence: u64,
    ip: IpAddress,
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

pub struct TrafficClassifier {
    signatures: Vec<AppSignature>,
    ip_cache: HashMap<IpAddress, CacheEntry>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    next_sequence: u64,
    max_entries: usize,
    ttl_seconds: f64,
    events: EventHooks,
    metrics: CacheMetrics,
}

impl TrafficClassifier {
    pub fn new(max_entries: usize, ttl_seconds: f64, events: EventHooks) -> Self {
        Self {
            signatures: Vec::new(),
            ip_cache: HashMap::new(),
            heap: BinaryHeap::new(),
            next_sequence: 0,
            max_entries: max_entries.max(1),
            ttl_seconds: ttl_seconds.max(0.0),
            events,
            metrics: CacheMetrics::new(),
        }
    }

    /// Snapshot of this classifier's IP-cache lifecycle counters.
    pub fn stats(&self) -> ClassifierStats {
        self.metrics.snapshot()
    }

    pub fn set_signatures(&mut self, signatures: Vec<AppSignature>) {
        self.signatures = signatures;
    }

    pub fn classify(
        &mut self,
        metadata: &PacketMetadata,
        direction: Direction,
        timestamp: f64,
    ) -> Option<TrafficClassification> {
        self.purge_expired(timestamp);

        let cache_ip = match direction {
            Direction::Outbound => metadata.dst_address,
            Direction::Inbound => metadata.src_address,
        };

        if let Some((name, source)) = domain_signal(metadata) {
            let signature = self.signatures.iter().find(|s| s.matches(name));
            let (label, mut confidence) = match signature {
                Some(sig) => (Some(sig.label.clone()), 0.95),
                None => (None, 0.4),
            };
            let mut reasons = vec![match source {
                DomainSource::Tls => format!("tls={name}"),
                DomainSource::Dns => format!("dns={name}"),
            }];
            if let Some(sig) = signature {
                reasons.push(format!("app={}", sig.label));
            }
            let (cdn, asn) = cdn_lookup(name);
            if cdn.is_some() {
                confidence = confidence.max(0.6);
            }

            let classification = TrafficClassification {
                label,
                domain: Some(name.to_string()),
                cdn,
                asn,
                confidence,
                reasons,
            };

            match metadata.dns_answer_addresses.as_deref() {
                Some(addresses) if !addresses.is_empty() => {
                    for &ip in addresses {
                        self.insert_cache(ip, classification.clone(), timestamp);
                    }
                }
                _ => self.insert_cache(cache_ip, classification.clone(), timestamp),
            }
            return Some(classification);
        }

        if let Some(entry) = self.ip_cache.get(&cache_ip) {
            if timestamp < entry.deadline {
                self.metrics.record_reused();
                self.events
                    .trigger(AnalyticsEvent::ClassifierCacheHit { ip: cache_ip.canonical() });
                let mut classification = entry.classification.clone();
                classification.reasons = vec![format!("ip_cache={}", cache_ip.canonical())];
                self.bump_recency(cache_ip);
                return Some(classification);
            }
            // Deadline has passed since this entry's write time; purge_expired's
            // recency-ordered sweep may not have reached it yet, so drop it here.
            self.ip_cache.remove(&cache_ip);
            self.metrics.record_evicted();
            self.events
                .trigger(AnalyticsEvent::ClassifierCacheEvicted { ip: cache_ip.canonical() });
        }

        None
    }

    pub fn len(&self) -> usize {
        self.ip_cache.len()
    }

    fn insert_cache(&mut self, ip: IpAddress, classification: TrafficClassification, timestamp: f64) {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        if !self.ip_cache.contains_key(&ip) && self.ip_cache.len() >= self.max_entries {
            self.evict_one();
        }
        self.ip_cache.insert(
            ip,
            CacheEntry {
                classification,
                deadline: timestamp + self.ttl_seconds,
                sequence,
            },
        );
        self.metrics.record_created();
        self.heap.push(Reverse(HeapEntry { sequence, ip }));
        self.compact_if_needed();
    }

    /// Refreshes LRU recency on a cache hit without extending `deadline` —
    /// expiry is an absolute write-time deadline, not an access-based one.
    fn bump_recency(&mut self, ip: IpAddress) {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        if let Some(entry) = self.ip_cache.get_mut(&ip) {
            entry.sequence = sequence;
        }
        self.heap.push(Reverse(HeapEntry { sequence, ip }));
        self.compact_if_needed();
    }

    fn purge_expired(&mut self, timestamp: f64) {
        loop {
            let Some(top) = self.heap.peek().map(|Reverse(e)| *e) else {
                return;
            };
            match self.ip_cache.get(&top.ip) {
                None => {
                    self.heap.pop();
                }
                Some(entry) if entry.sequence != top.sequence => {
                    self.heap.pop();
                }
                Some(entry) => {
                    if timestamp >= entry.deadline {
                        self.heap.pop();
                        self.ip_cache.remove(&top.ip);
                        self.metrics.record_evicted();
                        self.events.trigger(AnalyticsEvent::ClassifierCacheEvicted {
                            ip: top.ip.canonical(),
                        });
                    } else {
                        return;
                    }
                }
            }
        }
    }

    fn evict_one(&mut self) {
        loop {
            let Some(Reverse(top)) = self.heap.pop() else {
                return;
            };
            if let Some(entry) = self.ip_cache.get(&top.ip) {
                if entry.sequence == top.sequence {
                    self.ip_cache.remove(&top.ip);
                    self.metrics.record_evicted();
                    self.events
                        .trigger(AnalyticsEvent::ClassifierCacheEvicted { ip: top.ip.canonical() });
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
            .ip_cache
            .iter()
            .map(|(&ip, entry)| Reverse(HeapEntry { sequence: entry.sequence, ip }))
            .collect();
        self.metrics.record_heap_compaction();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DomainSource {
    Tls,
    Dns,
}

fn domain_signal(metadata: &PacketMetadata) -> Option<(&str, DomainSource)> {
    if let Some(name) = metadata.tls_server_name.as_deref() {
        return Some((name, DomainSource::Tls));
    }
    if let Some(name) = metadata.dns_cname.as_deref() {
        return Some((name, DomainSource::Dns));
    }
    if let Some(name) = metadata.dns_query_name.as_deref() {
        return Some((name, DomainSource::Dns));
    }
    None
}
