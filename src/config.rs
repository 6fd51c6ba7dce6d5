//! Analytics core configuration.
//!
//! Fields mirror spec.md §6. Every setter is lenient: out-of-range numbers
//! clamp to documented bounds, unrecognized boolean spellings fall back to a
//! default, and unknown format strings fall back to JSON — the core never
//! refuses to start because of a bad config value (spec.md §7 policy 4).

use crate::error::ConfigError;
use crate::metrics_store::StoreFormat;

/// Parsed, validated configuration for an `AnalyticsCore`.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub mtu: u32,
    pub packet_pool_bytes: usize,
    pub per_flow_buffer_bytes: usize,
    pub metrics_ring_buffer_size: usize,
    pub metrics_snapshot_interval_secs: u64,
    pub metrics_store_format: StoreFormat,
    pub flow_ttl_seconds: f64,
    pub burst_threshold_ms: f64,
    pub max_tracked_flows: usize,
    pub max_bursts: usize,
    pub max_classifier_entries: usize,
    pub classifier_ttl_seconds: f64,
    pub packet_stream_enabled: bool,
    pub packet_stream_max_bytes: u64,
    pub signature_file_name: String,
    pub signature_check_interval_secs: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            mtu: 1500,
            packet_pool_bytes: 64 * 1024,
            per_flow_buffer_bytes: 16 * 1024,
            metrics_ring_buffer_size: 1024,
            metrics_snapshot_interval_secs: 30,
            metrics_store_format: StoreFormat::Json,
            flow_ttl_seconds: 120.0,
            burst_threshold_ms: 1500.0,
            max_tracked_flows: 4096,
            max_bursts: 4096,
            max_classifier_entries: 4096,
            classifier_ttl_seconds: 3600.0,
            packet_stream_enabled: true,
            packet_stream_max_bytes: 8 * 1024 * 1024,
            signature_file_name: "app_signatures.json".to_string(),
            signature_check_interval_secs: 60.0,
        }
    }
}

/// Builder accumulating non-fatal config warnings alongside the resolved
/// config, mirroring the teacher's builder pattern (`NetflowParserBuilder`)
/// but surfacing soft corrections instead of hard build errors.
#[derive(Debug, Default)]
pub struct AnalyticsConfigBuilder {
    config: AnalyticsConfig,
    warnings: Vec<ConfigError>,
}

impl AnalyticsConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AnalyticsConfig::default(),
            warnings: Vec::new(),
        }
    }

    /// Clamp `mtu` to >= 576 (the IPv4 minimum reassembly buffer size), per
    /// spec.md §6.
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_mtu(mut self, mtu: u32) -> Self {
        self.config.mtu = clamp_min(&mut self.warnings, "mtu", mtu as i64, 576) as u32;
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_metrics_ring_buffer_size(mut self, size: usize) -> Self {
        self.config.metrics_ring_buffer_size =
            clamp_min(&mut self.warnings, "metricsRingBufferSize", size as i64, 1) as usize;
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_metrics_snapshot_interval_secs(mut self, secs: u64) -> Self {
        self.config.metrics_snapshot_interval_secs =
            clamp_min(&mut self.warnings, "metricsSnapshotInterval", secs as i64, 1) as u64;
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_flow_ttl_seconds(mut self, secs: f64) -> Self {
        self.config.flow_ttl_seconds = secs.max(1.0);
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_burst_threshold_ms(mut self, ms: f64) -> Self {
        self.config.burst_threshold_ms = ms.max(0.0);
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_max_tracked_flows(mut self, n: usize) -> Self {
        self.config.max_tracked_flows = clamp_min(&mut self.warnings, "maxTrackedFlows", n as i64, 1) as usize;
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_packet_stream_enabled(mut self, raw: &str) -> Self {
        self.config.packet_stream_enabled = parse_lenient_bool(&mut self.warnings, "packetStreamEnabled", raw)
            .unwrap_or(self.config.packet_stream_enabled);
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_packet_stream_max_bytes(mut self, bytes: u64) -> Self {
        self.config.packet_stream_max_bytes =
            clamp_min(&mut self.warnings, "packetStreamMaxBytes", bytes as i64, 65536) as u64;
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_metrics_store_format(mut self, raw: &str) -> Self {
        self.config.metrics_store_format = parse_store_format(&mut self.warnings, raw);
        self
    }

    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_signature_file_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.config.signature_file_name = if name.trim().is_empty() {
            AnalyticsConfig::default().signature_file_name
        } else {
            name
        };
        self
    }

    /// Builds the config and returns any non-fatal corrections that were
    /// applied, for the caller to log.
    pub fn build(self) -> (AnalyticsConfig, Vec<ConfigError>) {
        (self.config, self.warnings)
    }
}

fn clamp_min(warnings: &mut Vec<ConfigError>, field: &'static str, value: i64, min: i64) -> i64 {
    if value < min {
        warnings.push(ConfigError::ClampedNumber {
            field,
            value,
            clamped_to: min,
        });
        min
    } else {
        value
    }
}

/// Accepted spellings: `"YES"/"yes"/"1"/"true"` (any case) -> true,
/// `"NO"/"no"/"0"/"false"` (any case) -> false, empty string -> `None`
/// (caller keeps its current default). Anything else is unrecognized.
pub fn parse_lenient_bool(
    warnings: &mut Vec<ConfigError>,
    field: &'static str,
    raw: &str,
) -> Option<bool> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "yes" | "1" | "true" => Some(true),
        "no" | "0" | "false" => Some(false),
        _ => {
            warnings.push(ConfigError::UnrecognizedBool {
                field,
                raw: raw.to_string(),
            });
            None
        }
    }
}

fn parse_store_format(warnings: &mut Vec<ConfigError>, raw: &str) -> StoreFormat {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ndjson" => StoreFormat::Ndjson,
        "json" | "" => StoreFormat::Json,
        _ => {
            warnings.push(ConfigError::UnrecognizedFormat {
                field: "metricsStoreFormat",
                raw: raw.to_string(),
            });
            StoreFormat::Json
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtu_clamps_to_minimum() {
        let (config, warnings) = AnalyticsConfigBuilder::new().with_mtu(100).build();
        assert_eq!(config.mtu, 576);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn mtu_passes_through_when_valid() {
        let (config, warnings) = AnalyticsConfigBuilder::new().with_mtu(9000).build();
        assert_eq!(config.mtu, 9000);
        assert!(warnings.is_empty());
    }

    #[test]
    fn bool_spellings() {
        let mut warnings = Vec::new();
        assert_eq!(parse_lenient_bool(&mut warnings, "x", "YES"), Some(true));
        assert_eq!(parse_lenient_bool(&mut warnings, "x", "no"), Some(false));
        assert_eq!(parse_lenient_bool(&mut warnings, "x", "1"), Some(true));
        assert_eq!(parse_lenient_bool(&mut warnings, "x", ""), None);
        assert_eq!(parse_lenient_bool(&mut warnings, "x", "maybe"), None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn unknown_format_falls_back_to_json() {
        let (config, warnings) = AnalyticsConfigBuilder::new()
            .with_metrics_store_format("xml")
            .build();
        assert_eq!(config.metrics_store_format, StoreFormat::Json);
        assert_eq!(warnings.len(), 1);
    }
}
