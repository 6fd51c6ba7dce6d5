//! Error taxonomy for the analytics core.
//!
//! The core never panics on untrusted input (malformed packets, corrupt
//! persisted files, invalid signature documents). Errors here exist to give
//! callers/log lines context for conditions that are handled by falling back
//! to a default, evicting state, or skipping a malformed record — never by
//! aborting the pipeline.

use std::fmt;

/// Configuration value was invalid and a documented default was substituted.
///
/// Never propagated as a hard error (callers that want strictness should
/// validate their config before constructing the core); exists so the
/// fallback can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric field was out of its documented range and was clamped.
    ClampedNumber {
        field: &'static str,
        value: i64,
        clamped_to: i64,
    },
    /// A boolean spelling was not recognized and the default was used.
    UnrecognizedBool { field: &'static str, raw: String },
    /// A format string was not recognized and the default format was used.
    UnrecognizedFormat { field: &'static str, raw: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ClampedNumber {
                field,
                value,
                clamped_to,
            } => write!(
                f,
                "config field '{field}' value {value} out of range, clamped to {clamped_to}"
            ),
            ConfigError::UnrecognizedBool { field, raw } => write!(
                f,
                "config field '{field}' has unrecognized boolean spelling '{raw}', using default"
            ),
            ConfigError::UnrecognizedFormat { field, raw } => write!(
                f,
                "config field '{field}' has unrecognized format '{raw}', falling back to json"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// I/O failure from `PacketSampleStream` or `MetricsStore`.
///
/// Per the core's error-handling policy these are logged and swallowed: the
/// next `append` call simply retries opening the underlying file.
#[derive(Debug)]
pub enum PersistenceError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
    /// A single record exceeded the store's `max_bytes` cap and was rejected
    /// outright rather than truncated.
    RecordTooLarge { record_bytes: usize, max_bytes: usize },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "persistence I/O error: {e}"),
            PersistenceError::Serialize(e) => write!(f, "persistence serialization error: {e}"),
            PersistenceError::RecordTooLarge {
                record_bytes,
                max_bytes,
            } => write!(
                f,
                "record of {record_bytes} bytes rejected, exceeds max_bytes={max_bytes}"
            ),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serialize(e)
    }
}

/// Errors validating a new signature catalog before installing it.
///
/// Unlike `ConfigError`/`PersistenceError`, these propagate to the caller
/// attempting to install signatures — auto-reload failures, by contrast, are
/// swallowed and keep the previous catalog (see `AppSignatureStore`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureValidationError {
    EmptySignatures,
    InvalidLabel { index: usize },
    InvalidDomain { index: usize, domain: String },
    DuplicateLabel { label: String },
}

impl fmt::Display for SignatureValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureValidationError::EmptySignatures => {
                write!(f, "signature catalog must not be empty")
            }
            SignatureValidationError::InvalidLabel { index } => {
                write!(f, "signature at index {index} has a blank label")
            }
            SignatureValidationError::InvalidDomain { index, domain } => {
                write!(f, "signature at index {index} has invalid domain '{domain}'")
            }
            SignatureValidationError::DuplicateLabel { label } => {
                write!(f, "duplicate signature label '{label}' (case-insensitive)")
            }
        }
    }
}

impl std::error::Error for SignatureValidationError {}
