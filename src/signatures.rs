//! `AppSignatureStore` — loads, validates, and persists the application
//! signature catalog `TrafficClassifier` matches against, per spec.md §4.4
//! and §4.8.

use crate::error::{PersistenceError, SignatureValidationError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One application's domain-matching rule set.
///
/// `domains` entries are either a literal hostname or a `*.suffix` wildcard;
/// see [`AppSignature::matches`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSignature {
    pub label: String,
    pub domains: Vec<String>,
}

impl AppSignature {
    pub fn matches(&self, hostname: &str) -> bool {
        self.domains.iter().any(|rule| domain_matches(rule, hostname))
    }
}

fn domain_matches(rule: &str, hostname: &str) -> bool {
    match rule.strip_prefix("*.") {
        Some(suffix) => {
            hostname.eq_ignore_ascii_case(suffix) || hostname.to_ascii_lowercase().ends_with(&format!(".{}", suffix.to_ascii_lowercase()))
        }
        None => hostname.eq_ignore_ascii_case(rule),
    }
}

#[derive(Deserialize)]
struct CatalogWrapper {
    signatures: Vec<AppSignature>,
}

/// Accepts either a bare JSON array of signatures or `{"signatures": [...]}`.
fn parse_catalog(text: &str) -> Result<Vec<AppSignature>, serde_json::Error> {
    serde_json::from_str::<Vec<AppSignature>>(text)
        .or_else(|_| serde_json::from_str::<CatalogWrapper>(text).map(|w| w.signatures))
}

pub fn validate(signatures: &[AppSignature]) -> Result<(), SignatureValidationError> {
    if signatures.is_empty() {
        return Err(SignatureValidationError::EmptySignatures);
    }
    let mut seen_labels = HashSet::new();
    for (index, signature) in signatures.iter().enumerate() {
        if signature.label.trim().is_empty() {
            return Err(SignatureValidationError::InvalidLabel { index });
        }
        if !seen_labels.insert(signature.label.to_ascii_lowercase()) {
            return Err(SignatureValidationError::DuplicateLabel {
                label: signature.label.clone(),
            });
        }
        if signature.domains.is_empty() {
            return Err(SignatureValidationError::InvalidDomain {
                index,
                domain: String::new(),
            });
        }
        for domain in &signature.domains {
            if domain.trim().is_empty() || domain.contains(char::is_whitespace) {
                return Err(SignatureValidationError::InvalidDomain {
                    index,
                    domain: domain.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Composed failure mode of [`AppSignatureStore::load`]: either the file
/// couldn't be read/parsed, or it parsed but failed catalog validation.
#[derive(Debug)]
pub enum SignatureLoadError {
    Persistence(PersistenceError),
    Validation(SignatureValidationError),
}

impl fmt::Display for SignatureLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureLoadError::Persistence(e) => write!(f, "{e}"),
            SignatureLoadError::Validation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SignatureLoadError {}

impl From<PersistenceError> for SignatureLoadError {
    fn from(e: PersistenceError) -> Self {
        SignatureLoadError::Persistence(e)
    }
}

impl From<SignatureValidationError> for SignatureLoadError {
    fn from(e: SignatureValidationError) -> Self {
        SignatureLoadError::Validation(e)
    }
}

/// Owns the on-disk signature catalog and re-reads it when the file has
/// changed, polled at most every `check_interval_seconds` of *ingest* time
/// rather than wall-clock time — a build with no live traffic never wakes a
/// thread just to stat the file.
pub struct AppSignatureStore {
    path: PathBuf,
    signatures: Vec<AppSignature>,
    check_interval_seconds: f64,
    last_checked_timestamp: Option<f64>,
    last_modified: Option<SystemTime>,
}

impl AppSignatureStore {
    /// Loads and validates the catalog at `path`.
    pub fn load(path: &Path) -> Result<Vec<AppSignature>, SignatureLoadError> {
        let text = fs::read_to_string(path).map_err(PersistenceError::from)?;
        let signatures = parse_catalog(&text).map_err(PersistenceError::from)?;
        validate(&signatures)?;
        Ok(signatures)
    }

    /// Opens the store, performing an initial load.
    pub fn open(path: PathBuf, check_interval_seconds: f64) -> Result<Self, SignatureLoadError> {
        let signatures = Self::load(&path)?;
        let last_modified = fs::metadata(&path).ok().and_then(|m| m.modified().ok());
        Ok(Self {
            path,
            signatures,
            check_interval_seconds: check_interval_seconds.max(0.0),
            last_checked_timestamp: None,
            last_modified,
        })
    }

    pub fn signatures(&self) -> &[AppSignature] {
        &self.signatures
    }

    /// Installs `signatures` as the current catalog and refreshes the
    /// recorded modification time from disk, so a subsequent
    /// [`Self::maybe_reload`] does not mistake this store's own write for an
    /// external change.
    pub fn adopt(&mut self, signatures: Vec<AppSignature>) {
        self.signatures = signatures;
        self.last_modified = fs::metadata(&self.path).ok().and_then(|m| m.modified().ok());
    }

    /// Re-reads the catalog if enough ingest time has passed since the last
    /// check and the file's modification time changed. Returns `true` if a
    /// reload happened. A failed reload keeps the previous catalog.
    pub fn maybe_reload(&mut self, timestamp: f64) -> bool {
        let should_check = match self.last_checked_timestamp {
            None => true,
            Some(last) => timestamp - last >= self.check_interval_seconds,
        };
        if !should_check {
            return false;
        }
        self.last_checked_timestamp = Some(timestamp);

        let modified = fs::metadata(&self.path).ok().and_then(|m| m.modified().ok());
        if modified == self.last_modified {
            return false;
        }

        match Self::load(&self.path) {
            Ok(signatures) => {
                self.signatures = signatures;
                self.last_modified = modified;
                true
            }
            Err(e) => {
                warn!("signature catalog reload failed, keeping previous catalog: {e}");
                false
            }
        }
    }

    /// Writes `signatures` to `path`, wrapped as `{"signatures": [...]}`.
    pub fn write(path: &Path, signatures: &[AppSignature]) -> Result<(), PersistenceError> {
        let wrapper = CatalogWrapperRef { signatures };
        let json = serde_json::to_string_pretty(&wrapper)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn write_if_missing(path: &Path, signatures: &[AppSignature]) -> Result<bool, PersistenceError> {
        if path.exists() {
            return Ok(false);
        }
        Self::write(path, signatures)?;
        Ok(true)
    }
}

#[derive(Serialize)]
struct CatalogWrapperRef<'a> {
    signatures: &'a [AppSignature],
}
