//! Strict allowlist-based validation of values bound for subprocess arguments.
//!
//! A hostname only reaches the executor as a [`ValidatedHostname`], and the
//! only way to get one is [`validate_hostname`]. Shell metacharacters,
//! whitespace, and control characters all fall outside the allowlist.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::field::UntrustedField;

/// Errors returned when a candidate hostname is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Hostname is required")]
    Missing,
    #[error("Invalid hostname")]
    InvalidCharacters,
}

impl ValidationError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "MISSING",
            Self::InvalidCharacters => "INVALID_CHARACTERS",
        }
    }
}

// ---------------------------------------------------------------------------
// Allowlist pattern -- never a denylist.
// ---------------------------------------------------------------------------

/// Alphanumerics, dot and hyphen. No length bound beyond what the transport
/// already enforces.
static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9.-]+$").unwrap());

/// A hostname that passed [`validate_hostname`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedHostname(String);

impl ValidatedHostname {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ValidatedHostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedHostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate an untrusted hostname candidate.
///
/// Absent and empty input are both `Missing`. Anything containing a
/// character outside `[A-Za-z0-9.-]` is `InvalidCharacters`.
pub fn validate_hostname(
    candidate: Option<&UntrustedField>,
) -> Result<ValidatedHostname, ValidationError> {
    let raw = match candidate {
        Some(field) if !field.is_empty() => field.as_raw(),
        _ => return Err(ValidationError::Missing),
    };
    if !HOSTNAME_RE.is_match(raw) {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(ValidatedHostname(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
