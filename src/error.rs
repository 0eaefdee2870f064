//! Error taxonomy for the V2G simulation core.
//!
//! Agents never crash on a message-level error (see `SPEC_FULL.md` §7): decode
//! failures and protocol violations are logged and dropped. These types exist
//! for the errors that *do* need to propagate to a caller — configuration and
//! data-file loading at startup.

use thiserror::Error;

/// A single field-level configuration problem, collected by `validate()` calls
/// rather than returned as the first error found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Errors that can terminate startup: bad TOML, an unreadable CSV, or a
/// scenario config that failed `validate()`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse CSV record: {0}")]
    Csv(#[from] csv::Error),

    #[error("scenario config has {} validation error(s); first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
    Validation(Vec<ConfigError>),
}

/// Message-construction errors (`SPEC_FULL.md` §7): a type/value violation
/// encountered while building an outbound message. Reported on the bus as an
/// `Error` message; never aborts the epoch. Rust's type system already rules
/// out the type half of what the source's `_check_*` validators guarded
/// against, and this crate's resolved allocation/discharge arithmetic cannot
/// itself produce an out-of-range power value, so no call site in this
/// implementation currently constructs one — it stays part of the wire/error
/// schema for a future message producer to raise, same as `UserPreference`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MessageError {
    #[error("refusing to construct {message_type} message: {reason} (field: {field})")]
    Construction {
        message_type: &'static str,
        field: &'static str,
        reason: String,
    },
}
