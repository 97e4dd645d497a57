//! Typed errors for the library seams.
//!
//! Only [`ConfigError`] is fatal for a run: a rule table that cannot be
//! compiled must stop the batch instead of silently misclassifying.
//! Store and client errors are logged by callers and degrade the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid pattern for level {level}: {pattern:?}: {source}")]
    InvalidPattern {
        level: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("{0} points to a non-existent path")]
    MissingPath(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Dedup backing store failures. Callers treat any of these as
/// "store unavailable" and fall back to "not a duplicate".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dedup store unavailable: {0}")]
    Unavailable(String),
    #[error("dedup store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dedup store state is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A collaborator client was configured but could not be built.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("{name} is set but empty")]
    Empty { name: &'static str },
    #[error("invalid URL in {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
    #[error("invalid mailbox in {name}: {reason}")]
    Mailbox { name: &'static str, reason: String },
    #[error("partial SMTP configuration, missing {0}")]
    PartialSmtp(&'static str),
    #[error("SMTP transport setup failed: {0}")]
    Smtp(String),
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}
