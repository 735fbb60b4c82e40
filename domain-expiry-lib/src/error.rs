//! Error handling for expiration checks.
//!
//! One error type covers both startup failures (bad configuration, unreadable
//! domain files) and the per-domain failures a sweep can run into. Startup
//! errors are fatal; per-domain errors only ever reach the report sink.

use std::time::Duration;
use thiserror::Error;

/// Main error type for expiration monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpiryError {
    /// The outbound WHOIS query failed (network, server, rate limit).
    #[error("WHOIS query for '{domain}' failed: {message}")]
    Query { domain: String, message: String },

    /// A WHOIS query did not complete within the configured timeout.
    #[error("Timeout after {duration:?} during: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The WHOIS response could not be turned into a structured record.
    #[error("Could not parse WHOIS record for '{domain}': {message}")]
    RecordParse { domain: String, message: String },

    /// The record's expiration field matched none of the known date layouts.
    #[error("Unrecognized expiration date format for '{domain}': {raw:?}")]
    UnrecognizedDateFormat { domain: String, raw: String },

    /// Invalid settings or an empty domain list.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A domain or configuration file could not be read.
    #[error("File error at '{path}': {message}")]
    File { path: String, message: String },
}

impl ExpiryError {
    /// Create a new query error.
    pub fn query<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::Query {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new record parse error.
    pub fn record_parse<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::RecordParse {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new unrecognized date format error carrying the raw value.
    pub fn unrecognized_date<D: Into<String>, R: Into<String>>(domain: D, raw: R) -> Self {
        Self::UnrecognizedDateFormat {
            domain: domain.into(),
            raw: raw.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error should stop the process before any check runs.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::File { .. })
    }

    /// Whether this error came from the outbound query rather than from
    /// interpreting its response.
    pub fn is_query_failure(&self) -> bool {
        matches!(self, Self::Query { .. } | Self::Timeout { .. })
    }
}

impl From<toml::de::Error> for ExpiryError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Failed to parse TOML configuration: {}", err))
    }
}
