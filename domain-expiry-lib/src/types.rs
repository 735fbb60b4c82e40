//! Core data types for expiration monitoring.
//!
//! This module defines the immutable monitor configuration handed to the
//! scheduler at startup and the per-domain reports it emits.

use crate::error::ExpiryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on concurrent WHOIS queries within one sweep.
pub const MAX_CONCURRENCY: usize = 32;

/// Which transport to use for WHOIS queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhoisBackend {
    /// Port-43 client with IANA referral discovery
    #[default]
    Tcp,
    /// System `whois` command
    Command,
}

impl FromStr for WhoisBackend {
    type Err = ExpiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "command" | "cmd" | "system" => Ok(Self::Command),
            other => Err(ExpiryError::config(format!(
                "Unknown WHOIS backend '{}'. Use 'tcp' or 'command'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for WhoisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WhoisBackend::Tcp => write!(f, "tcp"),
            WhoisBackend::Command => write!(f, "command"),
        }
    }
}

/// Settings for a monitoring run.
///
/// Built once at startup from CLI flags, environment and config files, then
/// passed by value into the scheduler. Nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// File with one domain per line
    pub domain_file: PathBuf,

    /// Time between sweeps
    /// Default: 12 hours
    pub interval: Duration,

    /// Maximum WHOIS queries in flight during a sweep
    /// Default: 8, Range: 1-32
    pub concurrency: usize,

    /// Timeout for a single WHOIS query
    /// Default: 10 seconds
    pub query_timeout: Duration,

    /// Domains expiring within this many days are flagged
    /// Default: 30
    pub warn_days: i64,

    /// Fixed WHOIS server, bypassing referral discovery
    pub whois_server: Option<String>,

    /// WHOIS transport
    pub backend: WhoisBackend,
}

impl MonitorConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
    pub const DEFAULT_CONCURRENCY: usize = 8;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_WARN_DAYS: i64 = 30;

    /// Configuration with defaults for everything but the domain file.
    pub fn new<P: Into<PathBuf>>(domain_file: P) -> Self {
        Self {
            domain_file: domain_file.into(),
            interval: Self::DEFAULT_INTERVAL,
            concurrency: Self::DEFAULT_CONCURRENCY,
            query_timeout: Self::DEFAULT_TIMEOUT,
            warn_days: Self::DEFAULT_WARN_DAYS,
            whois_server: None,
            backend: WhoisBackend::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set concurrency, capped to 1..=32 so WHOIS servers are not hammered.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_warn_days(mut self, days: i64) -> Self {
        self.warn_days = days;
        self
    }

    pub fn with_whois_server<S: Into<String>>(mut self, server: S) -> Self {
        self.whois_server = Some(server.into());
        self
    }

    pub fn with_backend(mut self, backend: WhoisBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ExpiryError> {
        if self.domain_file.as_os_str().is_empty() {
            return Err(ExpiryError::config("No domain file specified"));
        }
        if self.interval.is_zero() {
            return Err(ExpiryError::config("Interval must be greater than zero"));
        }
        if self.query_timeout.is_zero() {
            return Err(ExpiryError::config("Timeout must be greater than zero"));
        }
        if self.warn_days < 0 {
            return Err(ExpiryError::config("Warning threshold cannot be negative"));
        }
        Ok(())
    }
}

/// Resolved expiry for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpiryStatus {
    /// Absolute expiration instant
    pub expires_at: DateTime<Utc>,
    /// Whole days until expiry, floored; negative once expired
    pub days_remaining: i64,
}

impl ExpiryStatus {
    pub fn is_expired(&self) -> bool {
        self.days_remaining < 0
    }
}

/// Outcome of checking one domain during one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryReport {
    /// The domain that was checked
    pub domain: String,
    /// When the check completed
    pub checked_at: DateTime<Utc>,
    /// Days remaining, or why they could not be determined
    pub outcome: Result<ExpiryStatus, ExpiryError>,
}

/// Tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub checked: usize,
    pub ok: usize,
    pub failed: usize,
    /// Domains within the warning threshold, expired ones included
    pub expiring: usize,
}

impl SweepSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
