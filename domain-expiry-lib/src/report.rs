//! Report sinks.
//!
//! The scheduler hands every per-domain outcome to a [`ReportSink`]. The
//! default sink logs a line per domain; the JSON sink writes one object per
//! line for other tools to consume. Several sinks can be combined by
//! passing a `Vec<Arc<dyn ReportSink>>`.

use crate::types::ExpiryReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Receives one report per domain per sweep.
pub trait ReportSink: Send + Sync {
    fn report(&self, report: &ExpiryReport);
}

impl ReportSink for Vec<Arc<dyn ReportSink>> {
    fn report(&self, report: &ExpiryReport) {
        for sink in self {
            sink.report(report);
        }
    }
}

/// Logs `"<domain> expires in <N.NN> days"` through `tracing`.
///
/// Domains at or under `warn_days` (and expired ones) are logged at warn
/// level; lookup failures are logged at warn level with the error.
#[derive(Debug, Clone)]
pub struct LogSink {
    warn_days: i64,
}

impl LogSink {
    pub fn new(warn_days: i64) -> Self {
        Self { warn_days }
    }
}

impl ReportSink for LogSink {
    fn report(&self, report: &ExpiryReport) {
        match &report.outcome {
            Ok(status) if status.is_expired() => {
                warn!(
                    "{} expired {:.2} days ago",
                    report.domain,
                    -(status.days_remaining as f64)
                );
            }
            Ok(status) if status.days_remaining <= self.warn_days => {
                warn!(
                    "{} expires in {:.2} days",
                    report.domain, status.days_remaining as f64
                );
            }
            Ok(status) => {
                info!(
                    "{} expires in {:.2} days",
                    report.domain, status.days_remaining as f64
                );
            }
            Err(e) => {
                warn!("error getting WHOIS expiration for {}: {}", report.domain, e);
            }
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    domain: &'a str,
    checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    days_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a ExpiryReport> for JsonLine<'a> {
    fn from(report: &'a ExpiryReport) -> Self {
        let (expires_at, days_remaining, error) = match &report.outcome {
            Ok(status) => (Some(status.expires_at), Some(status.days_remaining), None),
            Err(e) => (None, None, Some(e.to_string())),
        };
        Self {
            domain: &report.domain,
            checked_at: report.checked_at,
            expires_at,
            days_remaining,
            error,
        }
    }
}

/// Writes each report as a single JSON line.
pub struct JsonSink<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer, e.g. to inspect buffered output.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> ReportSink for JsonSink<W> {
    fn report(&self, report: &ExpiryReport) {
        let line = match serde_json::to_string(&JsonLine::from(report)) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize report for {}: {}", report.domain, e);
                return;
            }
        };

        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("Failed to write report for {}: {}", report.domain, e);
        }
    }
}
