//! Pretty-mode display logic for domain-expiry CLI.
//!
//! Handles all `--pretty` output: the run header, one colored line per
//! domain report, and the `--once` summary. Uses only the `console` crate.

use console::{pad_str, style, Alignment};
use domain_expiry_lib::{ExpiryReport, MonitorConfig, ReportSink, SweepSummary};

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a pretty run.
pub fn print_header(config: &MonitorConfig, domain_count: usize, once: bool) {
    println!(
        "{} {} {}",
        style("domain-expiry").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "— Watching {} domain{}",
            domain_count,
            if domain_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let mut meta_parts: Vec<String> = Vec::new();
    if once {
        meta_parts.push("Single check".to_string());
    } else {
        meta_parts.push(format!("Every {}", format_interval(config.interval.as_secs())));
    }
    meta_parts.push(format!("Concurrency: {}", config.concurrency));
    meta_parts.push(format!("Warn at: {} days", config.warn_days));
    if let Some(server) = &config.whois_server {
        meta_parts.push(format!("Server: {}", server));
    }

    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

fn format_interval(secs: u64) -> String {
    match secs {
        s if s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

// ── Result lines ─────────────────────────────────────────────────────────────

/// Prints one aligned, colored line per report.
pub struct PrettySink {
    warn_days: i64,
}

impl PrettySink {
    pub fn new(warn_days: i64) -> Self {
        Self { warn_days }
    }
}

impl ReportSink for PrettySink {
    fn report(&self, report: &ExpiryReport) {
        println!("{}", format_report(report, self.warn_days));
    }
}

/// Format a single report line.
pub fn format_report(report: &ExpiryReport, warn_days: i64) -> String {
    let padded_domain = pad_str(&report.domain, 30, Alignment::Left, Some(".."));

    match &report.outcome {
        Ok(status) => {
            let date = status.expires_at.format("%Y-%m-%d");
            let days = status.days_remaining;
            let verdict = if days < 0 {
                style(format!("EXPIRED {} days ago", -days)).red().bold()
            } else if days <= warn_days {
                style(format!("{} days left", days)).yellow().bold()
            } else {
                style(format!("{} days left", days)).green()
            };
            format!(
                "  {}  {}  {}",
                style(&padded_domain).white(),
                verdict,
                style(format!("({})", date)).dim()
            )
        }
        Err(e) => format!(
            "  {}  {}  {}",
            style(&padded_domain).white(),
            style("ERROR").red().bold(),
            style(e.to_string()).dim()
        ),
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the tally after a `--once` sweep.
pub fn print_summary(summary: &SweepSummary, warn_days: i64) {
    println!();
    println!(
        "{} {} checked, {} ok, {} failed, {} expiring within {} days",
        style("Summary:").bold(),
        summary.checked,
        style(summary.ok).green(),
        style(summary.failed).red(),
        style(summary.expiring).yellow(),
        warn_days
    );
}
