use anyhow::Context;
use clap::Parser;
use domain_expiry_lib::{
    load_env_config, parse_duration_string, ConfigLayer, ConfigManager, DomainSet,
    ExpirationResolver, JsonSink, LogSink, MonitorConfig, ReportSink, Scheduler, WhoisBackend,
    MAX_CONCURRENCY,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod ui;

#[derive(Parser, Debug, Clone)]
#[command(name = "domain-expiry")]
#[command(version, about = "Watch domains and report how many days remain until each registration expires", long_about = None)]
pub struct Args {
    /// File with domains to monitor, one per line
    #[arg(
        short = 'f',
        long = "domain-file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub domain_file: Option<PathBuf>,

    /// Time between checks, e.g. 30m, 1h30m, 1d [default: 12h]
    #[arg(
        short = 'i',
        long = "interval",
        value_name = "DURATION",
        value_parser = parse_duration_arg,
        help_heading = "Scheduling"
    )]
    pub interval: Option<Duration>,

    /// Check every domain once and exit (non-zero if any check failed)
    #[arg(long = "once", help_heading = "Scheduling")]
    pub once: bool,

    /// Max concurrent WHOIS queries (default: 8, max: 32)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_parser = parse_concurrency_arg,
        help_heading = "Performance"
    )]
    pub concurrency: Option<usize>,

    /// Timeout for a single WHOIS query, e.g. 10s, 1500ms [default: 10s]
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "DURATION",
        value_parser = parse_duration_arg,
        help_heading = "Performance"
    )]
    pub timeout: Option<Duration>,

    /// Flag domains expiring within this many days (default: 30)
    #[arg(
        short = 'w',
        long = "warn-days",
        value_parser = clap::value_parser!(i64).range(0..),
        help_heading = "Output Format"
    )]
    pub warn_days: Option<i64>,

    /// Query this WHOIS server instead of discovering one per TLD
    #[arg(long = "whois-server", value_name = "HOST", help_heading = "Protocol")]
    pub whois_server: Option<String>,

    /// WHOIS transport: tcp (built-in) or command (system whois)
    #[arg(
        long = "backend",
        value_name = "BACKEND",
        value_parser = parse_backend_arg,
        help_heading = "Protocol"
    )]
    pub backend: Option<WhoisBackend>,

    /// Print one JSON object per domain to stdout
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Colored, aligned result lines instead of log output
    #[arg(
        short = 'p',
        long = "pretty",
        conflicts_with = "json",
        help_heading = "Output Format"
    )]
    pub pretty: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

impl Args {
    /// Values given on the command line, as the highest-precedence layer.
    fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            domain_file: self.domain_file.clone(),
            interval: self.interval,
            concurrency: self.concurrency,
            timeout: self.timeout,
            warn_days: self.warn_days,
            whois_server: self.whois_server.clone(),
            backend: self.backend,
        }
    }
}

fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    match parse_duration_string(value) {
        Some(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(format!(
            "Invalid duration '{}'. Use format like '30s', '15m', '1h30m', '1d'",
            value
        )),
    }
}

fn parse_concurrency_arg(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if (1..=MAX_CONCURRENCY).contains(&n) => Ok(n),
        _ => Err(format!("Concurrency must be between 1 and {}", MAX_CONCURRENCY)),
    }
}

fn parse_backend_arg(value: &str) -> Result<WhoisBackend, String> {
    value.parse::<WhoisBackend>().map_err(|e| e.to_string())
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("domain_expiry=debug,domain_expiry_lib=debug")
        } else {
            EnvFilter::new("domain_expiry=info,domain_expiry_lib=info")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Merge file, environment and CLI settings into the run configuration.
fn build_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let manager = ConfigManager::new(args.verbose);
    let file_config = match &args.config {
        Some(path) => manager
            .load_file(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => manager.discover_and_load(),
    };

    let config = ConfigLayer::try_from(&file_config)?
        .merge(load_env_config())
        .merge(args.to_layer())
        .into_monitor_config()?;

    Ok(config)
}

/// Returns `Ok(false)` when a `--once` run had failed checks.
async fn run(args: Args) -> anyhow::Result<bool> {
    let config = build_config(&args)?;
    let domains = DomainSet::from_file(&config.domain_file)
        .with_context(|| format!("reading domains from {}", config.domain_file.display()))?;

    let sink: Arc<dyn ReportSink> = if args.json {
        Arc::new(JsonSink::stdout())
    } else if args.pretty {
        ui::print_header(&config, domains.len(), args.once);
        Arc::new(ui::PrettySink::new(config.warn_days))
    } else {
        Arc::new(LogSink::new(config.warn_days))
    };

    let resolver = ExpirationResolver::from_config(&config);
    let scheduler = Scheduler::new(&config, domains, resolver, sink);

    if args.once {
        let summary = scheduler.sweep().await;
        if args.pretty {
            ui::print_summary(&summary, config.warn_days);
        }
        return Ok(!summary.has_failures());
    }

    let handle = scheduler.start();
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    info!("Received interrupt, shutting down");
    handle.shutdown().await.context("scheduler task failed")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_arg() {
        assert_eq!(parse_duration_arg("12h"), Ok(Duration::from_secs(43_200)));
        assert_eq!(parse_duration_arg("1h30m"), Ok(Duration::from_secs(5_400)));
        assert_eq!(parse_duration_arg("500ms"), Ok(Duration::from_millis(500)));
        assert!(parse_duration_arg("0s").is_err());
        assert!(parse_duration_arg("soon").is_err());
    }

    #[test]
    fn test_parse_concurrency_arg() {
        assert_eq!(parse_concurrency_arg("32"), Ok(32));
        assert!(parse_concurrency_arg("0").is_err());
        assert!(parse_concurrency_arg("33").is_err());
    }

    #[test]
    fn test_cli_layer_only_carries_given_flags() {
        let args = Args::parse_from(["domain-expiry", "-f", "domains.txt", "-i", "1h"]);
        let layer = args.to_layer();
        assert_eq!(layer.domain_file, Some(PathBuf::from("domains.txt")));
        assert_eq!(layer.interval, Some(Duration::from_secs(3600)));
        assert_eq!(layer.concurrency, None);
        assert_eq!(layer.backend, None);
    }

    #[test]
    fn test_json_and_pretty_conflict() {
        let result = Args::try_parse_from(["domain-expiry", "-f", "d.txt", "--json", "--pretty"]);
        assert!(result.is_err());
    }
}
