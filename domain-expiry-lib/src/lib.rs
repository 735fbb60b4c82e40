//! # Domain Expiry Library
//!
//! Periodically looks up the registration expiry of a list of domains over
//! WHOIS and reports how many days each one has left.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_expiry_lib::{DomainSet, ExpirationResolver, LogSink, MonitorConfig, Scheduler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::new("domains.txt");
//!     let domains = DomainSet::from_file(&config.domain_file)?;
//!     let resolver = ExpirationResolver::from_config(&config);
//!     let sink = Arc::new(LogSink::new(config.warn_days));
//!
//!     let handle = Scheduler::new(&config, domains, resolver, sink).start();
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pieces
//!
//! - [`DateResolver`]: ordered first-match parsing of WHOIS date strings
//! - [`WhoisClient`] / [`WhoisRecordParser`]: pluggable transport and parser
//! - [`ExpirationResolver`]: one domain → one expiration instant
//! - [`Scheduler`]: immediate plus periodic sweeps with bounded concurrency
//! - [`ReportSink`]: where per-domain outcomes go

pub use config::{
    env_config_from, load_env_config, parse_duration_string, ConfigLayer, ConfigManager,
    FileConfig, MonitorSection, WhoisSection,
};
pub use dates::{DateLayout, DateResolver, DEFAULT_LAYOUTS};
pub use domains::{parse_domain_list, validate_domain, Domain, DomainSet};
pub use error::ExpiryError;
pub use protocols::{
    parse_iana_refer_response, parse_registrar_referral, CommandWhoisClient, RecordError,
    TcpWhoisClient, TextRecordParser, WhoisClient, WhoisRecord, WhoisRecordParser,
};
pub use report::{JsonSink, LogSink, ReportSink};
pub use resolver::ExpirationResolver;
pub use scheduler::{days_remaining, Clock, Scheduler, SchedulerHandle};
pub use types::{
    ExpiryReport, ExpiryStatus, MonitorConfig, SweepSummary, WhoisBackend, MAX_CONCURRENCY,
};

mod config;
mod dates;
mod domains;
mod error;
mod protocols;
mod report;
mod resolver;
mod scheduler;
mod types;

pub type Result<T> = std::result::Result<T, ExpiryError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
