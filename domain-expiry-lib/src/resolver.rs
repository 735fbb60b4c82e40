//! Expiration lookup for a single domain.
//!
//! [`ExpirationResolver`] chains the WHOIS transport, the record parser and
//! the date resolver:
//!
//! 1. Query WHOIS. A failed query is logged and the lookup carries on with
//!    an empty response, so the parser gets the final say.
//! 2. Parse the response into a record. If that fails after a failed query
//!    the query error is returned, otherwise a `RecordParse` error.
//! 3. Read the record's expiration field with the date resolver. No match
//!    gives `UnrecognizedDateFormat` carrying the raw value.

use crate::dates::DateResolver;
use crate::error::ExpiryError;
use crate::protocols::{
    CommandWhoisClient, TcpWhoisClient, TextRecordParser, WhoisClient, WhoisRecordParser,
};
use crate::types::{MonitorConfig, WhoisBackend};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves one domain to its absolute expiration instant.
#[derive(Clone)]
pub struct ExpirationResolver {
    client: Arc<dyn WhoisClient>,
    parser: Arc<dyn WhoisRecordParser>,
    dates: DateResolver,
}

impl ExpirationResolver {
    /// Create a resolver from explicit collaborators.
    pub fn new(
        client: Arc<dyn WhoisClient>,
        parser: Arc<dyn WhoisRecordParser>,
        dates: DateResolver,
    ) -> Self {
        Self {
            client,
            parser,
            dates,
        }
    }

    /// Create a resolver with the default parser and date table, and the
    /// transport selected by `config`.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let client: Arc<dyn WhoisClient> = match config.backend {
            WhoisBackend::Tcp => {
                let client = TcpWhoisClient::with_timeout(config.query_timeout);
                match &config.whois_server {
                    Some(server) => Arc::new(client.with_server(server.clone())),
                    None => Arc::new(client),
                }
            }
            WhoisBackend::Command => {
                let client = CommandWhoisClient::with_timeout(config.query_timeout);
                match &config.whois_server {
                    Some(server) => Arc::new(client.with_server(server.clone())),
                    None => Arc::new(client),
                }
            }
        };

        Self::new(client, Arc::new(TextRecordParser::new()), DateResolver::new())
    }

    pub fn date_resolver(&self) -> &DateResolver {
        &self.dates
    }

    /// Look up when `domain` expires.
    pub async fn resolve_expiration(&self, domain: &str) -> Result<DateTime<Utc>, ExpiryError> {
        let (text, query_error) = match self.client.query(domain).await {
            Ok(text) => (text, None),
            Err(e) => {
                warn!(
                    "WHOIS query for {} failed, continuing with empty response: {}",
                    domain, e
                );
                (String::new(), Some(e))
            }
        };

        let record = match self.parser.parse(&text) {
            Ok(record) => record,
            Err(parse_error) => {
                return Err(match query_error {
                    Some(query_error) => query_error,
                    None => ExpiryError::record_parse(domain, parse_error.to_string()),
                });
            }
        };

        let raw = record.expiration_date_raw;
        match self.dates.resolve_with_layout(&raw) {
            Some((when, layout)) => {
                debug!("{}: expiration {:?} read as {}", domain, raw, layout);
                Ok(when)
            }
            None => Err(ExpiryError::unrecognized_date(domain, raw)),
        }
    }
}
