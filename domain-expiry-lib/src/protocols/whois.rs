//! WHOIS transport.
//!
//! The rest of the library only sees the [`WhoisClient`] trait: hand it a
//! domain, get raw response text back. Two adapters are provided. The TCP
//! client speaks port 43 directly and discovers the authoritative server
//! through IANA referrals. The command client shells out to the system
//! `whois` binary, which is handy when outbound port 43 is proxied.

use crate::error::ExpiryError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::debug;

/// IANA root WHOIS server, used to find the server for each TLD.
pub const IANA_WHOIS_SERVER: &str = "whois.iana.org";

/// Standard WHOIS port.
pub const WHOIS_PORT: u16 = 43;

/// Answers longer than this are cut off.
pub const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Source of raw WHOIS text for a domain.
#[async_trait]
pub trait WhoisClient: Send + Sync {
    /// Query WHOIS for `domain` and return the raw response.
    async fn query(&self, domain: &str) -> Result<String, ExpiryError>;
}

/// Port-43 WHOIS client with IANA referral discovery.
///
/// Servers discovered through IANA are cached per TLD for the lifetime of
/// the client. When the registry answer names a registrar WHOIS server
/// (thin registries such as `.com`), one extra hop is made to fetch the
/// registrar's record; if that hop fails the registry answer is used.
pub struct TcpWhoisClient {
    timeout: Duration,
    server: Option<String>,
    iana_server: String,
    port: u16,
    referrals: Mutex<HashMap<String, String>>,
}

impl TcpWhoisClient {
    /// Create a new client with a 10 second per-query timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }

    /// Create a new client with a custom per-query timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            server: None,
            iana_server: IANA_WHOIS_SERVER.to_string(),
            port: WHOIS_PORT,
            referrals: Mutex::new(HashMap::new()),
        }
    }

    /// Always query `server` instead of discovering one through IANA.
    pub fn with_server<S: Into<String>>(mut self, server: S) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Use a different root server for TLD discovery.
    pub fn with_iana_server<S: Into<String>>(mut self, server: S) -> Self {
        self.iana_server = server.into();
        self
    }

    /// Connect on a port other than 43.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn lookup(&self, domain: &str) -> Result<String, ExpiryError> {
        let server = match &self.server {
            Some(server) => return self.raw_query(server, domain, domain).await,
            None => self.server_for(domain).await?,
        };

        let response = self.raw_query(&server, domain, domain).await?;

        if let Some(referral) = parse_registrar_referral(&response) {
            if !referral.eq_ignore_ascii_case(&server) {
                debug!("Following registrar referral for {} to {}", domain, referral);
                match self.raw_query(&referral, domain, domain).await {
                    Ok(detail) if !detail.trim().is_empty() => return Ok(detail),
                    Ok(_) => debug!("Empty answer from {}, using registry record", referral),
                    Err(e) => debug!("Referral to {} failed: {}", referral, e),
                }
            }
        }

        Ok(response)
    }

    /// Find the authoritative WHOIS server for the domain's TLD.
    async fn server_for(&self, domain: &str) -> Result<String, ExpiryError> {
        let tld = domain
            .trim_end_matches('.')
            .rsplit('.')
            .next()
            .unwrap_or(domain)
            .to_lowercase();

        if let Some(server) = self.cached_referral(&tld) {
            return Ok(server);
        }

        let response = self.raw_query(&self.iana_server, domain, &tld).await?;
        let server = parse_iana_refer_response(&response).ok_or_else(|| {
            ExpiryError::query(domain, format!("No WHOIS server is known for .{}", tld))
        })?;

        debug!("Discovered WHOIS server {} for .{}", server, tld);
        self.referrals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(tld, server.clone());

        Ok(server)
    }

    fn cached_referral(&self, tld: &str) -> Option<String> {
        self.referrals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(tld)
            .cloned()
    }

    /// Send `query` to `server` and read until the server closes, at most
    /// [`MAX_RESPONSE_BYTES`]. Errors name `domain`, the lookup they belong to.
    async fn raw_query(
        &self,
        server: &str,
        domain: &str,
        query: &str,
    ) -> Result<String, ExpiryError> {
        let mut stream = TcpStream::connect((server, self.port))
            .await
            .map_err(|e| {
                ExpiryError::query(domain, format!("Failed to connect to {}: {}", server, e))
            })?;

        let line = format!("{}\r\n", format_query(server, query));
        stream.write_all(line.as_bytes()).await.map_err(|e| {
            ExpiryError::query(domain, format!("Failed to send query to {}: {}", server, e))
        })?;

        let mut buf = Vec::new();
        (&mut stream)
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| {
                ExpiryError::query(domain, format!("Failed to read answer from {}: {}", server, e))
            })?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for TcpWhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhoisClient for TcpWhoisClient {
    async fn query(&self, domain: &str) -> Result<String, ExpiryError> {
        tokio::time::timeout(self.timeout, self.lookup(domain))
            .await
            .map_err(|_| ExpiryError::timeout(format!("WHOIS query for {}", domain), self.timeout))?
    }
}

/// Some servers need a query prefix to return a single exact record.
fn format_query(server: &str, query: &str) -> String {
    match server.to_lowercase().as_str() {
        "whois.verisign-grs.com" => format!("domain {}", query),
        "whois.denic.de" => format!("-T dn,ace {}", query),
        _ => query.to_string(),
    }
}

/// WHOIS client backed by the system `whois` command.
#[derive(Clone)]
pub struct CommandWhoisClient {
    timeout: Duration,
    server: Option<String>,
}

impl CommandWhoisClient {
    /// Create a new command client with a 10 second per-query timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            server: None,
        }
    }

    /// Pass `-h <server>` to every invocation.
    pub fn with_server<S: Into<String>>(mut self, server: S) -> Self {
        self.server = Some(server.into());
        self
    }

    async fn execute_whois_command(&self, domain: &str) -> Result<String, ExpiryError> {
        let mut command = Command::new("whois");
        if let Some(server) = &self.server {
            command.arg("-h").arg(server);
        }
        command.arg(domain).kill_on_drop(true);

        let output = command.output().await.map_err(|e| {
            ExpiryError::query(
                domain,
                format!(
                    "Failed to execute whois command: {}. Make sure 'whois' is installed.",
                    e
                ),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        // whois exits non-zero for some "no match" answers but still prints them.
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExpiryError::query(
                domain,
                format!("whois exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(stdout)
    }
}

impl Default for CommandWhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhoisClient for CommandWhoisClient {
    async fn query(&self, domain: &str) -> Result<String, ExpiryError> {
        tokio::time::timeout(self.timeout, self.execute_whois_command(domain))
            .await
            .map_err(|_| ExpiryError::timeout(format!("WHOIS query for {}", domain), self.timeout))?
    }
}

/// Parse an IANA WHOIS response for the authoritative WHOIS server.
///
/// IANA uses either `refer:` or `whois:` for the server. `refer:` wins when
/// both are present.
///
/// ```text
/// whois:        whois.verisign-grs.com
/// refer:        whois.verisign-grs.com
/// ```
pub fn parse_iana_refer_response(response: &str) -> Option<String> {
    let mut whois_server = None;

    for line in response.lines() {
        let line_trimmed = line.trim();
        if let Some(server) = line_trimmed.strip_prefix("refer:") {
            let server = server.trim();
            if !server.is_empty() {
                return Some(server.to_string());
            }
        } else if let Some(server) = line_trimmed.strip_prefix("whois:") {
            let server = server.trim();
            if !server.is_empty() {
                whois_server = Some(server.to_string());
            }
        }
    }

    whois_server
}

/// Find the registrar WHOIS server named in a thin-registry answer.
pub fn parse_registrar_referral(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        if !key.trim().eq_ignore_ascii_case("registrar whois server") {
            return None;
        }
        let server = value
            .trim()
            .trim_start_matches("whois://")
            .trim_start_matches("rwhois://")
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/');
        (!server.is_empty()).then(|| server.to_string())
    })
}
