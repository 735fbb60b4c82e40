//! Domain names and the domain list being monitored.

use crate::error::ExpiryError;
use std::fmt;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// A domain name, trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Domain(String);

impl Domain {
    /// Normalize and validate a domain name.
    pub fn parse(input: &str) -> Result<Self, ExpiryError> {
        let domain = input.trim().trim_end_matches('.').to_lowercase();
        validate_domain(&domain)?;
        Ok(Self(domain))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Basic syntax check. The WHOIS server has the final word.
pub fn validate_domain(domain: &str) -> Result<(), ExpiryError> {
    if domain.is_empty() {
        return Err(ExpiryError::config("Domain name cannot be empty"));
    }
    if domain.len() < 3 || domain.len() > 253 {
        return Err(ExpiryError::config(format!(
            "Domain name '{}' must be 3-253 characters",
            domain
        )));
    }
    if domain.chars().any(char::is_whitespace) {
        return Err(ExpiryError::config(format!(
            "Domain name '{}' contains whitespace",
            domain
        )));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.contains("..") {
        return Err(ExpiryError::config(format!(
            "Domain name '{}' is not a fully qualified name",
            domain
        )));
    }
    Ok(())
}

/// Ordered, non-empty list of domains, shared read-only across sweeps.
///
/// Duplicates are kept and checked independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSet {
    domains: Arc<[Domain]>,
}

impl DomainSet {
    /// Build a set from already-parsed domains. Fails when empty.
    pub fn new(domains: Vec<Domain>) -> Result<Self, ExpiryError> {
        if domains.is_empty() {
            return Err(ExpiryError::config("No domains to monitor"));
        }
        Ok(Self {
            domains: domains.into(),
        })
    }

    /// Parse every entry, failing on the first invalid one.
    pub fn from_names<I, S>(names: I) -> Result<Self, ExpiryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = names
            .into_iter()
            .map(|name| Domain::parse(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(domains)
    }

    /// Read a domain file: one domain per line, blank lines and `#` comments
    /// skipped. Invalid lines are logged and skipped; a file with no valid
    /// domain is a configuration error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ExpiryError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ExpiryError::file_error(path.to_string_lossy(), format!("Failed to read domain file: {}", e))
        })?;

        let (domains, invalid) = parse_domain_list(&content);

        for (line_num, reason) in &invalid {
            warn!("Skipping line {} of {}: {}", line_num, path.display(), reason);
        }

        if domains.is_empty() {
            return Err(ExpiryError::config(format!(
                "No domains found in {}",
                path.display()
            )));
        }

        Self::new(domains)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Domain> {
        self.domains.iter()
    }
}

impl Deref for DomainSet {
    type Target = [Domain];

    fn deref(&self) -> &Self::Target {
        &self.domains
    }
}

impl<'a> IntoIterator for &'a DomainSet {
    type Item = &'a Domain;
    type IntoIter = std::slice::Iter<'a, Domain>;

    fn into_iter(self) -> Self::IntoIter {
        self.domains.iter()
    }
}

/// Split file content into valid domains and `(line number, reason)` for
/// rejected lines.
pub fn parse_domain_list(content: &str) -> (Vec<Domain>, Vec<(usize, String)>) {
    let mut domains = Vec::new();
    let mut invalid = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let entry = line.split('#').next().unwrap_or("").trim();
        if entry.is_empty() {
            continue;
        }

        match Domain::parse(entry) {
            Ok(domain) => domains.push(domain),
            Err(e) => invalid.push((idx + 1, e.to_string())),
        }
    }

    (domains, invalid)
}
