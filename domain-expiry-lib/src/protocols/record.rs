//! WHOIS response parsing.
//!
//! Turns raw WHOIS text into a [`WhoisRecord`]. Only the fields the monitor
//! needs are extracted; the expiration date is kept as the raw string so the
//! date resolver can decide how to read it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

lazy_static! {
    /// `Key: value` lines. Keys never contain a colon; values may.
    static ref FIELD_LINE: Regex =
        Regex::new(r"(?m)^[ \t]*([A-Za-z][A-Za-z0-9 ._/()\-]*?)[ \t]*:[ \t]*(.*?)[ \t\r]*$")
            .expect("field regex is valid");
}

/// Labels that carry the expiration date, most specific first.
const EXPIRATION_KEYS: &[&str] = &[
    "registry expiry date",
    "registrar registration expiration date",
    "expiration date",
    "expiry date",
    "expire date",
    "expires on",
    "expiration time",
    "expires",
    "expire",
    "paid-till",
    "valid until",
    "renewal date",
];

const DOMAIN_KEYS: &[&str] = &["domain name", "domain"];

const REGISTRAR_KEYS: &[&str] = &["registrar", "sponsoring registrar", "registrar name"];

const NOT_FOUND_PATTERNS: &[&str] = &[
    "no match",
    "not found",
    "no data found",
    "no entries found",
    "status: free",
    "status: available",
    "no matching record",
    "the queried object does not exist",
    "object does not exist",
    "this domain name has not been registered",
];

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit exceeded",
    "too many requests",
    "quota exceeded",
    "limit exceeded",
    "throttled",
    "rate-limited",
];

/// Structured view of a WHOIS response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WhoisRecord {
    /// Domain name as echoed by the server
    pub domain: Option<String>,
    /// Sponsoring registrar
    pub registrar: Option<String>,
    /// Expiration date exactly as printed; empty when the server omits it
    pub expiration_date_raw: String,
}

/// Reasons a WHOIS response could not be read as a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("WHOIS response is empty")]
    Empty,
    #[error("domain is not registered")]
    NotFound,
    #[error("WHOIS server is rate limiting queries")]
    RateLimited,
    #[error("no recognizable WHOIS fields in response")]
    Unstructured,
}

/// Turns raw WHOIS text into a [`WhoisRecord`].
pub trait WhoisRecordParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<WhoisRecord, RecordError>;
}

/// Key/value parser covering the common gTLD and ccTLD response shapes.
#[derive(Debug, Clone, Default)]
pub struct TextRecordParser;

impl TextRecordParser {
    pub fn new() -> Self {
        Self
    }
}

impl WhoisRecordParser for TextRecordParser {
    fn parse(&self, raw: &str) -> Result<WhoisRecord, RecordError> {
        if raw.trim().is_empty() {
            return Err(RecordError::Empty);
        }

        let fields = collect_fields(raw);
        let domain = first_field(&fields, DOMAIN_KEYS);
        let expiration = first_field(&fields, EXPIRATION_KEYS);

        if domain.is_none() && expiration.is_none() {
            let lower = raw.to_lowercase();
            if RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p)) {
                return Err(RecordError::RateLimited);
            }
            if NOT_FOUND_PATTERNS.iter().any(|p| lower.contains(p)) {
                return Err(RecordError::NotFound);
            }
            return Err(RecordError::Unstructured);
        }

        Ok(WhoisRecord {
            domain,
            registrar: first_field(&fields, REGISTRAR_KEYS),
            expiration_date_raw: expiration.unwrap_or_default(),
        })
    }
}

/// Lowercased key → first non-empty value. Comment lines are skipped.
fn collect_fields(raw: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    for caps in FIELD_LINE.captures_iter(raw) {
        let value = caps[2].trim();
        if value.is_empty() {
            continue;
        }
        let key = caps[1].trim().to_lowercase();
        fields.entry(key).or_insert_with(|| value.to_string());
    }

    fields
}

fn first_field(fields: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| fields.get(*key).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERISIGN_SAMPLE: &str = "   Domain Name: EXAMPLE.COM\r\n   Registry Domain ID: 2336799_DOMAIN_COM-VRSN\r\n   Registrar WHOIS Server: whois.iana.org\r\n   Updated Date: 2024-08-14T07:01:34Z\r\n   Creation Date: 1995-08-14T04:00:00Z\r\n   Registry Expiry Date: 2025-08-13T04:00:00Z\r\n   Registrar: RESERVED-Internet Assigned Numbers Authority\r\n>>> Last update of whois database: 2024-10-01T12:00:00Z <<<\r\n";

    const NOMINET_SAMPLE: &str = "\n    Domain name:\n        example.co.uk\n\n    Registrar:\n        Example Registrar Ltd\n\n    Relevant dates:\n        Registered on: 26-Jun-1996\n        Expiry date:  13-Aug-2026\n        Last updated:  10-Jun-2024\n";

    #[test]
    fn test_parses_thick_gtld_record() {
        let record = TextRecordParser::new().parse(VERISIGN_SAMPLE).unwrap();
        assert_eq!(record.domain.as_deref(), Some("EXAMPLE.COM"));
        assert_eq!(
            record.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(record.expiration_date_raw, "2025-08-13T04:00:00Z");
    }

    #[test]
    fn test_parses_indented_cctld_record() {
        let record = TextRecordParser::new().parse(NOMINET_SAMPLE).unwrap();
        assert_eq!(record.expiration_date_raw, "13-Aug-2026");
    }

    #[test]
    fn test_prefers_registry_expiry_over_registrar_expiry() {
        let raw = "Domain Name: example.net\nRegistrar Registration Expiration Date: 2026-01-01T00:00:00Z\nRegistry Expiry Date: 2025-12-31T00:00:00Z\n";
        let record = TextRecordParser::new().parse(raw).unwrap();
        assert_eq!(record.expiration_date_raw, "2025-12-31T00:00:00Z");
    }

    #[test]
    fn test_missing_expiration_yields_empty_raw() {
        let raw = "Domain Name: example.org\nRegistrar: Example\n";
        let record = TextRecordParser::new().parse(raw).unwrap();
        assert_eq!(record.expiration_date_raw, "");
    }

    #[test]
    fn test_rejects_empty_not_found_and_rate_limited() {
        let parser = TextRecordParser::new();
        assert_eq!(parser.parse(""), Err(RecordError::Empty));
        assert_eq!(parser.parse("  \r\n"), Err(RecordError::Empty));
        assert_eq!(
            parser.parse("No match for \"NOPE-12345.COM\".\r\n"),
            Err(RecordError::NotFound)
        );
        assert_eq!(
            parser.parse("Error: Too many requests, please slow down\n"),
            Err(RecordError::RateLimited)
        );
        assert_eq!(
            parser.parse("%% free-form banner without fields\n"),
            Err(RecordError::Unstructured)
        );
    }
}
