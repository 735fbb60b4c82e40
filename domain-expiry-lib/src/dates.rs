//! Expiration date normalization.
//!
//! WHOIS servers print expiration dates in whatever shape their software
//! prefers. [`DateResolver`] walks an ordered table of known layouts and
//! returns the first one that parses. The order is part of the contract:
//! reordering the table changes which layout claims an input.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

/// A textual timestamp template the resolver knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// `2025-08-13T04:00:00Z`
    IsoZulu,
    /// `2025-08-13 04:00:00`, read as UTC
    IsoSpaced,
    /// `2025-08-13 (YYYY-MM-DD)`, printed verbatim by some ccTLD registries
    AnnotatedDate,
    /// Full RFC 3339 with offset and optional fractional seconds
    Rfc3339,
    /// `2025-08-13`, midnight UTC
    DateOnly,
    /// `13-aug-2025`
    DayMonthYear,
}

/// Default lookup order.
pub const DEFAULT_LAYOUTS: &[DateLayout] = &[
    DateLayout::IsoZulu,
    DateLayout::IsoSpaced,
    DateLayout::AnnotatedDate,
    DateLayout::Rfc3339,
    DateLayout::DateOnly,
    DateLayout::DayMonthYear,
];

impl DateLayout {
    /// Try to read `raw` with this layout.
    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            Self::IsoZulu => naive_datetime(raw, "%Y-%m-%dT%H:%M:%SZ"),
            Self::IsoSpaced => naive_datetime(raw, "%Y-%m-%d %H:%M:%S"),
            Self::AnnotatedDate => naive_date(raw, "%Y-%m-%d (YYYY-MM-DD)"),
            Self::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::DateOnly => naive_date(raw, "%Y-%m-%d"),
            Self::DayMonthYear => naive_date(raw, "%d-%b-%Y"),
        }
    }
}

impl fmt::Display for DateLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IsoZulu => "YYYY-MM-DDTHH:MM:SSZ",
            Self::IsoSpaced => "YYYY-MM-DD HH:MM:SS",
            Self::AnnotatedDate => "YYYY-MM-DD (YYYY-MM-DD)",
            Self::Rfc3339 => "RFC3339",
            Self::DateOnly => "YYYY-MM-DD",
            Self::DayMonthYear => "DD-Mon-YYYY",
        };
        f.write_str(name)
    }
}

fn naive_datetime(raw: &str, fmt: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, fmt)
        .ok()
        .map(|dt| dt.and_utc())
}

fn naive_date(raw: &str, fmt: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Ordered first-match date parser.
#[derive(Debug, Clone)]
pub struct DateResolver {
    layouts: Vec<DateLayout>,
}

impl DateResolver {
    /// Resolver using [`DEFAULT_LAYOUTS`].
    pub fn new() -> Self {
        Self::with_layouts(DEFAULT_LAYOUTS.to_vec())
    }

    /// Resolver using a custom layout order.
    pub fn with_layouts(layouts: Vec<DateLayout>) -> Self {
        Self { layouts }
    }

    pub fn layouts(&self) -> &[DateLayout] {
        &self.layouts
    }

    /// Parse `raw` into an absolute instant. Returns `None` for empty input
    /// or when no layout matches.
    pub fn resolve(&self, raw: &str) -> Option<DateTime<Utc>> {
        self.resolve_with_layout(raw).map(|(when, _)| when)
    }

    /// Like [`resolve`](Self::resolve), also returning the layout that won.
    pub fn resolve_with_layout(&self, raw: &str) -> Option<(DateTime<Utc>, DateLayout)> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        self.layouts
            .iter()
            .find_map(|layout| layout.parse(raw).map(|when| (when, *layout)))
    }
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new()
    }
}
