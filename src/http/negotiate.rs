//! Accept-header negotiation for error bodies.
//!
//! # Design Decisions
//! - JSON is the default: `*/*` resolves to JSON
//! - Quality values are ignored; header order is kept but not ranked
//! - Malformed media ranges are skipped, never rejected
//! - Entries are trimmed, but base and suffix are matched verbatim

use std::sync::LazyLock;

use axum::http::{header::ACCEPT, HeaderMap};
use regex::Regex;

static MEDIA_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>[^;+]+)(?:\+(?P<suffix>[^;]+))?(?:\s*;\s*(?P<params>.*))?$")
        .expect("valid regex literal")
});

/// One parsed media range, e.g. `application/vnd.api+json;v=1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptEntry {
    pub base: String,
    pub suffix: Option<String>,
    pub params: Option<String>,
}

impl AcceptEntry {
    fn parse(raw: &str) -> Option<Self> {
        let caps = MEDIA_RANGE.captures(raw.trim())?;
        // Whitespace before `;` stays part of base or suffix, so
        // `application/json ;q=1` is not a JSON range.
        let base = caps.name("base")?.as_str().to_string();
        let suffix = caps.name("suffix").map(|m| m.as_str().to_string());
        let params = caps
            .name("params")
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Some(Self {
            base,
            suffix,
            params,
        })
    }
}

/// Parse an `Accept` header value, lowercased, in header order.
pub fn parse_accept(header: &str) -> Vec<AcceptEntry> {
    header
        .to_lowercase()
        .split(',')
        .filter_map(AcceptEntry::parse)
        .collect()
}

/// Body encoding chosen for an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
    Text,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Text => "text",
        }
    }
}

/// Independent flags accumulated over all entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptFlags {
    pub any: bool,
    pub json: bool,
    pub xml: bool,
}

impl AcceptFlags {
    pub fn from_entries(entries: &[AcceptEntry]) -> Self {
        let mut flags = Self::default();
        for entry in entries {
            match entry.base.as_str() {
                "*/*" => flags.any = true,
                "application/json" => flags.json = true,
                "application/xml" | "text/xml" => flags.xml = true,
                _ => {}
            }
            match entry.suffix.as_deref() {
                Some("json") => flags.json = true,
                Some("xml") => flags.xml = true,
                _ => {}
            }
        }
        flags
    }

    pub fn preferred(&self) -> Format {
        if self.json || self.any {
            Format::Json
        } else if self.xml {
            Format::Xml
        } else {
            Format::Text
        }
    }
}

/// Choose the error body format for an `Accept` header value.
pub fn negotiate(accept: &str) -> Format {
    AcceptFlags::from_entries(&parse_accept(accept)).preferred()
}

/// Choose the error body format from request headers.
///
/// Only the first `Accept` header is considered; a missing or non-UTF-8
/// header negotiates as empty.
pub fn negotiate_headers(headers: &HeaderMap) -> Format {
    negotiate(
        headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default(),
    )
}
