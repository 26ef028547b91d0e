//! pmr-sources
//!
//! Metric sources: everything that turns an upstream feed into `Vec<PostMetric>`.
//!
//! - [`normalizer`]: count text (`"1.2K"`, `"3,402"`) to integers, silent on garbage
//! - [`provider`]: the [`MetricSource`] contract, [`SourceError`], [`SessionContext`]
//! - [`transport`]: where raw payloads come from (file or HTTP)
//! - three interchangeable adapters: [`scrape`], [`internal_api`], [`official_api`]
//!
//! Nothing here knows about the ledger or the matcher.

pub mod internal_api;
pub mod normalizer;
pub mod official_api;
pub mod provider;
pub mod scrape;
pub mod transport;

use std::fmt;

pub use internal_api::InternalApiSource;
pub use normalizer::{normalize_count, normalize_count_opt};
pub use official_api::OfficialApiSource;
pub use provider::{MetricSource, SessionContext, SourceError};
pub use scrape::PageScrapeSource;
pub use transport::{FeedTransport, FileFeedTransport, HttpFeedTransport};

/// The three channels the platform exposes post metrics through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Rendered feed pages, scraped by a browser harness.
    Scrape,
    /// The platform's internal (web-app) API.
    InternalApi,
    /// The official public API.
    OfficialApi,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Scrape => "scrape",
            SourceKind::InternalApi => "internal",
            SourceKind::OfficialApi => "official",
        }
    }

    pub fn parse(s: &str) -> Result<Self, SourceError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scrape" | "page" | "page-scrape" => Ok(SourceKind::Scrape),
            "internal" | "internal-api" | "voyager" => Ok(SourceKind::InternalApi),
            "official" | "official-api" | "public" => Ok(SourceKind::OfficialApi),
            other => Err(SourceError::Config(format!(
                "invalid source kind '{other}'. expected one of: scrape | internal | official"
            ))),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the adapter for `kind` on top of `transport`.
pub fn build_source(kind: SourceKind, transport: Box<dyn FeedTransport>) -> Box<dyn MetricSource> {
    match kind {
        SourceKind::Scrape => Box::new(PageScrapeSource::new(transport)),
        SourceKind::InternalApi => Box::new(InternalApiSource::new(transport)),
        SourceKind::OfficialApi => Box::new(OfficialApiSource::new(transport)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_parse() {
        assert_eq!(SourceKind::parse("scrape").unwrap(), SourceKind::Scrape);
        assert_eq!(SourceKind::parse("Internal").unwrap(), SourceKind::InternalApi);
        assert_eq!(SourceKind::parse(" official ").unwrap(), SourceKind::OfficialApi);
        assert!(SourceKind::parse("rss").is_err());
    }

    #[test]
    fn build_source_reports_kind() {
        let t = Box::new(FileFeedTransport::new("feed.json"));
        let s = build_source(SourceKind::OfficialApi, t);
        assert_eq!(s.kind(), SourceKind::OfficialApi);
        assert_eq!(s.name(), "official-api");
    }
}
