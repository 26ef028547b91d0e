//! Source boundary for post-metric collection.
//!
//! This module defines **only** the source contract, its error type and the
//! opaque session context handed to it. Concrete adapters live in sibling
//! modules; none of them are referenced here.

use std::collections::BTreeMap;
use std::fmt;

use pmr_schemas::PostMetric;

use crate::SourceKind;

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

/// Whatever session/auth state a source needs. Opaque to the rest of the system.
///
/// **Values are redacted in `Debug` output.**
#[derive(Clone, Default)]
pub struct SessionContext {
    /// Sent as `Authorization: Bearer <token>` by the HTTP transport.
    pub bearer_token: Option<String>,
    /// Sent verbatim as the `Cookie` header by the HTTP transport.
    pub cookie: Option<String>,
    /// Extra request headers (e.g. CSRF token for the internal API).
    pub headers: BTreeMap<String, String>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        f.debug_struct("SessionContext")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("cookie", &self.cookie.as_ref().map(|_| "<REDACTED>"))
            .field("headers", &header_names)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`MetricSource`] may return.
///
/// All of them are pass-level for that one source only; the orchestrator
/// decides whether another source can take over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Authentication rejected or transport unreachable.
    Unavailable(String),
    /// The source signalled throttling.
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },
    /// The payload arrived but could not be decoded into the expected shape.
    Decode(String),
    /// The source was configured with an invalid value.
    Config(String),
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {msg}"),
            SourceError::RateLimited {
                retry_after_secs: Some(s),
                message,
            } => write!(f, "source rate limited (retry after {s}s): {message}"),
            SourceError::RateLimited {
                retry_after_secs: None,
                message,
            } => write!(f, "source rate limited: {message}"),
            SourceError::Decode(msg) => write!(f, "decode error: {msg}"),
            SourceError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Map an upstream status code carried inside a payload (or an HTTP status)
/// to the matching source error. `None` for anything that is not an error.
pub(crate) fn status_error(status: u16, detail: &str) -> Option<SourceError> {
    match status {
        401 | 403 => Some(SourceError::Unavailable(format!(
            "authentication rejected status={status} {detail}"
        ))),
        429 => Some(SourceError::RateLimited {
            retry_after_secs: None,
            message: format!("status=429 {detail}"),
        }),
        s if s >= 400 => Some(SourceError::Unavailable(format!("status={s} {detail}"))),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Upstream post-metric source contract.
///
/// Object-safe so callers can hold a `Box<dyn MetricSource>` without knowing
/// the concrete variant. An empty `Vec` (no visible posts) is a valid answer.
#[async_trait::async_trait]
pub trait MetricSource: Send + Sync {
    /// Stable identifier used in logs and audit events (e.g. `"page-scrape"`).
    fn name(&self) -> &'static str;

    fn kind(&self) -> SourceKind;

    /// Fetch and translate the current feed into normalized metrics.
    async fn fetch(&self, ctx: &SessionContext) -> Result<Vec<PostMetric>, SourceError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
