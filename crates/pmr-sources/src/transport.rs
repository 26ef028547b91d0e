//! Raw feed transports.
//!
//! A transport only moves bytes and maps transport-level failures onto
//! [`SourceError`]. It does not know which adapter will read the payload.
//! Retries, backoff and credential refresh are deliberately absent.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::provider::{status_error, SessionContext, SourceError};

/// Where an adapter's raw payload comes from.
#[async_trait::async_trait]
pub trait FeedTransport: Send + Sync {
    /// Human-readable location for logs (path or URL). Never includes secrets.
    fn describe(&self) -> String;

    async fn fetch_payload(&self, ctx: &SessionContext) -> Result<Value, SourceError>;
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Reads a JSON payload captured to disk (e.g. by an external browser harness).
#[derive(Debug, Clone)]
pub struct FileFeedTransport {
    path: PathBuf,
}

impl FileFeedTransport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl FeedTransport for FileFeedTransport {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn fetch_payload(&self, _ctx: &SessionContext) -> Result<Value, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::Unavailable(format!("read '{}': {e}", self.path.display()))
        })?;
        // Strip UTF-8 BOM if present.
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
        serde_json::from_str(raw)
            .map_err(|e| SourceError::Decode(format!("'{}': {e}", self.path.display())))
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Plain HTTP GET returning a JSON body.
///
/// Session state is applied as headers: bearer token, `Cookie`, and any extra
/// headers. Token/cookie values are never logged.
#[derive(Debug, Clone)]
pub struct HttpFeedTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpFeedTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl FeedTransport for HttpFeedTransport {
    fn describe(&self) -> String {
        // Query strings may carry keys; keep them out of logs.
        let base = self.url.split('?').next().unwrap_or(&self.url);
        format!("http:{base}")
    }

    async fn fetch_payload(&self, ctx: &SessionContext) -> Result<Value, SourceError> {
        let mut req = self.http.get(&self.url);
        if let Some(token) = &ctx.bearer_token {
            req = req.bearer_auth(token);
        }
        if let Some(cookie) = &ctx.cookie {
            req = req.header(reqwest::header::COOKIE, cookie);
        }
        for (name, value) in &ctx.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        debug!(target: "pmr_sources", url = %self.describe(), status = status.as_u16(), "feed response");

        if status.as_u16() == 429 {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(SourceError::RateLimited {
                retry_after_secs,
                message: format!("http status=429 from {}", self.describe()),
            });
        }
        if let Some(err) = status_error(status.as_u16(), &self.describe()) {
            return Err(err);
        }

        resp.json::<Value>()
            .await
            .map_err(|e| SourceError::Decode(format!("response json decode failed: {e}")))
    }
}

// -----------------
// Tests (no network)
// -----------------

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::io::Write;

    #[tokio::test]
    async fn file_transport_reads_json() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{\"elements\": []}}").unwrap();
        let t = FileFeedTransport::new(f.path());
        let v = t.fetch_payload(&SessionContext::anonymous()).await.unwrap();
        assert_eq!(v, json!({"elements": []}));
    }

    #[tokio::test]
    async fn file_transport_missing_file_is_unavailable() {
        let t = FileFeedTransport::new("/definitely/not/here.json");
        let err = t
            .fetch_payload(&SessionContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn file_transport_bad_json_is_decode_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "not json").unwrap();
        let t = FileFeedTransport::new(f.path());
        let err = t
            .fetch_payload(&SessionContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn http_transport_sends_session_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/feed")
                    .header("authorization", "Bearer tok-1")
                    .header("cookie", "li_at=abc")
                    .header("csrf-token", "ajax:9");
                then.status(200).json_body(json!({"elements": [{"id": "1"}]}));
            })
            .await;

        let t = HttpFeedTransport::new(server.url("/feed"));
        let ctx = SessionContext::anonymous()
            .with_bearer_token("tok-1")
            .with_cookie("li_at=abc")
            .with_header("csrf-token", "ajax:9");
        let v = t.fetch_payload(&ctx).await.unwrap();

        mock.assert_async().await;
        assert_eq!(v["elements"][0]["id"], "1");
    }

    #[tokio::test]
    async fn http_401_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/feed");
                then.status(401);
            })
            .await;

        let t = HttpFeedTransport::new(server.url("/feed"));
        let err = t
            .fetch_payload(&SessionContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn http_429_is_rate_limited_with_retry_after() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/feed");
                then.status(429).header("retry-after", "30");
            })
            .await;

        let t = HttpFeedTransport::new(server.url("/feed"));
        let err = t
            .fetch_payload(&SessionContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SourceError::RateLimited {
                retry_after_secs: Some(30),
                message: format!("http status=429 from {}", t.describe()),
            }
        );
    }

    #[test]
    fn describe_drops_query_string() {
        let t = HttpFeedTransport::new("https://api.example.test/feed?key=secret");
        assert_eq!(t.describe(), "http:https://api.example.test/feed");
    }
}
