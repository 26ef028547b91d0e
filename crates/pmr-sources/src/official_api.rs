//! Official public API adapter.
//!
//! The most reliable channel, and the slowest to reflect new posts. Share ids
//! are the same URNs stored at publish time. Statistics are usually integers;
//! anything else goes through the normalizer and degrades to 0. An element
//! without a usable id is dropped without failing its neighbours.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use pmr_schemas::PostMetric;

use crate::normalizer::{normalize_json_count, snippet};
use crate::provider::{status_error, MetricSource, SessionContext, SourceError};
use crate::transport::FeedTransport;
use crate::SourceKind;

#[derive(Debug, Deserialize)]
struct OfficialFeed {
    #[serde(default)]
    status: Option<u16>,
    #[serde(rename = "serviceErrorCode", default)]
    service_error_code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    elements: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct OfficialShare {
    #[serde(default)]
    id: Value,
    /// Activity URN the share belongs to, when the API expands it.
    #[serde(default)]
    activity: Value,
    /// Plain text, or `{"text": ..}` on some API versions.
    #[serde(default)]
    commentary: Value,
    #[serde(rename = "totalShareStatistics", default)]
    stats: Value,
}

impl OfficialShare {
    fn to_metric(&self) -> Option<PostMetric> {
        let id = self.id.as_str().map(str::trim).filter(|s| !s.is_empty())?;
        let commentary = match &self.commentary {
            Value::String(s) => s.as_str(),
            other => other.get("text").and_then(Value::as_str).unwrap_or(""),
        };
        let count = |key: &str| self.stats.get(key).map(normalize_json_count).unwrap_or(0);
        let mut m = PostMetric::new(id, snippet(commentary)).with_counts(
            count("impressionCount"),
            count("likeCount"),
            count("commentCount"),
        );
        if let Some(activity) = self.activity.as_str().map(str::trim) {
            if !activity.is_empty() && activity != id {
                m = m.with_auxiliary_id(activity);
            }
        }
        Some(m)
    }
}

pub struct OfficialApiSource {
    transport: Box<dyn FeedTransport>,
}

impl OfficialApiSource {
    pub fn new(transport: Box<dyn FeedTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait::async_trait]
impl MetricSource for OfficialApiSource {
    fn name(&self) -> &'static str {
        "official-api"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::OfficialApi
    }

    async fn fetch(&self, ctx: &SessionContext) -> Result<Vec<PostMetric>, SourceError> {
        let payload = self.transport.fetch_payload(ctx).await?;
        let metrics = translate(&payload)?;
        debug!(
            target: "pmr_sources",
            source = self.name(),
            from = %self.transport.describe(),
            posts = metrics.len(),
            "official api payload translated"
        );
        Ok(metrics)
    }
}

/// Translate an official API share-statistics payload.
pub fn translate(payload: &Value) -> Result<Vec<PostMetric>, SourceError> {
    let feed: OfficialFeed = serde_json::from_value(payload.clone())
        .map_err(|e| SourceError::Decode(format!("official api payload: {e}")))?;

    if let Some(status) = feed.status {
        let detail = match (feed.service_error_code, feed.message.as_deref()) {
            (Some(c), Some(m)) => format!("serviceErrorCode={c} {m}"),
            (Some(c), None) => format!("serviceErrorCode={c}"),
            (None, Some(m)) => m.to_string(),
            (None, None) => String::new(),
        };
        if let Some(err) = status_error(status, &detail) {
            return Err(err);
        }
    }

    Ok(feed
        .elements
        .iter()
        .filter_map(|el| {
            let share = OfficialShare::deserialize(el).unwrap_or_default();
            let metric = share.to_metric();
            if metric.is_none() {
                debug!(target: "pmr_sources", "official api element without a usable id dropped");
            }
            metric
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn translates_share_statistics() {
        let payload = json!({
            "elements": [{
                "id": "urn:li:share:999",
                "activity": "urn:li:activity:7001",
                "commentary": "Hello world, this is a test post about systems design.",
                "totalShareStatistics": {
                    "impressionCount": 150,
                    "likeCount": 8,
                    "commentCount": 4
                }
            }]
        });
        let out = translate(&payload).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].primary_id, "urn:li:share:999");
        assert!(out[0].auxiliary_ids.contains("urn:li:activity:7001"));
        assert_eq!(
            (out[0].impressions, out[0].reactions, out[0].comments),
            (150, 8, 4)
        );
        assert_eq!(out[0].engagement(), 12);
    }

    #[test]
    fn missing_statistics_are_zero() {
        let out = translate(&json!({"elements": [{"id": "urn:li:share:1"}]})).unwrap();
        assert_eq!(out[0].impressions, 0);
        assert_eq!(out[0].engagement(), 0);
    }

    #[test]
    fn blank_ids_are_dropped() {
        let out = translate(&json!({"elements": [{"id": "  "}]})).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn forbidden_envelope_is_unavailable() {
        let err = translate(&json!({
            "status": 403,
            "serviceErrorCode": 100,
            "message": "Not enough permissions"
        }))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "source unavailable: authentication rejected status=403 serviceErrorCode=100 Not enough permissions"
        );
    }

    #[test]
    fn throttle_envelope_is_rate_limited() {
        let err = translate(&json!({"status": 429})).unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn malformed_element_degrades_without_losing_neighbours() {
        let out = translate(&json!({
            "elements": [
                {
                    "id": "urn:li:share:999",
                    "totalShareStatistics": {"impressionCount": 150, "likeCount": 8, "commentCount": 4}
                },
                {"id": "urn:li:share:1000", "totalShareStatistics": {"likeCount": null, "commentCount": -3}},
                {"id": "urn:li:share:1001", "totalShareStatistics": {"likeCount": "1.2K"}},
                {"totalShareStatistics": {"likeCount": 5}},
                {"id": 42},
                "not an object"
            ]
        }))
        .unwrap();
        let ids: Vec<&str> = out.iter().map(|m| m.primary_id.as_str()).collect();
        assert_eq!(ids, vec!["urn:li:share:999", "urn:li:share:1000", "urn:li:share:1001"]);
        assert_eq!(out[0].engagement(), 12);
        assert_eq!(out[1].engagement(), 0);
        assert_eq!(out[2].reactions, 1200);
    }

    #[test]
    fn commentary_object_form_is_read() {
        let out = translate(&json!({
            "elements": [{"id": "urn:li:share:7", "commentary": {"text": "Big announcement"}}]
        }))
        .unwrap();
        assert_eq!(out[0].content_snippet, "Big announcement");
    }
}
