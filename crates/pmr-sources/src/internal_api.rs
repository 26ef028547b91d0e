//! Internal (web-app) API adapter.
//!
//! The internal feed endpoint returns update elements keyed by several URN
//! namespaces at once (share, activity, entity). Which one matches the id
//! stored at publish time varies, so the most specific one becomes the
//! primary id and the rest are kept as auxiliary ids.
//!
//! Counts arrive as numbers most of the time and as display strings some of
//! the time; both go through the normalizer.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use pmr_schemas::PostMetric;

use crate::normalizer::{normalize_json_count, snippet};
use crate::provider::{status_error, MetricSource, SessionContext, SourceError};
use crate::transport::FeedTransport;
use crate::SourceKind;

#[derive(Debug, Deserialize)]
struct InternalFeed {
    /// Present on error envelopes (`{"status": 429, "message": ...}`).
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    elements: Vec<InternalElement>,
}

#[derive(Debug, Deserialize)]
struct InternalElement {
    #[serde(rename = "entityUrn", default)]
    entity_urn: Option<String>,
    #[serde(rename = "updateMetadata", default)]
    update_metadata: Option<UpdateMetadata>,
    #[serde(default)]
    commentary: Option<Commentary>,
    #[serde(rename = "socialDetail", default)]
    social_detail: Option<SocialDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateMetadata {
    #[serde(rename = "shareUrn", default)]
    share_urn: Option<String>,
    #[serde(rename = "activityUrn", default)]
    activity_urn: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Commentary {
    #[serde(default)]
    text: Value,
}

#[derive(Debug, Default, Deserialize)]
struct SocialDetail {
    #[serde(rename = "totalSocialActivityCounts", default)]
    counts: Option<ActivityCounts>,
}

#[derive(Debug, Default, Deserialize)]
struct ActivityCounts {
    #[serde(rename = "numLikes", default)]
    num_likes: Value,
    #[serde(rename = "numComments", default)]
    num_comments: Value,
    #[serde(rename = "numImpressions", default)]
    num_impressions: Value,
}

pub struct InternalApiSource {
    transport: Box<dyn FeedTransport>,
}

impl InternalApiSource {
    pub fn new(transport: Box<dyn FeedTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait::async_trait]
impl MetricSource for InternalApiSource {
    fn name(&self) -> &'static str {
        "internal-api"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::InternalApi
    }

    async fn fetch(&self, ctx: &SessionContext) -> Result<Vec<PostMetric>, SourceError> {
        let payload = self.transport.fetch_payload(ctx).await?;
        let metrics = translate(&payload)?;
        debug!(
            target: "pmr_sources",
            source = self.name(),
            from = %self.transport.describe(),
            posts = metrics.len(),
            "internal api payload translated"
        );
        Ok(metrics)
    }
}

/// Translate an internal feed payload.
///
/// An error envelope (`status` 401/403/429/5xx) maps to the matching
/// [`SourceError`] even when the transport itself saw HTTP 200.
pub fn translate(payload: &Value) -> Result<Vec<PostMetric>, SourceError> {
    let feed: InternalFeed = serde_json::from_value(payload.clone())
        .map_err(|e| SourceError::Decode(format!("internal api payload: {e}")))?;

    if let Some(status) = feed.status {
        let detail = feed.message.as_deref().unwrap_or("");
        if let Some(err) = status_error(status, detail) {
            return Err(err);
        }
    }

    Ok(feed.elements.iter().filter_map(element_to_metric).collect())
}

fn element_to_metric(el: &InternalElement) -> Option<PostMetric> {
    let meta = el.update_metadata.as_ref();
    let mut ids: Vec<String> = Vec::new();
    for id in [
        meta.and_then(|m| m.share_urn.as_deref()),
        el.entity_urn.as_deref(),
        meta.and_then(|m| m.activity_urn.as_deref()),
    ]
    .into_iter()
    .flatten()
    {
        let id = id.trim();
        if !id.is_empty() && !ids.iter().any(|x| x == id) {
            ids.push(id.to_string());
        }
    }

    let text = el
        .commentary
        .as_ref()
        .map(|c| commentary_text(&c.text))
        .unwrap_or_default();

    if ids.is_empty() && text.is_empty() {
        return None;
    }

    let counts = el.social_detail.as_ref().and_then(|s| s.counts.as_ref());
    let (impressions, reactions, comments) = match counts {
        Some(c) => (
            normalize_json_count(&c.num_impressions),
            normalize_json_count(&c.num_likes),
            normalize_json_count(&c.num_comments),
        ),
        None => (0, 0, 0),
    };

    let mut metric = PostMetric::new(ids.first().cloned().unwrap_or_default(), snippet(&text))
        .with_counts(impressions, reactions, comments);
    for id in ids.into_iter().skip(1) {
        metric = metric.with_auxiliary_id(id);
    }
    Some(metric)
}

/// Commentary text is either a string or `{"text": "..."}` depending on the
/// endpoint version.
fn commentary_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("text")
            .map(commentary_text)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "elements": [
                {
                    "entityUrn": "urn:li:fs_updateV2:(urn:li:activity:7001,MEMBER_SHARES)",
                    "updateMetadata": {
                        "shareUrn": "urn:li:share:999",
                        "activityUrn": "urn:li:activity:7001"
                    },
                    "commentary": {"text": {"text": "Hello world, this is a test post"}},
                    "socialDetail": {
                        "totalSocialActivityCounts": {
                            "numLikes": 8,
                            "numComments": "4",
                            "numImpressions": "1.5K"
                        }
                    }
                }
            ]
        })
    }

    #[test]
    fn translates_counts_and_ids() {
        let out = translate(&sample()).unwrap();
        assert_eq!(out.len(), 1);
        let m = &out[0];
        assert_eq!(m.primary_id, "urn:li:share:999");
        assert!(m.auxiliary_ids.contains("urn:li:activity:7001"));
        assert_eq!(m.auxiliary_ids.len(), 2);
        assert_eq!(m.reactions, 8);
        assert_eq!(m.comments, 4);
        assert_eq!(m.impressions, 1500);
        assert_eq!(m.content_snippet, "Hello world, this is a test post");
    }

    #[test]
    fn missing_social_detail_reports_zero_counts() {
        let payload = json!({"elements": [{"entityUrn": "urn:li:activity:1"}]});
        let out = translate(&payload).unwrap();
        assert_eq!(out[0].impressions, 0);
        assert_eq!(out[0].reactions, 0);
        assert_eq!(out[0].comments, 0);
    }

    #[test]
    fn plain_string_commentary() {
        let payload = json!({"elements": [{"entityUrn": "urn:li:activity:1", "commentary": {"text": "plain"}}]});
        assert_eq!(translate(&payload).unwrap()[0].content_snippet, "plain");
    }

    #[test]
    fn rate_limit_envelope() {
        let err = translate(&json!({"status": 429, "message": "Too many requests"})).unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn auth_envelope_is_unavailable() {
        let err = translate(&json!({"status": 401})).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn empty_elements_is_empty_list() {
        assert!(translate(&json!({"elements": []})).unwrap().is_empty());
    }
}
