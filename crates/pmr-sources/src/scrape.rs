//! Page-scrape adapter.
//!
//! The browser harness (external) renders the activity feed and dumps one JSON
//! object per visible post card. This module turns those cards into
//! [`PostMetric`]s: identifiers are pulled from every place a card exposes
//! them, and count labels go through the normalizer.
//!
//! Scraped pages cannot observe impressions unless the harness captured the
//! analytics label, so impressions default to `0`.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use pmr_schemas::PostMetric;

use crate::normalizer::{normalize_count_opt, snippet};
use crate::provider::{MetricSource, SessionContext, SourceError};
use crate::transport::FeedTransport;
use crate::SourceKind;

/// One rendered post card, as captured by the harness.
///
/// Every field is optional: UI markup changes without notice, and a card
/// missing a field must still produce whatever else it can.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedCard {
    /// `data-urn` attribute of the card root.
    #[serde(default)]
    pub urn: Option<String>,
    /// `data-id` attribute, sometimes present instead of (or besides) `urn`.
    #[serde(default)]
    pub data_id: Option<String>,
    /// URNs found on nested elements (reshare frames, social bars).
    #[serde(default)]
    pub nested_urns: Vec<String>,
    /// Every `href` inside the card.
    #[serde(default)]
    pub hrefs: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reactions_text: Option<String>,
    #[serde(default)]
    pub comments_text: Option<String>,
    #[serde(default)]
    pub impressions_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScrapePayload {
    Cards(Vec<ScrapedCard>),
    Wrapped {
        #[serde(default)]
        posts: Vec<ScrapedCard>,
    },
}

pub struct PageScrapeSource {
    transport: Box<dyn FeedTransport>,
}

impl PageScrapeSource {
    pub fn new(transport: Box<dyn FeedTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait::async_trait]
impl MetricSource for PageScrapeSource {
    fn name(&self) -> &'static str {
        "page-scrape"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }

    async fn fetch(&self, ctx: &SessionContext) -> Result<Vec<PostMetric>, SourceError> {
        let payload = self.transport.fetch_payload(ctx).await?;
        let metrics = translate(&payload)?;
        debug!(
            target: "pmr_sources",
            source = self.name(),
            from = %self.transport.describe(),
            posts = metrics.len(),
            "scrape payload translated"
        );
        Ok(metrics)
    }
}

/// Translate a scrape payload (a bare array of cards, or `{"posts": [...]}`).
pub fn translate(payload: &Value) -> Result<Vec<PostMetric>, SourceError> {
    let parsed: ScrapePayload = serde_json::from_value(payload.clone())
        .map_err(|e| SourceError::Decode(format!("scrape payload: {e}")))?;
    let cards = match parsed {
        ScrapePayload::Cards(c) => c,
        ScrapePayload::Wrapped { posts } => posts,
    };
    Ok(cards.iter().filter_map(card_to_metric).collect())
}

/// `None` for a card that carries neither an identifier nor text: there is
/// nothing to match it on.
pub fn card_to_metric(card: &ScrapedCard) -> Option<PostMetric> {
    let mut ids: Vec<String> = Vec::new();
    for id in [card.urn.as_deref(), card.data_id.as_deref()]
        .into_iter()
        .flatten()
        .chain(card.nested_urns.iter().map(String::as_str))
    {
        push_id(&mut ids, id);
    }
    for href in &card.hrefs {
        if let Some(id) = id_in_href(href) {
            push_id(&mut ids, &id);
        }
    }

    let text = snippet(&card.text);
    if ids.is_empty() && text.is_empty() {
        return None;
    }

    let primary_id = ids.first().cloned().unwrap_or_default();
    let mut metric = PostMetric::new(primary_id, text).with_counts(
        normalize_count_opt(card.impressions_text.as_deref()),
        normalize_count_opt(card.reactions_text.as_deref()),
        normalize_count_opt(card.comments_text.as_deref()),
    );
    for id in ids.into_iter().skip(1) {
        metric = metric.with_auxiliary_id(id);
    }
    Some(metric)
}

fn push_id(ids: &mut Vec<String>, id: &str) {
    let id = id.trim();
    if !id.is_empty() && !ids.iter().any(|x| x == id) {
        ids.push(id.to_string());
    }
}

/// Pull a post identifier out of a feed link.
///
/// Recognises an embedded (possibly percent-encoded) `urn:li:...` segment,
/// and the `..._activity-<digits>-...` slug used by vanity post URLs.
pub fn id_in_href(href: &str) -> Option<String> {
    let decoded = href.replace("%3A", ":").replace("%3a", ":");

    if let Some(start) = decoded.find("urn:li:") {
        let urn: String = decoded[start..]
            .chars()
            .take_while(|c| !matches!(c, '/' | '?' | '#' | '&' | '"' | ' '))
            .collect();
        if urn.len() > "urn:li:".len() {
            return Some(urn);
        }
    }

    if let Some(start) = decoded.find("activity-") {
        let digits: String = decoded[start + "activity-".len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return Some(format!("urn:li:activity:{digits}"));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn card_with_urn_and_counts() {
        let payload = json!([{
            "urn": "urn:li:activity:7001",
            "text": "  Shipping the new scheduler today  ",
            "reactions_text": "1.2K",
            "comments_text": "34 comments"
        }]);
        let out = translate(&payload).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].primary_id, "urn:li:activity:7001");
        assert_eq!(out[0].content_snippet, "Shipping the new scheduler today");
        assert_eq!(out[0].reactions, 1200);
        assert_eq!(out[0].comments, 34);
        assert_eq!(out[0].impressions, 0);
    }

    #[test]
    fn wrapped_payload_is_accepted() {
        let payload = json!({"posts": [{"data_id": "urn:li:share:5", "text": "x"}]});
        let out = translate(&payload).unwrap();
        assert_eq!(out[0].primary_id, "urn:li:share:5");
    }

    #[test]
    fn nested_urns_and_hrefs_become_auxiliary_ids() {
        let card = ScrapedCard {
            urn: Some("urn:li:activity:7001".to_string()),
            nested_urns: vec!["urn:li:share:999".to_string()],
            hrefs: vec![
                "https://www.linkedin.com/feed/update/urn%3Ali%3AugcPost%3A4242/".to_string(),
                "https://www.linkedin.com/posts/someone_topic-activity-7001-AbCd".to_string(),
            ],
            text: "hello".to_string(),
            ..ScrapedCard::default()
        };
        let m = card_to_metric(&card).unwrap();
        assert_eq!(m.primary_id, "urn:li:activity:7001");
        assert!(m.auxiliary_ids.contains("urn:li:share:999"));
        assert!(m.auxiliary_ids.contains("urn:li:ugcPost:4242"));
        // The vanity slug resolves to the primary id, which is not repeated.
        assert_eq!(m.auxiliary_ids.len(), 2);
    }

    #[test]
    fn card_without_id_falls_back_to_text_only() {
        let card = ScrapedCard {
            text: "only text here".to_string(),
            reactions_text: Some("garbage".to_string()),
            ..ScrapedCard::default()
        };
        let m = card_to_metric(&card).unwrap();
        assert_eq!(m.primary_id, "");
        assert_eq!(m.reactions, 0);
    }

    #[test]
    fn empty_card_is_dropped() {
        assert!(card_to_metric(&ScrapedCard::default()).is_none());
    }

    #[test]
    fn empty_feed_is_not_an_error() {
        assert!(translate(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn wrong_shape_is_decode_error() {
        let err = translate(&json!("nope")).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn href_without_id() {
        assert_eq!(id_in_href("https://www.linkedin.com/in/someone/"), None);
    }
}
