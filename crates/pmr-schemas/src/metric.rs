use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One post's observed performance, as produced by any metric source.
///
/// Counts are never omitted: a source that cannot observe impressions
/// reports `0`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetric {
    /// Best-known identifier (full URN or bare numeric suffix).
    pub primary_id: String,
    /// Secondary identifiers found incidentally (nested elements, hrefs).
    pub auxiliary_ids: BTreeSet<String>,
    /// Leading text of the post, used only for fallback matching.
    pub content_snippet: String,
    pub impressions: u64,
    pub reactions: u64,
    pub comments: u64,
}

impl PostMetric {
    pub fn new(primary_id: impl Into<String>, content_snippet: impl Into<String>) -> Self {
        Self {
            primary_id: primary_id.into(),
            content_snippet: content_snippet.into(),
            ..Self::default()
        }
    }

    pub fn with_counts(mut self, impressions: u64, reactions: u64, comments: u64) -> Self {
        self.impressions = impressions;
        self.reactions = reactions;
        self.comments = comments;
        self
    }

    pub fn with_auxiliary_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.trim().is_empty() {
            self.auxiliary_ids.insert(id);
        }
        self
    }

    /// Engagement = reactions + comments.
    pub fn engagement(&self) -> u64 {
        self.reactions.saturating_add(self.comments)
    }
}
