use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PostMetric, RowIndex};

/// Which matcher stage paired a ledger record with a metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    Id,
    AuxiliaryId,
    ContentExactPrefix,
    ContentFuzzy,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Id => "id",
            MatchStrategy::AuxiliaryId => "auxiliary-id",
            MatchStrategy::ContentExactPrefix => "content-exact-prefix",
            MatchStrategy::ContentFuzzy => "content-fuzzy",
        }
    }

    pub fn is_content_based(&self) -> bool {
        matches!(
            self,
            MatchStrategy::ContentExactPrefix | MatchStrategy::ContentFuzzy
        )
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pairing of one ledger record with at most one metric.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub row_index: RowIndex,
    pub metric: PostMetric,
    pub strategy: MatchStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_tags_are_kebab_case() {
        assert_eq!(MatchStrategy::AuxiliaryId.to_string(), "auxiliary-id");
        assert_eq!(
            serde_json::to_string(&MatchStrategy::ContentExactPrefix).unwrap(),
            "\"content-exact-prefix\""
        );
    }
}
