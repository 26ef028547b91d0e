use serde::{Deserialize, Serialize};

/// Winner decision parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WinnerPolicy {
    /// Threshold = baseline x multiplier.
    pub multiplier: f64,
    /// Absolute threshold used while there is no positive history.
    pub fallback_threshold: u64,
}

impl Default for WinnerPolicy {
    fn default() -> Self {
        Self {
            multiplier: 2.0,
            fallback_threshold: 10,
        }
    }
}

impl WinnerPolicy {
    /// Engagement needed to count as a winner against `baseline`.
    pub fn threshold(&self, baseline: f64) -> f64 {
        if baseline > 0.0 {
            baseline * self.multiplier
        } else {
            self.fallback_threshold as f64
        }
    }
}

/// Mean of the strictly positive entries of `history`; `0.0` if there are none.
///
/// Zero (and any non-finite or negative) entries are rows that were measured
/// with no engagement, or garbage. They do not drag the baseline down.
pub fn baseline(history: &[f64]) -> f64 {
    let (sum, n) = history
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold((0.0_f64, 0_u64), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Winner iff engagement is positive and reaches the policy threshold.
pub fn classify(engagement: u64, baseline: f64, policy: &WinnerPolicy) -> bool {
    engagement > 0 && engagement as f64 >= policy.threshold(baseline)
}
