//! Read-only pattern access for scenario generation.

use chrono::{DateTime, Utc};

use crate::domain::models::{MomentPrediction, Pattern};

/// Patterns as seen by consumers outside the pattern engine.
///
/// Implementations never expose emerging candidates.
pub trait PatternSource {
    /// All promoted patterns, dormant ones included.
    fn patterns(&self) -> Vec<&Pattern>;

    /// Aggregate forecast for `moment` from non-dormant patterns.
    fn prediction_for_moment(&self, moment: DateTime<Utc>) -> MomentPrediction;

    /// Promoted patterns that still contribute to predictions.
    fn active_patterns(&self) -> Vec<&Pattern> {
        self.patterns().into_iter().filter(|p| p.is_active()).collect()
    }
}
