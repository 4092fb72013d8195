use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Percentage above which the budget is reported as nearly exhausted.
pub const WARNING_THRESHOLD_PERCENT: f64 = 90.0;

/// One poll of the backend's token accounting. Never mutated; the next poll
/// replaces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenUsageSnapshot {
    pub current_usage: u64,
    pub daily_limit: u64,
    pub remaining_tokens: u64,
    pub usage_by_agent: BTreeMap<String, u64>,
    pub last_reset: NaiveDateTime,
}

impl TokenUsageSnapshot {
    pub fn new(
        current_usage: u64,
        daily_limit: u64,
        usage_by_agent: BTreeMap<String, u64>,
        last_reset: NaiveDateTime,
    ) -> Self {
        Self {
            current_usage,
            daily_limit,
            remaining_tokens: daily_limit.saturating_sub(current_usage),
            usage_by_agent,
            last_reset,
        }
    }

    /// A zero limit counts as fully used once anything was spent.
    pub fn usage_percentage(&self) -> f64 {
        if self.daily_limit == 0 {
            return if self.current_usage == 0 { 0.0 } else { 100.0 };
        }
        (self.current_usage as f64 * 100.0) / self.daily_limit as f64
    }

    pub fn exceeds(&self, threshold_percent: f64) -> bool {
        self.usage_percentage() > threshold_percent
    }
}
