//! Core Data Models
//!
//! Data structures for the Copilot usage pipeline, from raw log extraction to
//! spend reporting:
//!
//! 1. **Extraction**: [`UsageRecord`], [`SessionRecord`] - parsed from CLI log files
//! 2. **Reference data**: [`Plan`], [`ModelMultiplier`] - subscription plans and
//!    per-model premium request weights
//! 3. **Calculation output**: [`SpendSummary`], [`ModelUsage`], [`DailyUsage`] -
//!    billing-period aggregates produced by the calculator
//!
//! All public types support serde serialization so records can round-trip
//! through the cache and JSON output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single Copilot model invocation parsed from logs.
///
/// Created once by extraction and immutable afterwards, except for a single
/// enrichment pass that may fill zero-valued token/duration/session fields
/// from a matched telemetry block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    /// Model family as reported by the logs, e.g. "claude-opus-4.6".
    pub model: String,
    /// Premium request multiplier as logged.
    pub multiplier: f64,
    pub is_premium: bool,
    /// "user" or "agent"; defaults to "user" when the logs carry no initiator.
    pub initiator: String,
    /// Log file this record was parsed from.
    pub source_file: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cached_tokens: u64,
    pub duration_ms: u64,
    /// Empty string when no session could be correlated.
    pub session_id: String,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn cache_hit_rate(&self) -> f64 {
        if self.prompt_tokens == 0 {
            return 0.0;
        }
        self.cached_tokens as f64 / self.prompt_tokens as f64
    }

    /// Premium requests consumed by this invocation using its logged
    /// multiplier. Non-premium records consume zero regardless of multiplier.
    pub fn premium_requests_consumed(&self) -> f64 {
        if !self.is_premium {
            return 0.0;
        }
        self.multiplier
    }
}

/// A Copilot CLI session reconstructed from lifecycle events in one log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    /// Last-seen-timestamp semantics: only ever advances forward.
    pub end_time: Option<DateTime<Utc>>,
    /// Ordered by first use, no duplicates.
    pub models_used: Vec<String>,
    pub total_turns: u64,
    pub total_calls: u64,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_cached_tokens: u64,
    pub total_duration_ms: u64,
    pub source_file: String,
}

impl SessionRecord {
    pub fn new(session_id: String, start_time: DateTime<Utc>, source_file: String) -> Self {
        Self {
            session_id,
            start_time,
            end_time: None,
            models_used: Vec::new(),
            total_turns: 0,
            total_calls: 0,
            total_prompt_tokens: 0,
            total_completion_tokens: 0,
            total_cached_tokens: 0,
            total_duration_ms: 0,
            source_file,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        match self.end_time {
            Some(end) => (end - self.start_time).num_milliseconds() as f64 / 1000.0,
            None => 0.0,
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.total_duration_ms as f64 / self.total_calls as f64
    }
}

/// A GitHub Copilot subscription plan. Immutable reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub price_monthly: f64,
    pub included_premium_reqs: u32,
    /// Cost per overage premium request.
    pub overage_rate: f64,
    pub allows_overage: bool,
}

impl Plan {
    pub fn label(&self) -> String {
        if self.price_monthly == 0.0 {
            format!("{} (Free)", self.name)
        } else {
            format!("{} (${:.0}/mo)", self.name, self.price_monthly)
        }
    }
}

/// Premium request multiplier for a specific model family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMultiplier {
    pub model_family: String,
    pub multiplier: f64,
    pub display_name: String,
}

impl ModelMultiplier {
    pub fn new(model_family: &str, multiplier: f64, display_name: &str) -> Self {
        let display_name = if display_name.is_empty() {
            model_family.to_string()
        } else {
            display_name.to_string()
        };
        Self {
            model_family: model_family.to_string(),
            multiplier,
            display_name,
        }
    }
}

/// Per-model entry in a [`SpendSummary`] breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelUsage {
    pub calls: u64,
    pub premium_reqs: f64,
    pub overage_reqs: f64,
    pub overage_cost: f64,
    pub display_name: String,
}

/// Calculated spend for a record set against a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendSummary {
    pub plan: Plan,
    pub total_calls: u64,
    pub premium_calls: u64,
    /// Total consumed units after multipliers.
    pub premium_requests_consumed: f64,
    pub included_used: f64,
    pub overage_requests: f64,
    pub overage_cost: f64,
    pub plan_cost: f64,
    pub total_estimated_spend: f64,
    pub model_breakdown: HashMap<String, ModelUsage>,
}

impl SpendSummary {
    pub fn new(plan: &Plan) -> Self {
        Self {
            plan: plan.clone(),
            total_calls: 0,
            premium_calls: 0,
            premium_requests_consumed: 0.0,
            included_used: 0.0,
            overage_requests: 0.0,
            overage_cost: 0.0,
            plan_cost: plan.price_monthly,
            total_estimated_spend: 0.0,
            model_breakdown: HashMap::new(),
        }
    }

    pub fn included_remaining(&self) -> f64 {
        (self.plan.included_premium_reqs as f64 - self.included_used).max(0.0)
    }

    pub fn usage_percent(&self) -> f64 {
        if self.plan.included_premium_reqs == 0 {
            return 100.0;
        }
        let pct =
            self.premium_requests_consumed / self.plan.included_premium_reqs as f64 * 100.0;
        pct.min(100.0)
    }
}

/// Per-model calls/consumption within a single day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDayUsage {
    pub calls: u64,
    pub premium_reqs: f64,
}

/// Aggregated usage for a single calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Midnight-normalized date.
    pub date: DateTime<Utc>,
    pub total_calls: u64,
    pub premium_calls: u64,
    pub premium_requests_consumed: f64,
    pub models_used: HashMap<String, ModelDayUsage>,
}

impl DailyUsage {
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            date,
            total_calls: 0,
            premium_calls: 0,
            premium_requests_consumed: 0.0,
            models_used: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(is_premium: bool, multiplier: f64) -> UsageRecord {
        UsageRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap(),
            model: "claude-opus-4.6".to_string(),
            multiplier,
            is_premium,
            initiator: "user".to_string(),
            source_file: "process-1.log".to_string(),
            prompt_tokens: 1000,
            completion_tokens: 200,
            cached_tokens: 250,
            duration_ms: 1500,
            session_id: String::new(),
        }
    }

    #[test]
    fn test_non_premium_consumes_zero() {
        let r = record(false, 6.0);
        assert_eq!(r.premium_requests_consumed(), 0.0);
    }

    #[test]
    fn test_premium_consumes_multiplier() {
        let r = record(true, 6.0);
        assert_eq!(r.premium_requests_consumed(), 6.0);
    }

    #[test]
    fn test_cache_hit_rate() {
        let r = record(true, 1.0);
        assert_eq!(r.cache_hit_rate(), 0.25);

        let mut empty = record(true, 1.0);
        empty.prompt_tokens = 0;
        assert_eq!(empty.cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_plan_label() {
        let free = Plan {
            name: "Free".to_string(),
            price_monthly: 0.0,
            included_premium_reqs: 50,
            overage_rate: 0.0,
            allows_overage: false,
        };
        assert_eq!(free.label(), "Free (Free)");

        let pro = Plan {
            name: "Pro".to_string(),
            price_monthly: 10.0,
            included_premium_reqs: 300,
            overage_rate: 0.04,
            allows_overage: true,
        };
        assert_eq!(pro.label(), "Pro ($10/mo)");
    }

    #[test]
    fn test_session_duration() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        let mut s = SessionRecord::new("s1".to_string(), start, "process-1.log".to_string());
        assert_eq!(s.duration_seconds(), 0.0);

        s.end_time = Some(start + chrono::Duration::seconds(90));
        assert_eq!(s.duration_seconds(), 90.0);
    }

    #[test]
    fn test_usage_percent_caps_at_hundred() {
        let plan = Plan {
            name: "Pro".to_string(),
            price_monthly: 10.0,
            included_premium_reqs: 300,
            overage_rate: 0.04,
            allows_overage: true,
        };
        let mut summary = SpendSummary::new(&plan);
        summary.premium_requests_consumed = 450.0;
        assert_eq!(summary.usage_percent(), 100.0);
    }
}
