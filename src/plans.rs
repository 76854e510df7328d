//! Published GitHub Copilot plans and model multiplier pricing.
//!
//! Static reference data. The lookup functions here are the only hard-fail
//! boundary in the crate: an unknown plan key is a caller error. Unknown
//! model families get the registry default instead (1x if premium, 0x if
//! not), so the calculator always receives a fully-resolved table.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::UsageError;
use crate::models::{ModelMultiplier, Plan};

fn plan(name: &str, price: f64, included: u32, overage_rate: f64, allows_overage: bool) -> Plan {
    Plan {
        name: name.to_string(),
        price_monthly: price,
        included_premium_reqs: included,
        overage_rate,
        allows_overage,
    }
}

static PLANS: Lazy<HashMap<&'static str, Plan>> = Lazy::new(|| {
    HashMap::from([
        ("free", plan("Free", 0.0, 50, 0.0, false)),
        ("pro", plan("Pro", 10.0, 300, 0.04, true)),
        ("pro_plus", plan("Pro+", 39.0, 1500, 0.04, true)),
        ("business", plan("Business", 19.0, 300, 0.04, true)),
        ("enterprise", plan("Enterprise", 39.0, 1000, 0.04, true)),
    ])
});

/// Published premium request multipliers by model family, as the families
/// appear in CLI logs.
static DEFAULT_MULTIPLIERS: Lazy<Vec<ModelMultiplier>> = Lazy::new(|| {
    vec![
        // Non-premium (0x), included in all paid plans
        ModelMultiplier::new("gpt-4o", 0.0, "GPT-4o"),
        ModelMultiplier::new("gpt-4.1", 0.0, "GPT-4.1"),
        ModelMultiplier::new("gpt-5-mini", 0.0, "GPT-5-mini"),
        // Low multiplier
        ModelMultiplier::new("gemini-2.0-flash", 0.25, "Gemini 2.0 Flash"),
        ModelMultiplier::new("o3-mini", 0.33, "o3-mini"),
        ModelMultiplier::new("o4-mini", 0.33, "o4-mini"),
        ModelMultiplier::new("claude-haiku-4.5", 0.33, "Claude Haiku 4.5"),
        // Standard (1x)
        ModelMultiplier::new("claude-3.5-sonnet", 1.0, "Claude 3.5 Sonnet"),
        ModelMultiplier::new("claude-3.7-sonnet", 1.0, "Claude 3.7 Sonnet"),
        ModelMultiplier::new("claude-sonnet-4", 1.0, "Claude Sonnet 4"),
        ModelMultiplier::new("claude-sonnet-4.5", 1.0, "Claude Sonnet 4.5"),
        ModelMultiplier::new("claude-sonnet-4.6", 1.0, "Claude Sonnet 4.6"),
        ModelMultiplier::new("gemini-2.0-pro", 1.0, "Gemini 2.0 Pro"),
        ModelMultiplier::new("gemini-2.5-pro", 1.0, "Gemini 2.5 Pro"),
        ModelMultiplier::new("gemini-3-pro-preview", 1.0, "Gemini 3 Pro (Preview)"),
        ModelMultiplier::new("gpt-5.1", 1.0, "GPT-5.1"),
        ModelMultiplier::new("gpt-5.1-codex", 1.0, "GPT-5.1 Codex"),
        ModelMultiplier::new("gpt-5.1-codex-mini", 1.0, "GPT-5.1 Codex Mini"),
        ModelMultiplier::new("gpt-5.2", 1.0, "GPT-5.2"),
        ModelMultiplier::new("gpt-5.2-codex", 1.0, "GPT-5.2 Codex"),
        ModelMultiplier::new("gpt-5.3-codex", 1.0, "GPT-5.3 Codex"),
        // Above standard
        ModelMultiplier::new("claude-3.7-sonnet-thinking", 1.25, "Claude 3.7 Thinking"),
        // High multiplier
        ModelMultiplier::new("spark", 4.0, "Spark"),
        ModelMultiplier::new("gpt-5.1-codex-max", 5.0, "GPT-5.1 Codex Max"),
        ModelMultiplier::new("claude-opus-4", 10.0, "Claude Opus 4"),
        ModelMultiplier::new("claude-opus-4.5", 10.0, "Claude Opus 4.5"),
        ModelMultiplier::new("claude-opus-4.6", 6.0, "Claude Opus 4.6"),
        ModelMultiplier::new("claude-opus-4.6-fast", 6.0, "Claude Opus 4.6 (fast)"),
        ModelMultiplier::new("claude-opus-4.6-1m", 6.0, "Claude Opus 4.6 (1M)"),
        // Very high
        ModelMultiplier::new("gpt-4.5", 50.0, "GPT-4.5"),
    ]
});

/// Look up a plan by key. Unknown keys are a hard failure.
pub fn get_plan(plan_key: &str) -> Result<Plan, UsageError> {
    PLANS
        .get(plan_key)
        .cloned()
        .ok_or_else(|| UsageError::UnknownPlan(plan_key.to_string()))
}

/// All plan keys, sorted by monthly price for display.
pub fn plan_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = PLANS.keys().copied().collect();
    keys.sort_by(|a, b| {
        let pa = PLANS[a].price_monthly;
        let pb = PLANS[b].price_monthly;
        pa.partial_cmp(&pb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(b))
    });
    keys
}

/// Map of model family to bare multiplier value.
pub fn default_multiplier_values() -> HashMap<String, f64> {
    DEFAULT_MULTIPLIERS
        .iter()
        .map(|m| (m.model_family.clone(), m.multiplier))
        .collect()
}

/// Registry-edge default for families the table does not know.
pub fn default_multiplier(is_premium: bool) -> f64 {
    if is_premium {
        1.0
    } else {
        0.0
    }
}

/// Display name for a model family, falling back to the raw family string.
pub fn display_name(model_family: &str) -> String {
    DEFAULT_MULTIPLIERS
        .iter()
        .find(|m| m.model_family == model_family)
        .map(|m| m.display_name.clone())
        .unwrap_or_else(|| model_family.to_string())
}
