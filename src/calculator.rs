//! Spend calculation engine: premium request consumption, allowance/overage
//! split, and billing-period math.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::models::{DailyUsage, ModelDayUsage, Plan, SpendSummary, UsageRecord};

/// Calculate the spend summary for a set of usage records against a plan.
///
/// Records are replayed in chronological order: the earliest premium requests
/// consume the included allowance, and once it is exhausted subsequent
/// requests are overage at the plan's rate. A record that straddles the
/// boundary is split, so per-model cost reflects only the overage portion
/// that model actually incurred.
pub fn calculate_spend(
    records: &[UsageRecord],
    plan: &Plan,
    multipliers: &HashMap<String, f64>,
) -> SpendSummary {
    let mut sorted: Vec<&UsageRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let mut summary = SpendSummary::new(plan);
    let mut remaining_included = plan.included_premium_reqs as f64;

    for record in sorted {
        summary.total_calls += 1;

        if !record.is_premium {
            continue;
        }
        summary.premium_calls += 1;

        // A corrected multiplier table overrides whatever the logs recorded.
        let mult = resolve_multiplier(multipliers, record);
        summary.premium_requests_consumed += mult;

        let entry = summary.model_breakdown.entry(record.model.clone()).or_default();
        entry.calls += 1;
        entry.premium_reqs += mult;
        entry.display_name = record.model.clone();

        if remaining_included >= mult {
            remaining_included -= mult;
        } else if remaining_included > 0.0 {
            let overage_portion = mult - remaining_included;
            remaining_included = 0.0;
            if plan.allows_overage {
                entry.overage_reqs += overage_portion;
                entry.overage_cost += overage_portion * plan.overage_rate;
            }
        } else if plan.allows_overage {
            entry.overage_reqs += mult;
            entry.overage_cost += mult * plan.overage_rate;
        }
    }

    // Aggregate fields derive from the running totals, not from re-summing
    // the breakdown.
    let allowance = plan.included_premium_reqs as f64;
    summary.included_used = summary.premium_requests_consumed.min(allowance);
    summary.overage_requests = (summary.premium_requests_consumed - allowance).max(0.0);
    if plan.allows_overage {
        summary.overage_cost = summary.overage_requests * plan.overage_rate;
    }
    summary.total_estimated_spend = plan.price_monthly + summary.overage_cost;

    debug!(
        total_calls = summary.total_calls,
        premium_calls = summary.premium_calls,
        consumed = summary.premium_requests_consumed,
        overage = summary.overage_requests,
        "calculated spend"
    );
    summary
}

/// Group usage records by calendar day. A pure aggregate: no allowance or
/// overage logic, independent of plan.
pub fn calculate_daily_usage(
    records: &[UsageRecord],
    multipliers: &HashMap<String, f64>,
) -> Vec<DailyUsage> {
    let mut daily: HashMap<chrono::NaiveDate, DailyUsage> = HashMap::new();

    for record in records {
        let day_key = record.timestamp.date_naive();
        let entry = daily.entry(day_key).or_insert_with(|| {
            DailyUsage::new(
                record
                    .timestamp
                    .with_time(chrono::NaiveTime::MIN)
                    .single()
                    .unwrap_or(record.timestamp),
            )
        });

        entry.total_calls += 1;
        if record.is_premium {
            entry.premium_calls += 1;
            let mult = resolve_multiplier(multipliers, record);
            entry.premium_requests_consumed += mult;

            let model = entry
                .models_used
                .entry(record.model.clone())
                .or_insert_with(ModelDayUsage::default);
            model.calls += 1;
            model.premium_reqs += mult;
        }
    }

    let mut result: Vec<DailyUsage> = daily.into_values().collect();
    result.sort_by_key(|d| d.date);
    result
}

/// Table value for the record's model family, else the multiplier the logs
/// recorded.
fn resolve_multiplier(multipliers: &HashMap<String, f64>, record: &UsageRecord) -> f64 {
    multipliers
        .get(&record.model)
        .copied()
        .unwrap_or(record.multiplier)
}

/// Current billing period as a half-open `[start, end)` window anchored to
/// the configured cycle start day.
pub fn get_billing_period(
    billing_cycle_day: u32,
    reference: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    // Clamped to 28 so the anchor day exists in every month.
    let start_day = billing_cycle_day.clamp(1, 28);

    let (mut year, mut month) = (reference.year(), reference.month());
    if reference.day() < start_day {
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    let start = Utc
        .with_ymd_and_hms(year, month, start_day, 0, 0, 0)
        .unwrap();

    let (end_year, end_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = Utc
        .with_ymd_and_hms(end_year, end_month, start_day, 0, 0, 0)
        .unwrap();

    (start, end)
}

/// Partition `[start, end)` into consecutive 7-day chunks, the last truncated
/// to end exactly at `end`.
pub fn get_week_ranges(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut weeks = Vec::new();
    let mut current = start;
    while current < end {
        let week_end = (current + Duration::days(7)).min(end);
        weeks.push((current, week_end));
        current = week_end;
    }
    weeks
}
