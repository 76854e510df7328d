//! Terminal dashboard and status line.
//!
//! Pure presentation over calculator output: the current billing period's
//! spend summary, per-model breakdown, token/latency aggregates, recent
//! sessions, and a daily view.

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::calculator::{
    calculate_daily_usage, calculate_spend, get_billing_period, get_week_ranges,
};
use crate::config::Config;
use crate::models::{DailyUsage, SessionRecord, SpendSummary, UsageRecord};
use crate::plans;

const BAR_WIDTH: usize = 40;
/// Days shown in the daily usage table.
const DAILY_TABLE_DAYS: usize = 14;

pub struct Dashboard;

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self
    }

    /// Render the full dashboard for the current billing period.
    pub fn render(
        &self,
        records: &[UsageRecord],
        sessions: &[SessionRecord],
        config: &Config,
        now: DateTime<Utc>,
    ) {
        let plan = config.plan();
        let multipliers = config.multipliers();
        let (period_start, period_end) = get_billing_period(config.billing_cycle_day(), now);

        let period_records: Vec<UsageRecord> = records
            .iter()
            .filter(|r| r.timestamp >= period_start && r.timestamp < period_end)
            .cloned()
            .collect();

        let summary = calculate_spend(&period_records, &plan, &multipliers);
        let daily = calculate_daily_usage(&period_records, &multipliers);

        println!();
        self.render_summary(&summary, period_start, period_end, now);
        println!();
        self.render_model_breakdown(&summary);
        println!();
        self.render_token_stats(&period_records);

        let period_sessions: Vec<&SessionRecord> = sessions
            .iter()
            .filter(|s| s.start_time >= period_start && s.start_time < period_end)
            .collect();
        if !period_sessions.is_empty() {
            println!();
            self.render_sessions(&period_sessions);
        }

        if !daily.is_empty() {
            println!();
            self.render_daily(&daily);
        }

        println!();
        self.render_weekly(&daily, period_start, period_end);
        println!();
    }

    /// One-line usage summary for shell prompts and quick checks.
    pub fn render_status_line(&self, records: &[UsageRecord], config: &Config, now: DateTime<Utc>) {
        let plan = config.plan();
        let multipliers = config.multipliers();
        let (period_start, period_end) = get_billing_period(config.billing_cycle_day(), now);

        let period_records: Vec<UsageRecord> = records
            .iter()
            .filter(|r| r.timestamp >= period_start && r.timestamp < period_end)
            .cloned()
            .collect();
        let summary = calculate_spend(&period_records, &plan, &multipliers);

        let pct = summary.usage_percent();
        let usage = format!(
            "{:.0}/{} premium reqs ({:.0}%)",
            summary.premium_requests_consumed, plan.included_premium_reqs, pct
        );
        let usage = colorize_by_pct(&usage, pct);

        let overage = if summary.overage_requests > 0.0 {
            format!(
                " | {}",
                format!(
                    "Overage: {:.0} reqs (${:.2})",
                    summary.overage_requests, summary.overage_cost
                )
                .bright_red()
            )
        } else {
            String::new()
        };

        println!(
            "{} │ {}{} │ Est. spend: {} │ Period: {} – {}",
            plan.name.bright_white().bold(),
            usage,
            overage,
            format!("${:.2}", summary.total_estimated_spend)
                .bright_green()
                .bold(),
            period_start.format("%b %d"),
            period_end.format("%b %d"),
        );
    }

    fn render_summary(
        &self,
        summary: &SpendSummary,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let plan = &summary.plan;
        let days_total = (period_end - period_start).num_days();
        let days_elapsed = (now - period_start).num_days().clamp(0, days_total);
        let days_remaining = days_total - days_elapsed;

        println!("{}", "=".repeat(62).bright_cyan());
        println!("{}", "Copilot Premium Request Usage".bright_white().bold());
        println!("{}", "=".repeat(62).bright_cyan());
        println!("Plan:   {}", plan.label().bright_white().bold());
        println!(
            "Period: {} – {} ({}d elapsed, {}d remaining)",
            period_start.format("%b %d"),
            period_end.format("%b %d"),
            days_elapsed,
            days_remaining
        );

        let pct = summary.usage_percent();
        let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
        let bar = format!(
            "{}{}",
            "█".repeat(filled.min(BAR_WIDTH)),
            "░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH))
        );
        println!(
            "\n  {} {}",
            colorize_by_pct(&bar, pct),
            format!(
                "{:.0} / {} ({:.0}%)",
                summary.premium_requests_consumed, plan.included_premium_reqs, pct
            )
            .bright_white()
        );

        println!(
            "\n  Total calls: {}  Premium calls: {}  Remaining: {}",
            summary.total_calls.to_string().bright_white(),
            summary.premium_calls.to_string().bright_white(),
            format!("{:.0}", summary.included_remaining()).bright_white()
        );
        if summary.overage_requests > 0.0 {
            if plan.allows_overage {
                println!(
                    "  {}",
                    format!(
                        "Overage: {:.1} reqs → ${:.2}",
                        summary.overage_requests, summary.overage_cost
                    )
                    .bright_red()
                );
            } else {
                println!(
                    "  {}",
                    format!(
                        "Over allowance by {:.1} reqs (plan is hard-capped, no overage billing)",
                        summary.overage_requests
                    )
                    .bright_yellow()
                );
            }
        }
        println!(
            "  Est. spend: {} (plan {} + overage ${:.2})",
            format!("${:.2}", summary.total_estimated_spend)
                .bright_green()
                .bold(),
            format!("${:.2}", summary.plan_cost).bright_white(),
            summary.overage_cost
        );
    }

    fn render_model_breakdown(&self, summary: &SpendSummary) {
        if summary.model_breakdown.is_empty() {
            println!("{}", "No premium model usage this period.".bright_black());
            return;
        }

        println!("{}", "Model breakdown".bright_white().bold());
        println!(
            "  {:<28} {:>6} {:>12} {:>10} {:>10}",
            "Model".bright_black(),
            "Calls".bright_black(),
            "Premium".bright_black(),
            "Overage".bright_black(),
            "Cost".bright_black()
        );

        let mut entries: Vec<_> = summary.model_breakdown.iter().collect();
        entries.sort_by(|a, b| {
            b.1.premium_reqs
                .partial_cmp(&a.1.premium_reqs)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (family, usage) in entries {
            println!(
                "  {:<28} {:>6} {:>12.1} {:>10.1} {:>10}",
                plans::display_name(family).bright_cyan(),
                usage.calls,
                usage.premium_reqs,
                usage.overage_reqs,
                format!("${:.2}", usage.overage_cost).bright_green()
            );
        }
    }

    fn render_token_stats(&self, records: &[UsageRecord]) {
        let with_tokens: Vec<&UsageRecord> =
            records.iter().filter(|r| r.total_tokens() > 0).collect();
        if with_tokens.is_empty() {
            return;
        }

        let prompt: u64 = with_tokens.iter().map(|r| r.prompt_tokens).sum();
        let completion: u64 = with_tokens.iter().map(|r| r.completion_tokens).sum();
        let cached: u64 = with_tokens.iter().map(|r| r.cached_tokens).sum();
        let cache_rate = if prompt > 0 {
            cached as f64 / prompt as f64 * 100.0
        } else {
            0.0
        };

        let with_latency: Vec<&&UsageRecord> =
            with_tokens.iter().filter(|r| r.duration_ms > 0).collect();
        let avg_latency = if with_latency.is_empty() {
            0.0
        } else {
            with_latency.iter().map(|r| r.duration_ms).sum::<u64>() as f64
                / with_latency.len() as f64
        };

        println!("{}", "Tokens".bright_white().bold());
        println!(
            "  prompt {} • completion {} • cached {} ({:.0}% hit rate) • avg latency {:.0} ms",
            format_count(prompt).bright_white(),
            format_count(completion).bright_white(),
            format_count(cached).bright_white(),
            cache_rate,
            avg_latency
        );
    }

    fn render_sessions(&self, sessions: &[&SessionRecord]) {
        println!("{}", "Recent sessions".bright_white().bold());
        let mut sorted: Vec<&&SessionRecord> = sessions.iter().collect();
        sorted.sort_by_key(|s| std::cmp::Reverse(s.start_time));

        for session in sorted.iter().take(5) {
            let duration_min = session.duration_seconds() / 60.0;
            println!(
                "  {} {} — {} turns, {} calls, {:.0} min, models: {}",
                session.start_time.format("%b %d %H:%M"),
                short_id(&session.session_id).bright_cyan(),
                session.total_turns,
                session.total_calls,
                duration_min,
                if session.models_used.is_empty() {
                    "—".to_string()
                } else {
                    session.models_used.join(", ")
                }
            );
        }
    }

    fn render_daily(&self, daily: &[DailyUsage]) {
        println!(
            "{}",
            format!("Daily usage (last {} days)", DAILY_TABLE_DAYS)
                .bright_white()
                .bold()
        );
        println!(
            "  {:<8} {:>6} {:>8} {:>8}  {}",
            "Date".bright_black(),
            "Calls".bright_black(),
            "Premium".bright_black(),
            "Reqs".bright_black(),
            "Models".bright_black()
        );

        for day in last_n_days(daily, DAILY_TABLE_DAYS) {
            let mut families: Vec<&String> = day.models_used.keys().collect();
            families.sort();
            let models = families
                .iter()
                .map(|f| plans::display_name(f))
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "  {:<8} {:>6} {:>8} {:>8.1}  {}",
                day.date.format("%b %d").to_string(),
                day.total_calls,
                day.premium_calls,
                day.premium_requests_consumed,
                models.bright_cyan()
            );
        }
    }

    fn render_weekly(
        &self,
        daily: &[DailyUsage],
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) {
        if daily.is_empty() {
            println!("{}", "No usage recorded this period.".bright_black());
            return;
        }

        println!("{}", "Weekly consumption".bright_white().bold());
        let max_weekly: f64 = get_week_ranges(period_start, period_end)
            .iter()
            .map(|(ws, we)| week_total(daily, *ws, *we))
            .fold(0.0, f64::max)
            .max(1.0);

        for (i, (week_start, week_end)) in
            get_week_ranges(period_start, period_end).iter().enumerate()
        {
            let total = week_total(daily, *week_start, *week_end);
            let filled = ((total / max_weekly) * 24.0).round() as usize;
            println!(
                "  W{} {} – {} {:<24} {:>7.1}",
                i + 1,
                week_start.format("%b %d"),
                week_end.format("%b %d"),
                "▇".repeat(filled).bright_cyan(),
                total
            );
        }
    }
}

/// Trailing `n` entries of a date-sorted daily series.
fn last_n_days(daily: &[DailyUsage], n: usize) -> &[DailyUsage] {
    &daily[daily.len().saturating_sub(n)..]
}

fn week_total(daily: &[DailyUsage], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    daily
        .iter()
        .filter(|d| d.date >= start && d.date < end)
        .map(|d| d.premium_requests_consumed)
        .sum()
}

fn colorize_by_pct(text: &str, pct: f64) -> colored::ColoredString {
    if pct < 70.0 {
        text.bright_green()
    } else if pct < 90.0 {
        text.bright_yellow()
    } else {
        text.bright_red()
    }
}

fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn short_id(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}
