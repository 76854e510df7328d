//! Interactive first-run setup: pick a plan, anchor the billing cycle, and
//! point at the Copilot CLI log directory.

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, Select};
use std::path::PathBuf;

use crate::config::{self, Config};
use crate::plans;

/// Run the setup wizard and persist the resulting config.
pub fn run_onboarding() -> Result<Config> {
    println!(
        "\n{}\n",
        "Copilot usage tracker setup".bright_white().bold()
    );

    let keys = plans::plan_keys();
    let labels: Vec<String> = keys
        .iter()
        .filter_map(|k| plans::get_plan(k).ok())
        .map(|plan| {
            format!(
                "{:<18} {} premium reqs/mo",
                plan.label(),
                plan.included_premium_reqs
            )
        })
        .collect();

    let default_idx = keys.iter().position(|k| *k == "pro").unwrap_or(0);
    let selection = Select::new()
        .with_prompt("Which Copilot plan are you on?")
        .items(&labels)
        .default(default_idx)
        .interact()?;

    let billing_cycle_day: u32 = Input::new()
        .with_prompt("Day of month your billing cycle starts (1-28)")
        .default(1)
        .validate_with(|day: &u32| {
            if (1..=28).contains(day) {
                Ok(())
            } else {
                Err("must be between 1 and 28")
            }
        })
        .interact_text()?;

    let log_dir: String = Input::new()
        .with_prompt("Copilot CLI log directory")
        .default(config::default_log_dir().to_string_lossy().into_owned())
        .interact_text()?;

    let config = Config {
        plan: keys[selection].to_string(),
        billing_cycle_day,
        log_dir: PathBuf::from(log_dir),
        multiplier_overrides: Default::default(),
    };
    config.save()?;

    println!(
        "\n{} Config saved to {}",
        "✓".bright_green(),
        config::config_file().display()
    );
    Ok(config)
}
