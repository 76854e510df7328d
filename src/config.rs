//! User configuration: subscription plan, billing cycle anchor, log
//! directory, and multiplier overrides.
//!
//! Stored as TOML at `~/.copilot-usage/config.toml`; the record cache lives
//! next to it as `usage.db`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::models::Plan;
use crate::plans;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Plan registry key, e.g. "pro".
    pub plan: String,
    /// Day of month the billing cycle starts on (1-28).
    pub billing_cycle_day: u32,
    /// Directory holding Copilot CLI process logs.
    pub log_dir: PathBuf,
    /// Per-family multiplier overrides layered over the registry defaults.
    #[serde(default)]
    pub multiplier_overrides: HashMap<String, f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plan: "pro".to_string(),
            billing_cycle_day: 1,
            log_dir: default_log_dir(),
            multiplier_overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Load the saved config. `Ok(None)` when no config file exists yet.
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&config_file())
    }

    pub fn load_from(path: &PathBuf) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("invalid config at {}", path.display()))?;
        debug!(path = %path.display(), plan = %config.plan, "loaded config");
        Ok(Some(config))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file())
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, text)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn exists() -> bool {
        config_file().exists()
    }

    /// The configured plan. An unknown key falls back to Pro here; the
    /// registry's own lookup is the hard-fail path.
    pub fn plan(&self) -> Plan {
        plans::get_plan(&self.plan).unwrap_or_else(|_| {
            plans::get_plan("pro").expect("pro plan is always registered")
        })
    }

    /// Effective multiplier table: registry defaults plus user overrides.
    pub fn multipliers(&self) -> HashMap<String, f64> {
        let mut table = plans::default_multiplier_values();
        for (family, mult) in &self.multiplier_overrides {
            table.insert(family.clone(), *mult);
        }
        table
    }

    /// Billing cycle day clamped to a value valid in every month.
    pub fn billing_cycle_day(&self) -> u32 {
        self.billing_cycle_day.clamp(1, 28)
    }
}

/// `~/.copilot-usage`
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".copilot-usage")
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn db_file() -> PathBuf {
    config_dir().join("usage.db")
}

/// Default Copilot CLI log directory (`~/.copilot/logs`).
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".copilot")
        .join("logs")
}
