//! CLI command implementations: setup, scan, dashboard, status.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use tracing::info;

use crate::config::{self, Config};
use crate::display::Dashboard;
use crate::onboarding::run_onboarding;
use crate::parser::{log_files, parse_log_file, parse_sessions};
use crate::storage::UsageDb;

/// Interactive setup, then a hint at the next step.
pub fn run_setup() -> Result<()> {
    run_onboarding()?;
    println!(
        "{}",
        "Run `copilot-usage scan` to parse your logs, then `copilot-usage` to see the dashboard."
            .bright_black()
    );
    Ok(())
}

/// Scan the log directory and cache newly found records. `force` clears the
/// cache and re-parses everything.
pub fn run_scan(force: bool) -> Result<()> {
    let Some(config) = Config::load()? else {
        print_no_config_hint();
        return Ok(());
    };

    let db = UsageDb::open(&config::db_file())?;
    if force {
        db.clear()?;
        println!(
            "{}",
            "Cleared cached data. Re-scanning all logs...".bright_yellow()
        );
    }

    let files = log_files(&config.log_dir);
    if files.is_empty() {
        println!(
            "{}",
            format!("No log files found in {}", config.log_dir.display()).bright_red()
        );
        return Ok(());
    }

    let mut new_files = 0usize;
    let mut total_records = 0usize;
    let mut total_sessions = 0usize;

    for log_file in &files {
        let filename = log_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !force && db.is_file_parsed(&filename)? {
            continue;
        }

        let records = parse_log_file(log_file)?;
        let sessions = parse_sessions(log_file)?;
        info!(
            file = %filename,
            records = records.len(),
            sessions = sessions.len(),
            "scanned log file"
        );

        if !records.is_empty() {
            db.store_records(&records, &filename)?;
            total_records += records.len();
        }
        if !sessions.is_empty() {
            db.store_sessions(&sessions)?;
            total_sessions += sessions.len();
        }
        new_files += 1;
    }

    println!(
        "{}",
        format!(
            "✓ Scanned {} new log files, found {} usage records, {} sessions",
            new_files, total_records, total_sessions
        )
        .bright_green()
    );
    println!(
        "  Total in database: {} records from {} files",
        db.record_count()?,
        db.parsed_file_count()?
    );
    Ok(())
}

/// Full dashboard over the cached records.
pub fn run_dashboard() -> Result<()> {
    let Some(config) = Config::load()? else {
        print_no_config_hint();
        return Ok(());
    };

    let db = UsageDb::open(&config::db_file())?;
    if db.record_count()? == 0 {
        print_no_data_hint();
        return Ok(());
    }

    let records = db.get_records(None, None, false)?;
    let sessions = db.get_sessions(None, None)?;
    Dashboard::new().render(&records, &sessions, &config, Utc::now());
    Ok(())
}

/// One-line usage status.
pub fn run_status() -> Result<()> {
    let Some(config) = Config::load()? else {
        print_no_config_hint();
        return Ok(());
    };

    let db = UsageDb::open(&config::db_file())?;
    if db.record_count()? == 0 {
        print_no_data_hint();
        return Ok(());
    }

    let records = db.get_records(None, None, false)?;
    Dashboard::new().render_status_line(&records, &config, Utc::now());
    Ok(())
}

fn print_no_config_hint() {
    println!(
        "{}",
        "No config found. Run `copilot-usage setup` first.".bright_red()
    );
}

fn print_no_data_hint() {
    println!(
        "{}",
        "No usage data found. Run `copilot-usage scan` to parse your logs.".bright_yellow()
    );
}
