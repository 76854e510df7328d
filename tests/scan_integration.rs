//! End-to-end flow: synthetic Copilot CLI logs through extraction, caching,
//! and spend calculation.

use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

use copilot_usage::calculator::{calculate_spend, get_billing_period};
use copilot_usage::parser::{parse_log_directory, parse_log_file, parse_sessions};
use copilot_usage::plans;
use copilot_usage::storage::UsageDb;

fn write_log(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

/// Two premium opus calls with telemetry, one non-premium gpt-4o call, and
/// one full session lifecycle.
const LOG_A: &str = r#"2026-02-03T09:00:00.000Z [Telemetry] event:
{"kind": "session_start", "session_id": "11111111-aaaa"}
2026-02-03T09:00:01.000Z [info] Using model: claude-opus-4.6
2026-02-03T09:00:01.500Z PremiumRequestProcessor: Setting X-Initiator to 'user'
2026-02-03T09:00:02.000Z [debug] Got model info: {
  "billing": {"is_premium": true, "multiplier": 6},
  "capabilities": {"family": "claude-opus-4.6"}
}
2026-02-03T09:00:04.000Z [Telemetry] cli.model_call:
{"model": "claude-opus-4.6", "prompt_tokens_count": 2000, "completion_tokens_count": 500, "cached_tokens_count": 1200, "duration_ms": 3200, "session_id": "11111111-aaaa"}
2026-02-03T09:00:05.000Z [Telemetry] event:
{"kind": "assistant_turn_end", "session_id": "11111111-aaaa"}
2026-02-03T09:05:00.000Z [info] Using model: gpt-4o
2026-02-03T09:05:00.500Z [debug] Got model info: {
  "billing": {"is_premium": false, "multiplier": 0},
  "capabilities": {"family": "gpt-4o"}
}
2026-02-03T09:10:00.000Z [info] Using model: claude-opus-4.6
2026-02-03T09:10:00.500Z [debug] Got model info: {
  "billing": {"is_premium": true, "multiplier": 6},
  "capabilities": {"family": "claude-opus-4.6"}
}
2026-02-03T09:10:02.000Z [Telemetry] cli.model_call:
{"model": "claude-opus-4.6", "prompt_tokens_count": 1500, "completion_tokens_count": 300, "cached_tokens_count": 0, "duration_ms": 2500, "session_id": "11111111-aaaa"}
"#;

/// A later file with one premium gpt-5.2 call and no telemetry.
const LOG_B: &str = r#"2026-02-04T14:00:00.000Z [info] Using model: gpt-5.2
2026-02-04T14:00:00.500Z [debug] Got model info: {
  "billing": {"is_premium": true, "multiplier": 1},
  "capabilities": {"family": "gpt-5.2"}
}
"#;

#[test]
fn scan_store_and_calculate() {
    let dir = TempDir::new().unwrap();
    write_log(&dir, "process-1.log", LOG_A);
    write_log(&dir, "process-2.log", LOG_B);

    // Extraction, merged chronologically across files.
    let records = parse_log_directory(dir.path()).unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    // Telemetry enrichment carried through.
    let first = &records[0];
    assert_eq!(first.model, "claude-opus-4.6");
    assert_eq!(first.prompt_tokens, 2000);
    assert_eq!(first.session_id, "11111111-aaaa");

    // Cache round-trip with idempotent re-insert.
    let db = UsageDb::open_in_memory().unwrap();
    for name in ["process-1.log", "process-2.log"] {
        let file_records = parse_log_file(&dir.path().join(name)).unwrap();
        db.store_records(&file_records, name).unwrap();
        assert_eq!(db.store_records(&file_records, name).unwrap(), 0);
    }
    assert_eq!(db.record_count().unwrap(), 4);

    let sessions = parse_sessions(&dir.path().join("process-1.log")).unwrap();
    assert_eq!(sessions.len(), 1);
    db.store_sessions(&sessions).unwrap();
    db.store_sessions(&sessions).unwrap();
    assert_eq!(db.get_sessions(None, None).unwrap().len(), 1);

    // Spend for the billing period containing the records.
    let reference = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();
    let (start, end) = get_billing_period(1, reference);
    let cached = db.get_records(Some(start), Some(end), false).unwrap();
    assert_eq!(cached.len(), 4);

    let plan = plans::get_plan("pro").unwrap();
    let multipliers: HashMap<String, f64> = plans::default_multiplier_values();
    let summary = calculate_spend(&cached, &plan, &multipliers);

    assert_eq!(summary.total_calls, 4);
    assert_eq!(summary.premium_calls, 3);
    // 6 + 6 for opus, 1 for gpt-5.2, all within the Pro allowance.
    assert_eq!(summary.premium_requests_consumed, 13.0);
    assert_eq!(summary.overage_requests, 0.0);
    assert_eq!(summary.total_estimated_spend, 10.0);
    assert_eq!(summary.model_breakdown["claude-opus-4.6"].calls, 2);
    assert_eq!(summary.model_breakdown["gpt-5.2"].premium_reqs, 1.0);
}

#[test]
fn forced_rescan_after_clear_reaches_same_state() {
    let dir = TempDir::new().unwrap();
    write_log(&dir, "process-1.log", LOG_A);

    let db = UsageDb::open_in_memory().unwrap();
    let records = parse_log_file(&dir.path().join("process-1.log")).unwrap();
    db.store_records(&records, "process-1.log").unwrap();
    assert!(db.is_file_parsed("process-1.log").unwrap());

    db.clear().unwrap();
    assert!(!db.is_file_parsed("process-1.log").unwrap());
    db.store_records(&records, "process-1.log").unwrap();
    assert_eq!(db.record_count().unwrap(), records.len() as u64);
}

#[test]
fn premium_only_query_feeds_calculator() {
    let dir = TempDir::new().unwrap();
    write_log(&dir, "process-1.log", LOG_A);

    let db = UsageDb::open_in_memory().unwrap();
    let records = parse_log_file(&dir.path().join("process-1.log")).unwrap();
    db.store_records(&records, "process-1.log").unwrap();

    let premium = db.get_records(None, None, true).unwrap();
    assert_eq!(premium.len(), 2);
    assert!(premium.iter().all(|r| r.is_premium));
}
