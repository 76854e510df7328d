//! Event correlation over raw log lines.
//!
//! Copilot CLI logs scatter the pieces of one logical billing event across
//! several non-adjacent lines with no shared identifier: a `Got model info:`
//! block carries the billing fields, a nearby `Using model:` line names the
//! model, an X-Initiator line names who triggered it, and a `cli.model_call`
//! telemetry block (somewhere close in time) carries token counts and
//! latency. This module binds those signals together with bounded
//! line-window searches and timestamp proximity.
//!
//! All functions here are pure queries against the immutable line array;
//! there is no scanning cursor or shared state.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::models::UsageRecord;
use crate::timestamp::has_timestamp_prefix;

static RE_USING_MODEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"Using model:\s*(\S+)").unwrap());
static RE_INITIATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PremiumRequestProcessor: Setting X-Initiator to '(\w+)'").unwrap()
});
static RE_MODEL_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[Telemetry\] cli\.model_call:").unwrap());
static RE_SESSION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""kind":\s*"session_start""#).unwrap());
static RE_TURN_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""kind":\s*"assistant_turn_end""#).unwrap());
static RE_SESSION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""session_id":\s*"([^"]+)""#).unwrap());

/// How far back to look for a `Using model:` line before a model-info block.
const MODEL_NAME_WINDOW: usize = 10;
/// How far back to look for an X-Initiator line.
const INITIATOR_WINDOW: usize = 20;
/// How far to look, backward then forward, for a session_id field.
const SESSION_ID_WINDOW: usize = 30;
/// How far forward to look for a session_id after a lifecycle marker.
const LIFECYCLE_FIELD_WINDOW: usize = 20;
/// Maximum timestamp distance for fallback telemetry matching, in seconds.
const TELEMETRY_TOLERANCE_SECS: f64 = 5.0;

/// One `cli.model_call` telemetry block: token counts and latency for a
/// single model invocation, with the session that issued it.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cached_tokens: u64,
    pub duration_ms: u64,
    pub session_id: String,
}

impl ModelCall {
    fn from_json(timestamp: DateTime<Utc>, value: &Value) -> Self {
        Self {
            timestamp,
            model: str_field(value, "model"),
            prompt_tokens: u64_field(value, "prompt_tokens_count"),
            completion_tokens: u64_field(value, "completion_tokens_count"),
            cached_tokens: u64_field(value, "cached_tokens_count"),
            duration_ms: u64_field(value, "duration_ms"),
            session_id: str_field(value, "session_id"),
        }
    }
}

fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn is_model_info_line(line: &str) -> bool {
    line.contains("Got model info:")
}

pub fn is_model_call_line(line: &str) -> bool {
    RE_MODEL_CALL.is_match(line)
}

pub fn is_session_start_line(line: &str) -> bool {
    RE_SESSION_START.is_match(line)
}

pub fn is_turn_end_line(line: &str) -> bool {
    RE_TURN_END.is_match(line)
}

/// Extract a brace-balanced multi-line JSON block starting at the first `{`
/// on `lines[start]`.
///
/// Continuation lines are consumed until brace depth returns to zero, or a
/// line matching the timestamp pattern with no opening brace appears (log
/// lines may wrap, so a new timestamped line is the hard block boundary).
/// Text that fails to parse as JSON is discarded.
pub fn extract_json_block(lines: &[String], start: usize) -> Option<Value> {
    let first = lines.get(start)?;
    let json_start = first.find('{')?;

    let mut block = first[json_start..].to_string();
    let mut depth = brace_delta(&block);

    let mut i = start + 1;
    while i < lines.len() && depth > 0 {
        let line = &lines[i];
        if has_timestamp_prefix(line) && !line.contains('{') {
            break;
        }
        block.push('\n');
        block.push_str(line);
        depth += brace_delta(line);
        i += 1;
    }

    match serde_json::from_str(&block) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(line = start, %err, "discarding malformed JSON block");
            None
        }
    }
}

fn brace_delta(text: &str) -> i32 {
    let mut delta = 0;
    for c in text.chars() {
        match c {
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Look backward from `before_idx` for the most recent `Using model:` line.
pub fn find_recent_model_name(lines: &[String], before_idx: usize) -> Option<String> {
    let search_start = before_idx.saturating_sub(MODEL_NAME_WINDOW);
    for i in (search_start..before_idx).rev() {
        if let Some(caps) = RE_USING_MODEL.captures(&lines[i]) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Look backward from `before_idx` for the most recent X-Initiator setting.
pub fn find_recent_initiator(lines: &[String], before_idx: usize) -> Option<String> {
    let search_start = before_idx.saturating_sub(INITIATOR_WINDOW);
    for i in (search_start..before_idx).rev() {
        if let Some(caps) = RE_INITIATOR.captures(&lines[i]) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Look for a `session_id` field near `around_idx`: backward first (nearest
/// match wins), then forward within the same window.
pub fn find_nearby_session_id(lines: &[String], around_idx: usize) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let search_start = around_idx.saturating_sub(SESSION_ID_WINDOW);
    for i in (search_start..=around_idx.min(lines.len() - 1)).rev() {
        if let Some(caps) = RE_SESSION_ID.captures(&lines[i]) {
            return Some(caps[1].to_string());
        }
    }
    let search_end = (around_idx + SESSION_ID_WINDOW).min(lines.len());
    for line in lines.iter().take(search_end).skip(around_idx + 1) {
        if let Some(caps) = RE_SESSION_ID.captures(line) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Find a `session_id` field on or after a lifecycle marker line.
pub fn find_session_id_forward(lines: &[String], around_idx: usize) -> Option<String> {
    let search_end = (around_idx + LIFECYCLE_FIELD_WINDOW).min(lines.len());
    for line in lines.iter().take(search_end).skip(around_idx) {
        if let Some(caps) = RE_SESSION_ID.captures(line) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Collect all `cli.model_call` telemetry blocks in the file. The JSON
/// payload sits on the line after the marker.
pub fn collect_model_calls(lines: &[String]) -> Vec<ModelCall> {
    let mut calls = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if !is_model_call_line(line) {
            continue;
        }
        let Some(timestamp) = crate::timestamp::leading_timestamp(line) else {
            continue;
        };
        if let Some(value) = extract_json_block(lines, i + 1) {
            calls.push(ModelCall::from_json(timestamp, &value));
        }
    }
    calls
}

/// Minute-truncated lookup key for exact telemetry matching.
pub fn minute_key(timestamp: &DateTime<Utc>, model: &str) -> String {
    format!("{}-{}", timestamp.format("%Y-%m-%dT%H:%M"), model)
}

/// Fallback telemetry matching for records pass 1 left without token data.
///
/// For each such record, claim the closest-in-time telemetry block with the
/// same model family within a 5-second tolerance. Each block is usable by at
/// most one record; first claimant wins.
pub fn enrich_unmatched_records(records: &mut [UsageRecord], model_calls: &[ModelCall]) {
    let mut used: std::collections::HashSet<usize> = std::collections::HashSet::new();

    for record in records.iter_mut() {
        if record.prompt_tokens > 0 {
            continue;
        }
        let mut best_idx: Option<usize> = None;
        let mut best_delta = f64::INFINITY;
        for (idx, call) in model_calls.iter().enumerate() {
            if used.contains(&idx) || call.model != record.model {
                continue;
            }
            let delta =
                (call.timestamp - record.timestamp).num_milliseconds().abs() as f64 / 1000.0;
            if delta < best_delta && delta < TELEMETRY_TOLERANCE_SECS {
                best_delta = delta;
                best_idx = Some(idx);
            }
        }
        if let Some(idx) = best_idx {
            let call = &model_calls[idx];
            record.prompt_tokens = call.prompt_tokens;
            record.completion_tokens = call.completion_tokens;
            record.cached_tokens = call.cached_tokens;
            record.duration_ms = call.duration_ms;
            if record.session_id.is_empty() {
                record.session_id = call.session_id.clone();
            }
            used.insert(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_single_line_block() {
        let lines = lines(&[r#"2026-02-01T12:00:00.000Z data: {"a": 1}"#]);
        let value = extract_json_block(&lines, 0).expect("should extract");
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extract_multi_line_block() {
        let lines = lines(&[
            r#"2026-02-01T12:00:00.000Z Got model info: {"#,
            r#"  "billing": {"is_premium": true, "multiplier": 6},"#,
            r#"  "capabilities": {"family": "claude-opus-4.6"}"#,
            r#"}"#,
        ]);
        let value = extract_json_block(&lines, 0).expect("should extract");
        assert_eq!(value["billing"]["multiplier"], 6);
        assert_eq!(value["capabilities"]["family"], "claude-opus-4.6");
    }

    #[test]
    fn test_block_terminated_by_timestamped_line() {
        // Unbalanced block cut off by a new timestamped line without a brace:
        // the truncated text is not valid JSON, so the event is discarded.
        let lines = lines(&[
            r#"2026-02-01T12:00:00.000Z Got model info: {"#,
            r#"  "billing": {"is_premium": true},"#,
            r#"2026-02-01T12:00:01.000Z unrelated log line"#,
            r#"}"#,
        ]);
        assert!(extract_json_block(&lines, 0).is_none());
    }

    #[test]
    fn test_timestamped_line_with_brace_continues_block() {
        // A timestamped continuation that itself contains '{' does not stop
        // the block.
        let lines = lines(&[
            r#"2026-02-01T12:00:00.000Z Got model info: {"#,
            r#"2026-02-01T12:00:00.100Z   "nested": {"x": 1}"#,
            r#"}"#,
        ]);
        // The timestamp prefix makes this invalid JSON, so parsing fails,
        // but the boundary rule must not cut the block at line 1.
        assert!(extract_json_block(&lines, 0).is_none());
    }

    #[test]
    fn test_malformed_json_discarded() {
        let lines = lines(&[r#"2026-02-01T12:00:00.000Z data: {"a": }"#]);
        assert!(extract_json_block(&lines, 0).is_none());
    }

    #[test]
    fn test_no_brace_on_start_line() {
        let lines = lines(&["2026-02-01T12:00:00.000Z nothing here"]);
        assert!(extract_json_block(&lines, 0).is_none());
    }

    #[test]
    fn test_find_recent_model_name_within_window() {
        let mut raw = vec!["2026-02-01T12:00:00.000Z Using model: gpt-5.2".to_string()];
        for _ in 0..5 {
            raw.push("filler".to_string());
        }
        assert_eq!(
            find_recent_model_name(&raw, 6),
            Some("gpt-5.2".to_string())
        );
    }

    #[test]
    fn test_find_recent_model_name_outside_window() {
        let mut raw = vec!["2026-02-01T12:00:00.000Z Using model: gpt-5.2".to_string()];
        for _ in 0..12 {
            raw.push("filler".to_string());
        }
        assert_eq!(find_recent_model_name(&raw, 12), None);
    }

    #[test]
    fn test_find_recent_initiator() {
        let raw = vec![
            "2026-02-01T12:00:00.000Z PremiumRequestProcessor: Setting X-Initiator to 'agent'"
                .to_string(),
            "filler".to_string(),
            "marker".to_string(),
        ];
        assert_eq!(find_recent_initiator(&raw, 2), Some("agent".to_string()));
        assert_eq!(find_recent_initiator(&raw, 0), None);
    }

    #[test]
    fn test_find_nearby_session_id_backward_wins() {
        let raw = vec![
            r#"  "session_id": "before""#.to_string(),
            "marker".to_string(),
            r#"  "session_id": "after""#.to_string(),
        ];
        assert_eq!(find_nearby_session_id(&raw, 1), Some("before".to_string()));
    }

    #[test]
    fn test_find_nearby_session_id_forward_fallback() {
        let raw = vec![
            "filler".to_string(),
            "marker".to_string(),
            r#"  "session_id": "after""#.to_string(),
        ];
        assert_eq!(find_nearby_session_id(&raw, 1), Some("after".to_string()));
    }

    #[test]
    fn test_collect_model_calls() {
        let raw = lines(&[
            r#"2026-02-01T12:00:30.000Z [Telemetry] cli.model_call:"#,
            r#"{"model": "claude-opus-4.6", "prompt_tokens_count": 1200, "completion_tokens_count": 340, "cached_tokens_count": 800, "duration_ms": 2100, "session_id": "sess-1"}"#,
        ]);
        let calls = collect_model_calls(&raw);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "claude-opus-4.6");
        assert_eq!(calls[0].prompt_tokens, 1200);
        assert_eq!(calls[0].session_id, "sess-1");
    }

    #[test]
    fn test_enrich_claims_each_call_once() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        let mk_record = |offset: i64| UsageRecord {
            timestamp: ts + chrono::Duration::seconds(offset),
            model: "claude-opus-4.6".to_string(),
            multiplier: 6.0,
            is_premium: true,
            initiator: "user".to_string(),
            source_file: "process-1.log".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
            cached_tokens: 0,
            duration_ms: 0,
            session_id: String::new(),
        };
        let mut records = vec![mk_record(0), mk_record(1)];
        let calls = vec![ModelCall {
            timestamp: ts,
            model: "claude-opus-4.6".to_string(),
            prompt_tokens: 500,
            completion_tokens: 100,
            cached_tokens: 0,
            duration_ms: 900,
            session_id: "sess-1".to_string(),
        }];
        enrich_unmatched_records(&mut records, &calls);
        assert_eq!(records[0].prompt_tokens, 500);
        assert_eq!(records[0].session_id, "sess-1");
        // Single telemetry block already claimed; second record stays zero.
        assert_eq!(records[1].prompt_tokens, 0);
    }

    #[test]
    fn test_enrich_respects_tolerance() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        let mut records = vec![UsageRecord {
            timestamp: ts,
            model: "claude-opus-4.6".to_string(),
            multiplier: 6.0,
            is_premium: true,
            initiator: "user".to_string(),
            source_file: "process-1.log".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
            cached_tokens: 0,
            duration_ms: 0,
            session_id: String::new(),
        }];
        let calls = vec![ModelCall {
            timestamp: ts + chrono::Duration::seconds(6),
            model: "claude-opus-4.6".to_string(),
            prompt_tokens: 500,
            completion_tokens: 100,
            cached_tokens: 0,
            duration_ms: 900,
            session_id: String::new(),
        }];
        enrich_unmatched_records(&mut records, &calls);
        assert_eq!(records[0].prompt_tokens, 0);
    }
}
