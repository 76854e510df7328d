//! Log-file extraction: turn Copilot CLI process logs into usage records and
//! session records.
//!
//! A missing file or directory is a valid "nothing to parse" result, not an
//! error. Malformed JSON blocks and unparseable timestamps are skipped; one
//! bad line never aborts a file scan.

pub mod correlator;

use anyhow::Result;
use chrono::{DateTime, Utc};
use glob::glob;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::{SessionRecord, UsageRecord};
use crate::plans;
use crate::timestamp::leading_timestamp;
use correlator::{
    collect_model_calls, enrich_unmatched_records, extract_json_block, find_nearby_session_id,
    find_recent_initiator, find_recent_model_name, find_session_id_forward, is_model_call_line,
    is_model_info_line, is_session_start_line, is_turn_end_line, minute_key, ModelCall,
};

/// Parse one Copilot CLI log file into time-ordered usage records.
pub fn parse_log_file(filepath: &Path) -> Result<Vec<UsageRecord>> {
    let Some(lines) = read_lines(filepath)? else {
        return Ok(Vec::new());
    };
    let source_file = file_name(filepath);

    // Telemetry first: token/latency data keyed for exact minute+model match.
    let model_calls = collect_model_calls(&lines);
    let mut call_lookup: HashMap<String, &ModelCall> = HashMap::new();
    for call in &model_calls {
        call_lookup.insert(minute_key(&call.timestamp, &call.model), call);
    }

    let mut records = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if !is_model_info_line(line) {
            continue;
        }
        let Some(timestamp) = leading_timestamp(line) else {
            continue;
        };
        let Some(info) = extract_json_block(&lines, i) else {
            continue;
        };

        let model_name = find_recent_model_name(&lines, i);
        let initiator = find_recent_initiator(&lines, i);
        let session_id = find_nearby_session_id(&lines, i);

        let billing = &info["billing"];
        let family = info["capabilities"]["family"]
            .as_str()
            .map(str::to_string)
            .or(model_name)
            .unwrap_or_else(|| "unknown".to_string());

        let call = call_lookup.get(&minute_key(&timestamp, &family));

        let is_premium = billing["is_premium"].as_bool().unwrap_or(false);
        // Blocks without a multiplier field get the registry-edge default.
        let multiplier = billing["multiplier"]
            .as_f64()
            .unwrap_or_else(|| plans::default_multiplier(is_premium));

        records.push(UsageRecord {
            timestamp,
            model: family,
            multiplier,
            is_premium,
            initiator: initiator.unwrap_or_else(|| "user".to_string()),
            source_file: source_file.clone(),
            prompt_tokens: call.map_or(0, |c| c.prompt_tokens),
            completion_tokens: call.map_or(0, |c| c.completion_tokens),
            cached_tokens: call.map_or(0, |c| c.cached_tokens),
            duration_ms: call.map_or(0, |c| c.duration_ms),
            session_id: session_id
                .or_else(|| call.map(|c| c.session_id.clone()))
                .unwrap_or_default(),
        });
    }

    // Records the minute-level key missed get a closest-in-time fallback.
    enrich_unmatched_records(&mut records, &model_calls);

    debug!(
        file = %filepath.display(),
        records = records.len(),
        telemetry_blocks = model_calls.len(),
        "parsed log file"
    );
    Ok(records)
}

/// Parse session lifecycle events from a log file.
pub fn parse_sessions(filepath: &Path) -> Result<Vec<SessionRecord>> {
    let Some(lines) = read_lines(filepath)? else {
        return Ok(Vec::new());
    };
    let source_file = file_name(filepath);

    let mut sessions: HashMap<String, SessionRecord> = HashMap::new();
    let mut last_timestamp: Option<DateTime<Utc>> = None;

    for (i, line) in lines.iter().enumerate() {
        let ts = leading_timestamp(line);
        if ts.is_some() {
            last_timestamp = ts;
        }

        if is_session_start_line(line) {
            if let (Some(sid), Some(start)) = (find_session_id_forward(&lines, i), last_timestamp)
            {
                sessions.insert(
                    sid.clone(),
                    SessionRecord::new(sid, start, source_file.clone()),
                );
            }
        }

        if is_turn_end_line(line) {
            if let Some(sid) = find_session_id_forward(&lines, i) {
                if let Some(session) = sessions.get_mut(&sid) {
                    session.total_turns += 1;
                }
            }
        }

        if is_model_call_line(line) {
            if let Some(block) = extract_json_block(&lines, i + 1) {
                let sid = block["session_id"].as_str().unwrap_or_default();
                if let Some(session) = sessions.get_mut(sid) {
                    session.total_calls += 1;
                    session.total_prompt_tokens +=
                        block["prompt_tokens_count"].as_u64().unwrap_or(0);
                    session.total_completion_tokens +=
                        block["completion_tokens_count"].as_u64().unwrap_or(0);
                    session.total_cached_tokens +=
                        block["cached_tokens_count"].as_u64().unwrap_or(0);
                    session.total_duration_ms += block["duration_ms"].as_u64().unwrap_or(0);
                    let model = block["model"].as_str().unwrap_or("unknown").to_string();
                    if !session.models_used.contains(&model) {
                        session.models_used.push(model);
                    }
                    // Logs are loosely ordered; the end time only ever
                    // advances forward.
                    if let Some(ts) = ts {
                        if session.end_time.map_or(true, |end| ts > end) {
                            session.end_time = Some(ts);
                        }
                    }
                }
            }
        }
    }

    // Sessions that never saw an end marker close at the file's last
    // observed timestamp.
    for session in sessions.values_mut() {
        if session.end_time.is_none() {
            session.end_time = last_timestamp;
        }
    }

    let mut result: Vec<SessionRecord> = sessions.into_values().collect();
    result.sort_by_key(|s| s.start_time);
    Ok(result)
}

/// Parse every process log in a directory, merged chronologically.
pub fn parse_log_directory(log_dir: &Path) -> Result<Vec<UsageRecord>> {
    let mut all_records = Vec::new();
    for log_file in log_files(log_dir) {
        all_records.extend(parse_log_file(&log_file)?);
    }
    all_records.sort_by_key(|r| r.timestamp);
    Ok(all_records)
}

/// All process log files in a directory, in filename-sorted order.
pub fn log_files(log_dir: &Path) -> Vec<PathBuf> {
    let pattern = log_dir.join("process-*.log");
    let mut files: Vec<PathBuf> = glob(&pattern.to_string_lossy())
        .map(|paths| paths.flatten().collect())
        .unwrap_or_default();
    files.sort();
    files
}

/// Read a file as lossy UTF-8 lines. `Ok(None)` means the file is absent.
fn read_lines(filepath: &Path) -> Result<Option<Vec<String>>> {
    let bytes = match std::fs::read(filepath) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let text = String::from_utf8_lossy(&bytes);
    Ok(Some(text.lines().map(str::to_string).collect()))
}

fn file_name(filepath: &Path) -> String {
    filepath
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
