//! Copilot Usage Library
//!
//! Track GitHub Copilot premium request usage and spend by parsing the
//! Copilot CLI's process logs, caching the extracted records in an embedded
//! SQLite store, and replaying them against a subscription plan's included
//! allowance.
//!
//! ## Pipeline
//!
//! 1. [`parser`] extracts [`UsageRecord`]s and [`SessionRecord`]s from raw
//!    log text, correlating billing blocks, context lines, and telemetry
//!    blocks that describe the same logical event
//! 2. [`storage`] caches parsed records idempotently so repeated scans skip
//!    unchanged files
//! 3. [`calculator`] replays records chronologically against a [`Plan`],
//!    splitting consumption between the included allowance and overage
//! 4. [`display`] renders the billing-period dashboard and status line
//!
//! ## Key modules
//!
//! - [`models`] - record, plan, and summary types
//! - [`parser`] - log-file extraction and event correlation
//! - [`calculator`] - spend math and billing-period utilities
//! - [`plans`] - published plan and multiplier registry
//! - [`config`] - user configuration (plan, cycle day, log directory)
//! - [`storage`] - SQLite cache with idempotent inserts

pub mod calculator;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod models;
pub mod onboarding;
pub mod parser;
pub mod plans;
pub mod storage;
pub mod timestamp;

pub use models::*;
