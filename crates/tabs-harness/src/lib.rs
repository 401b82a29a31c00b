//! End-to-end scenario harness for tabs.
//!
//! This crate provides:
//! - Scenarios: the shared-counter and partitioned-sum workloads, run on
//!   `tabs_core` threads and mutexes, producing serializable reports
//! - Structured logging: JSONL records for every scenario phase
//! - Log validation: schema checks for emitted log files

#![forbid(unsafe_code)]

pub mod error;
pub mod scenarios;
pub mod structured_log;

pub use error::HarnessError;
pub use scenarios::{CounterConfig, CounterReport, SumConfig, SumReport, run_counter, run_sum};
