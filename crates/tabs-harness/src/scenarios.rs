//! End-to-end workloads over the tabs primitives.
//!
//! - `counter`: N workers each add 1 to a shared integer K times under a
//!   [`tabs_core::Mutex`]. Any lost update shows up as a nonzero difference.
//! - `sum`: an array `1..=len` split into N contiguous chunks, each summed by
//!   one worker with no shared mutation; partial sums come back through join.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tabs_core::{Mutex, Thread, ThreadId, TabsError};

use crate::error::HarnessError;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_INCREMENTS: u64 = 1_000_000;
pub const DEFAULT_SUM_LEN: u64 = 1_000_000_000;

/// What a worker hands back through join.
#[derive(Debug, Clone, Copy)]
struct WorkerDone {
    thread_id: ThreadId,
    value: u64,
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterConfig {
    pub threads: usize,
    pub increments: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            increments: DEFAULT_INCREMENTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterReport {
    pub threads: usize,
    pub increments_per_thread: u64,
    #[serde(rename = "final")]
    pub final_count: u64,
    pub expected: u64,
    pub difference: i128,
    pub correct: bool,
    pub duration_ms: u64,
}

/// Run the shared-counter workload.
pub fn run_counter<W: Write>(
    config: &CounterConfig,
    log: &mut LogEmitter<W>,
) -> Result<CounterReport, HarnessError> {
    if config.threads == 0 {
        return Err(HarnessError::InvalidConfig("threads must be at least 1".into()));
    }
    let expected = (config.threads as u64)
        .checked_mul(config.increments)
        .ok_or_else(|| HarnessError::InvalidConfig("threads * increments overflows u64".into()))?;

    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "scenario_start")
            .with_scenario("counter")
            .with_thread_id(tabs_core::current_thread_id())
            .with_details(serde_json::to_value(config)?),
    )?;

    let started = Instant::now();
    let counter = Arc::new(Mutex::new(0u64)?);

    let mut workers: Vec<Thread<tabs_core::Result<WorkerDone>>> =
        Vec::with_capacity(config.threads);
    for _ in 0..config.threads {
        let spawned = tabs_core::create(
            |(counter, increments): (Arc<Mutex<u64>>, u64)| -> tabs_core::Result<WorkerDone> {
                for _ in 0..increments {
                    *counter.lock()? += 1;
                }
                Ok(WorkerDone {
                    thread_id: tabs_core::current_thread_id(),
                    value: increments,
                })
            },
            (Arc::clone(&counter), config.increments),
        );
        match spawned {
            Ok(worker) => workers.push(worker),
            Err(err) => return Err(scenario_error(log, "counter", err)),
        }
    }

    join_workers(log, "counter", workers)?;

    let final_count = *counter.lock()?;
    let report = CounterReport {
        threads: config.threads,
        increments_per_thread: config.increments,
        final_count,
        expected,
        difference: difference(expected, final_count),
        correct: final_count == expected,
        duration_ms: elapsed_ms(started),
    };
    emit_result(log, "counter", report.correct, report.duration_ms, &report)?;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Partitioned sum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumConfig {
    pub threads: usize,
    pub len: u64,
}

impl Default for SumConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            len: DEFAULT_SUM_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumReport {
    pub threads: usize,
    pub len: u64,
    pub partial_sums: Vec<u64>,
    pub total: u64,
    pub expected: u64,
    pub correct: bool,
    pub duration_ms: u64,
}

/// Contiguous `[start, end)` chunks of `len`; the last chunk absorbs the remainder.
#[must_use]
pub fn partition(len: usize, parts: usize) -> Vec<(usize, usize)> {
    if parts == 0 {
        return Vec::new();
    }
    let chunk = len / parts;
    (0..parts)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == parts { len } else { start + chunk };
            (start, end)
        })
        .collect()
}

/// Run the partitioned-sum workload.
pub fn run_sum<W: Write>(
    config: &SumConfig,
    log: &mut LogEmitter<W>,
) -> Result<SumReport, HarnessError> {
    if config.threads == 0 {
        return Err(HarnessError::InvalidConfig("threads must be at least 1".into()));
    }
    let top = u32::try_from(config.len).map_err(|_| {
        HarnessError::InvalidConfig(format!("len {} exceeds {}", config.len, u32::MAX))
    })?;
    // len <= u32::MAX, so len * (len + 1) fits in u64.
    let expected = config.len * (config.len + 1) / 2;

    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "scenario_start")
            .with_scenario("sum")
            .with_thread_id(tabs_core::current_thread_id())
            .with_details(serde_json::to_value(config)?),
    )?;

    let started = Instant::now();
    let data: Arc<Vec<u32>> = Arc::new((1..=top).collect());

    let mut workers: Vec<Thread<tabs_core::Result<WorkerDone>>> =
        Vec::with_capacity(config.threads);
    for (start, end) in partition(data.len(), config.threads) {
        let spawned = tabs_core::create(
            move |data: Arc<Vec<u32>>| -> tabs_core::Result<WorkerDone> {
                let value: u64 = data[start..end].iter().map(|&v| u64::from(v)).sum();
                Ok(WorkerDone {
                    thread_id: tabs_core::current_thread_id(),
                    value,
                })
            },
            Arc::clone(&data),
        );
        match spawned {
            Ok(worker) => workers.push(worker),
            Err(err) => return Err(scenario_error(log, "sum", err)),
        }
    }

    let partial_sums = join_workers(log, "sum", workers)?;
    let total: u64 = partial_sums.iter().sum();
    let report = SumReport {
        threads: config.threads,
        len: config.len,
        partial_sums,
        total,
        expected,
        correct: total == expected,
        duration_ms: elapsed_ms(started),
    };
    emit_result(log, "sum", report.correct, report.duration_ms, &report)?;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Join every worker in creation order and return their values.
fn join_workers<W: Write>(
    log: &mut LogEmitter<W>,
    scenario: &str,
    workers: Vec<Thread<tabs_core::Result<WorkerDone>>>,
) -> Result<Vec<u64>, HarnessError> {
    let mut values = Vec::with_capacity(workers.len());
    for (index, worker) in workers.into_iter().enumerate() {
        let done = match worker.join().and_then(|outcome| outcome) {
            Ok(done) => done,
            Err(err) => return Err(scenario_error(log, scenario, err)),
        };
        log.emit_entry(
            LogEntry::new("", LogLevel::Debug, "worker_finished")
                .with_scenario(scenario)
                .with_worker(index)
                .with_thread_id(done.thread_id)
                .with_details(serde_json::json!({ "value": done.value })),
        )?;
        values.push(done.value);
    }
    Ok(values)
}

fn emit_result<W: Write, T: Serialize>(
    log: &mut LogEmitter<W>,
    scenario: &str,
    correct: bool,
    duration_ms: u64,
    report: &T,
) -> Result<(), HarnessError> {
    let (level, outcome) = if correct {
        (LogLevel::Info, Outcome::Pass)
    } else {
        (LogLevel::Error, Outcome::Fail)
    };
    log.emit_entry(
        LogEntry::new("", level, "scenario_result")
            .with_scenario(scenario)
            .with_outcome(outcome)
            .with_duration_ms(duration_ms)
            .with_details(serde_json::to_value(report)?),
    )?;
    log.flush()?;
    Ok(())
}

/// Log a layer failure and convert it. A logging failure here is dropped in
/// favor of the layer error.
fn scenario_error<W: Write>(
    log: &mut LogEmitter<W>,
    scenario: &str,
    err: TabsError,
) -> HarnessError {
    let _ = log.emit_entry(
        LogEntry::new("", LogLevel::Error, "scenario_error")
            .with_scenario(scenario)
            .with_outcome(Outcome::Error)
            .with_error(err),
    );
    let _ = log.flush();
    HarnessError::Tabs(err)
}

/// `expected - actual`, exact over the whole `u64` range.
fn difference(expected: u64, actual: u64) -> i128 {
    i128::from(expected) - i128::from(actual)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_log::validate_log_line;

    #[test]
    fn partition_last_chunk_absorbs_remainder() {
        assert_eq!(partition(10, 4), vec![(0, 2), (2, 4), (4, 6), (6, 10)]);
        assert_eq!(partition(8, 4), vec![(0, 2), (2, 4), (4, 6), (6, 8)]);
        assert_eq!(partition(3, 4), vec![(0, 0), (0, 0), (0, 0), (0, 3)]);
        assert!(partition(5, 0).is_empty());
    }

    #[test]
    fn difference_is_exact_beyond_i64() {
        assert_eq!(difference(10, 10), 0);
        assert_eq!(difference(10, 7), 3);
        assert_eq!(difference(0, u64::MAX), -i128::from(u64::MAX));
        assert_eq!(difference(u64::MAX, 0), i128::from(u64::MAX));
    }

    #[test]
    fn counter_has_no_lost_updates() {
        let mut log = LogEmitter::to_buffer("tabs", "test");
        let config = CounterConfig {
            threads: 4,
            increments: 20_000,
        };
        let report = run_counter(&config, &mut log).unwrap();
        assert_eq!(report.final_count, 80_000);
        assert_eq!(report.expected, 80_000);
        assert_eq!(report.difference, 0);
        assert!(report.correct);
    }

    #[test]
    fn counter_logs_start_workers_and_result() {
        let mut log = LogEmitter::to_buffer("tabs", "test");
        let config = CounterConfig {
            threads: 3,
            increments: 100,
        };
        run_counter(&config, &mut log).unwrap();

        let entries: Vec<LogEntry> = log
            .lines()
            .iter()
            .enumerate()
            .map(|(i, line)| validate_log_line(line, i + 1).unwrap())
            .collect();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].event, "scenario_start");
        for (i, entry) in entries[1..4].iter().enumerate() {
            assert_eq!(entry.event, "worker_finished");
            assert_eq!(entry.worker, Some(i));
        }
        assert_eq!(entries[4].event, "scenario_result");
        assert_eq!(entries[4].outcome, Some(Outcome::Pass));
        assert_eq!(entries[4].details.as_ref().unwrap()["final"], 300);
    }

    #[test]
    fn sum_matches_closed_form() {
        let mut log = LogEmitter::to_buffer("tabs", "test");
        let config = SumConfig {
            threads: 4,
            len: 1_000_003,
        };
        let report = run_sum(&config, &mut log).unwrap();
        assert_eq!(report.partial_sums.len(), 4);
        assert_eq!(report.total, 1_000_003 * 1_000_004 / 2);
        assert!(report.correct);
    }

    #[test]
    fn sum_with_fewer_elements_than_threads() {
        let mut log = LogEmitter::to_buffer("tabs", "test");
        let config = SumConfig { threads: 4, len: 2 };
        let report = run_sum(&config, &mut log).unwrap();
        assert_eq!(report.partial_sums, vec![0, 0, 0, 3]);
        assert!(report.correct);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let mut log = LogEmitter::to_buffer("tabs", "test");
        let err = run_counter(
            &CounterConfig {
                threads: 0,
                increments: 1,
            },
            &mut log,
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));

        let err = run_sum(&SumConfig { threads: 0, len: 1 }, &mut log).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
        assert!(log.lines().is_empty());
    }

    #[test]
    fn oversized_sum_is_rejected() {
        let mut log = LogEmitter::to_buffer("tabs", "test");
        let config = SumConfig {
            threads: 4,
            len: u64::from(u32::MAX) + 1,
        };
        let err = run_sum(&config, &mut log).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
    }
}
