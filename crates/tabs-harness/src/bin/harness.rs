//! CLI entrypoint for the tabs scenario harness.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tabs_harness::scenarios::{
    CounterConfig, DEFAULT_INCREMENTS, DEFAULT_SUM_LEN, DEFAULT_THREADS, SumConfig,
};
use tabs_harness::structured_log::{LogEmitter, validate_log_file};

/// End-to-end scenarios for the tabs thread and mutex primitives.
#[derive(Debug, Parser)]
#[command(name = "tabs-harness")]
#[command(about = "Scenario harness for tabs threads and mutexes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// N threads increment a shared counter K times each under the mutex.
    Counter {
        #[arg(long, default_value_t = DEFAULT_THREADS)]
        threads: usize,
        /// Increments per thread.
        #[arg(long, default_value_t = DEFAULT_INCREMENTS)]
        increments: u64,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Run identifier used in trace ids.
        #[arg(long)]
        run_id: Option<String>,
        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Sum 1..=len split into N contiguous chunks, one thread per chunk.
    Sum {
        #[arg(long, default_value_t = DEFAULT_THREADS)]
        threads: usize,
        /// Array length.
        #[arg(long, default_value_t = DEFAULT_SUM_LEN)]
        len: u64,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Run identifier used in trace ids.
        #[arg(long)]
        run_id: Option<String>,
        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Validate a structured JSONL log produced by a previous run.
    ValidateLog {
        /// Log path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn open_emitter(
    log: Option<&Path>,
    run_id: Option<String>,
) -> std::io::Result<LogEmitter<Box<dyn Write>>> {
    let run_id = run_id.unwrap_or_else(|| format!("pid{}", std::process::id()));
    let writer: Box<dyn Write> = match log {
        Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(std::io::sink()),
    };
    Ok(LogEmitter::new(writer, "tabs", &run_id))
}

fn verdict(correct: bool) -> ExitCode {
    if correct {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Counter {
            threads,
            increments,
            log,
            run_id,
            json,
        } => {
            let mut emitter = open_emitter(log.as_deref(), run_id)?;
            let config = CounterConfig {
                threads,
                increments,
            };
            eprintln!("Running counter: {threads} threads x {increments} increments");
            let report = tabs_harness::run_counter(&config, &mut emitter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Final count: {}", report.final_count);
                println!("Expected:    {}", report.expected);
                println!("Difference:  {}", report.difference);
                println!(
                    "Result:      {}",
                    if report.correct { "CORRECT" } else { "INCORRECT" }
                );
            }
            Ok(verdict(report.correct))
        }
        Command::Sum {
            threads,
            len,
            log,
            run_id,
            json,
        } => {
            let mut emitter = open_emitter(log.as_deref(), run_id)?;
            let config = SumConfig { threads, len };
            eprintln!("Running sum: {len} elements over {threads} threads");
            let report = tabs_harness::run_sum(&config, &mut emitter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for (worker, partial) in report.partial_sums.iter().enumerate() {
                    println!("Worker {worker}: {partial}");
                }
                println!("Total sum: {}", report.total);
                println!("Expected:  {}", report.expected);
                println!(
                    "Result:    {}",
                    if report.correct { "CORRECT" } else { "INCORRECT" }
                );
            }
            Ok(verdict(report.correct))
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            println!("{} lines, {} errors", lines, errors.len());
            Ok(verdict(errors.is_empty()))
        }
    }
}
