//! Haven CLI - offline replay tooling for the Havenlight engine
//!
//! Commands:
//! - analyze: Replay an NDJSON event log through the engine and print assessments
//! - trends: Summarize a persisted snapshot history
//! - validate: Check an event log for parse errors

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use havenlight::recovery::snapshot::WeeklySnapshot;
use havenlight::recovery::RecoveryTracker;
use havenlight::{
    CrisisEngine, EngineConfig, EngineError, InteractionEvent, ENGINE_VERSION, PRODUCER_NAME,
};

/// Haven - on-device behavioral crisis detection engine
#[derive(Parser)]
#[command(name = "haven")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Replay interaction logs through the Havenlight engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an event log and print per-tick assessments
    Analyze {
        /// Input NDJSON event log (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Seconds of simulated time between analysis ticks
        #[arg(long, default_value = "5")]
        tick_interval: i64,

        /// Print every assessment, not only detections
        #[arg(long)]
        all: bool,
    },

    /// Summarize trends over a persisted snapshot history
    Trends {
        /// Input JSON array of weekly snapshots (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check an event log for parse errors
    Validate {
        /// Input NDJSON event log (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            input,
            tick_interval,
            all,
        } => analyze(&input, tick_interval, all),
        Commands::Trends { input } => trends(&input),
        Commands::Validate { input } => validate(&input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", PRODUCER_NAME, e);
            ExitCode::FAILURE
        }
    }
}

fn read_input(path: &PathBuf) -> Result<String, EngineError> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        for line in io::stdin().lock().lines() {
            let line = line.map_err(|e| EngineError::ParseError(e.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }
        Ok(content)
    } else {
        fs::read_to_string(path).map_err(|e| EngineError::ParseError(e.to_string()))
    }
}

fn parse_events(content: &str) -> Result<Vec<InteractionEvent>, EngineError> {
    let mut events = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: InteractionEvent = serde_json::from_str(line).map_err(|e| {
            EngineError::ParseError(format!("line {}: {}", number + 1, e))
        })?;
        events.push(event);
    }
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

fn emit(value: &serde_json::Value) {
    if atty::is(atty::Stream::Stdout) {
        println!("{}", serde_json::to_string_pretty(value).unwrap());
    } else {
        println!("{}", serde_json::to_string(value).unwrap());
    }
}

fn analyze(input: &PathBuf, tick_interval: i64, all: bool) -> Result<(), EngineError> {
    let events = parse_events(&read_input(input)?)?;
    if events.is_empty() {
        return Err(EngineError::ParseError("event log is empty".to_string()));
    }

    let mut engine = CrisisEngine::new(EngineConfig::default())?;
    let mut next_tick = events[0].timestamp;

    for event in events {
        while next_tick < event.timestamp {
            report_tick(&mut engine, next_tick, all);
            next_tick += chrono::Duration::seconds(tick_interval.max(1));
        }
        engine.record_event(event);
    }
    report_tick(&mut engine, next_tick, all);

    emit(&serde_json::json!({
        "producer": PRODUCER_NAME,
        "version": ENGINE_VERSION,
        "final_state": engine.state(),
        "transitions": engine.transition_log(),
    }));
    Ok(())
}

fn report_tick(engine: &mut CrisisEngine, at: chrono::DateTime<chrono::Utc>, all: bool) {
    let outcome = engine.tick(at);
    if let Some(assessment) = outcome.assessment {
        if all || assessment.detected_crisis.is_some() {
            emit(&serde_json::json!({
                "at": at,
                "detected": assessment.detected_crisis,
                "confidence": assessment.confidence,
                "coverage": assessment.coverage,
                "alternatives": assessment.alternative_hypotheses,
            }));
        }
    }
    if let Some(change) = outcome.change {
        emit(&serde_json::json!({ "at": at, "adaptation": change }));
    }
}

fn trends(input: &PathBuf) -> Result<(), EngineError> {
    let snapshots: Vec<WeeklySnapshot> = serde_json::from_str(&read_input(input)?)?;
    let tracker = RecoveryTracker::with_snapshots(snapshots);

    emit(&serde_json::json!({
        "producer": PRODUCER_NAME,
        "version": ENGINE_VERSION,
        "weeks": tracker.snapshots().len(),
        "stable_weeks": tracker.stable_weeks(),
        "trends": tracker.trends(),
        "logging_habit": tracker.logging_habit(),
        "regression": tracker.regression(),
        "relapse_warning": tracker.relapse_warning(),
        "exposure_level": tracker.exposure().level(),
        "exposed_features": tracker.exposure().exposed_features(),
    }));
    Ok(())
}

fn validate(input: &PathBuf) -> Result<(), EngineError> {
    let content = read_input(input)?;
    let mut valid = 0usize;
    let mut errors = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InteractionEvent>(line) {
            Ok(_) => valid += 1,
            Err(e) => errors.push(format!("line {}: {}", number + 1, e)),
        }
    }

    emit(&serde_json::json!({
        "valid_events": valid,
        "errors": errors,
    }));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::ParseError(format!(
            "{} invalid event(s)",
            errors.len()
        )))
    }
}
