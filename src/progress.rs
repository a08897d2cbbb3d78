//! Load progress reporting.
//!
//! Reports observable progress during `catalog-ingest load` so users see
//! which phase is running and how many partitions are done. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;
use std::time::Duration;

use crate::error::Phase;

/// A single progress event for a load.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// A phase was handed `tasks` jobs.
    PhaseStarted { phase: Phase, tasks: usize },
    /// One partition task returned successfully.
    TaskFinished {
        phase: Phase,
        task: &'static str,
        partition: usize,
        rows: u64,
    },
    /// Every task of the phase has returned, failed or not.
    PhaseFinished { phase: Phase, elapsed: Duration },
}

/// Reports load progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event. Called from worker tasks.
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "load relations  reviews  partition 3  12,400 rows".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::PhaseStarted { phase, tasks } => {
                format!("load {}  started  {} tasks\n", phase, tasks)
            }
            ProgressEvent::TaskFinished {
                phase,
                task,
                partition,
                rows,
            } => format!(
                "load {}  {}  partition {}  {} rows\n",
                phase,
                task,
                partition,
                format_number(*rows)
            ),
            ProgressEvent::PhaseFinished { phase, elapsed } => {
                format!("load {}  done in {:.1}s\n", phase, elapsed.as_secs_f64())
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::PhaseStarted { phase, tasks } => serde_json::json!({
                "event": "phase_started",
                "phase": phase,
                "tasks": tasks
            }),
            ProgressEvent::TaskFinished {
                phase,
                task,
                partition,
                rows,
            } => serde_json::json!({
                "event": "task_finished",
                "phase": phase,
                "task": task,
                "partition": partition,
                "rows": rows
            }),
            ProgressEvent::PhaseFinished { phase, elapsed } => serde_json::json!({
                "event": "phase_finished",
                "phase": phase,
                "elapsed_ms": elapsed.as_millis() as u64
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value. `auto` defers to [`default_for_tty`](Self::default_for_tty).
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "auto" => Ok(Self::default_for_tty()),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            "off" => Ok(ProgressMode::Off),
            other => anyhow::bail!(
                "Unknown progress mode: '{}'. Available: auto, human, json, off",
                other
            ),
        }
    }

    /// Build a reporter for this mode. Caller can pass it to the ingestor.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn parse_modes() {
        assert_eq!(ProgressMode::parse("json").unwrap(), ProgressMode::Json);
        assert_eq!(ProgressMode::parse("off").unwrap(), ProgressMode::Off);
        assert!(ProgressMode::parse("loud").is_err());
    }
}
