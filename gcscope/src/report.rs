//! Report output: event/alert/snapshot lines and the writer that carries
//! them to the diagnostic stream and an optional log file.
//!
//! The writer is pure transport. Content decisions (which lines exist, in
//! what order) belong to the drain pipeline; mode decisions it does make
//! are the two the streams themselves impose: stats-only suppresses
//! per-event narration on the terminal, and colored lines go only to a
//! color-capable terminal while their plain twins go to the log file.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, LineWriter, Write};
use std::path::Path;

use serde_json::json;

use crate::domain::{CycleEvent, SnapshotRecord};

// =============================================================================
// FORMATTING
// =============================================================================

/// Human duration formatting used throughout the report.
///
/// Sub-millisecond pauses keep three decimals, everything below a second
/// keeps one, longer pauses switch to seconds with two.
#[must_use]
pub fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1.0 {
        format!("{duration_ms:.3}ms")
    } else if duration_ms < 1000.0 {
        format!("{duration_ms:.1}ms")
    } else {
        format!("{:.2}s", duration_ms / 1000.0)
    }
}

/// Narrative line for one completed cycle.
#[must_use]
pub fn event_narrative(event: &CycleEvent) -> String {
    format!(
        "GC STOP | Gen: {} | Duration: {} | Collected: {} | Uncollectable: {}",
        event.generation,
        format_duration(event.duration_ms),
        event.collected,
        event.uncollectable
    )
}

/// Narrative alert for a pause at or above the threshold.
#[must_use]
pub fn alert_narrative(event: &CycleEvent, threshold_ms: f64) -> String {
    format!(
        "GC ALERT | Gen {} pause {} exceeded {}ms threshold",
        event.generation,
        format_duration(event.duration_ms),
        threshold_ms
    )
}

/// Narrative line for a pending-count snapshot.
#[must_use]
pub fn snapshot_narrative(snapshot: &SnapshotRecord) -> String {
    let mut line = format!(
        "GC SNAPSHOT | Pending: gen0={} gen1={} gen2={}",
        snapshot.pending[0], snapshot.pending[1], snapshot.pending[2]
    );
    if let Some(total) = snapshot.total_objects {
        line.push_str(&format!(" | Tracked objects: {total}"));
    }
    line
}

/// Structured form of one cycle, `start_epoch_secs` anchoring the
/// monotonic offset to wall-clock time.
#[must_use]
pub fn event_json(event: &CycleEvent, start_epoch_secs: f64) -> serde_json::Value {
    json!({
        "timestamp": start_epoch_secs + event.relative_time,
        "phase": "stop",
        "generation": event.generation.index(),
        "duration_ms": event.duration_ms,
        "collected": event.collected,
        "uncollectable": event.uncollectable,
    })
}

/// Structured form of a pending-count snapshot.
#[must_use]
pub fn snapshot_json(snapshot: &SnapshotRecord, start_epoch_secs: f64) -> serde_json::Value {
    let mut value = json!({
        "timestamp": start_epoch_secs + snapshot.relative_time,
        "phase": "snapshot",
        "pending": {
            "gen0": snapshot.pending[0],
            "gen1": snapshot.pending[1],
            "gen2": snapshot.pending[2],
        },
    });
    if let Some(total) = snapshot.total_objects {
        value["total_objects"] = json!(total);
    }
    value
}

// =============================================================================
// REPORT WRITER
// =============================================================================

/// Line sink for the diagnostic stream plus an optional append-mode log
/// file. Every write is flushed immediately so a crashing session still
/// leaves a complete log.
pub struct ReportWriter {
    stats_only: bool,
    color_capable: bool,
    term: Box<dyn Write + Send>,
    file: Option<LineWriter<File>>,
}

impl ReportWriter {
    /// Writer over the process's stderr.
    #[must_use]
    pub fn stderr(stats_only: bool) -> Self {
        let color_capable = io::stderr().is_terminal();
        Self { stats_only, color_capable, term: Box::new(io::stderr()), file: None }
    }

    /// Writer over an injected stream (tests, capture).
    #[must_use]
    pub fn with_term(stats_only: bool, color_capable: bool, term: Box<dyn Write + Send>) -> Self {
        Self { stats_only, color_capable, term, file: None }
    }

    /// Attach the append-mode log file. Called at shutdown, never during
    /// recording.
    pub fn open_log_file(&mut self, path: &Path) -> Result<(), crate::domain::ReportError> {
        let file = OpenOptions::new().create(true).append(true).open(path).map_err(|error| {
            crate::domain::ReportError::LogFileOpen { path: path.to_path_buf(), error }
        })?;
        self.file = Some(LineWriter::new(file));
        Ok(())
    }

    fn write_to_file(&mut self, line: &str) {
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    }

    /// Per-event narration: suppressed on the terminal in stats-only
    /// mode, always duplicated to the log file.
    pub fn event_line(&mut self, line: &str) {
        if !self.stats_only {
            let _ = writeln!(self.term, "{line}");
            let _ = self.term.flush();
        }
        self.write_to_file(line);
    }

    /// Summary content: always emitted to both streams.
    pub fn summary_line(&mut self, line: &str) {
        let _ = writeln!(self.term, "{line}");
        let _ = self.term.flush();
        self.write_to_file(line);
    }

    /// Paired plain/colored summary line: the colored form goes to the
    /// terminal when present, the plain form always goes to the file.
    pub fn colored_pair(&mut self, plain: &str, colored: Option<&str>) {
        match colored {
            Some(colored) if self.color_capable => {
                let _ = writeln!(self.term, "{colored}");
                let _ = self.term.flush();
                self.write_to_file(plain);
            }
            _ => self.summary_line(plain),
        }
    }

    /// Flush both streams; the log file is closed on drop.
    pub fn finish(&mut self) {
        let _ = self.term.flush();
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }
}
