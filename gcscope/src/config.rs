//! Validated session configuration.
//!
//! [`SessionConfig`] is the one value object the rest of the tool reads;
//! it is built once from the parsed CLI arguments, with every numeric
//! knob clamped or defaulted here so downstream code never re-checks.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::advice::AppProfile;
use crate::cli::RunArgs;
use crate::flamegraph::{DurationBuckets, MIN_TERMINAL_WIDTH};

/// Default snapshot cadence, in seconds.
pub const DEFAULT_INTERVAL_SECS: f64 = 5.0;

/// Default alert threshold, in milliseconds.
pub const DEFAULT_ALERT_THRESHOLD_MS: f64 = 50.0;

/// Default flame-graph time bucket, in seconds.
pub const DEFAULT_FLAME_BUCKET_SECS: f64 = 5.0;

/// Everything a monitoring session needs to know, pre-validated.
///
/// Output toggles are independent flags; a mode enum would force
/// artificial combinations (json + stats-only is legal, for one).
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct SessionConfig {
    /// Executable to launch and supervise.
    pub target: PathBuf,
    /// Arguments passed through to the target untouched.
    pub target_args: Vec<String>,
    /// Snapshot cadence hint forwarded to the in-target adapter.
    pub interval_secs: f64,
    /// Emit JSON lines instead of narrative text.
    pub json: bool,
    /// Suppress per-event output; summaries only.
    pub stats_only: bool,
    /// Ask the adapter to report total tracked objects in snapshots.
    pub dump_objects: bool,
    /// Ask the adapter to retain uncollectable garbage for inspection.
    pub dump_garbage: bool,
    /// Duplicate report output into this file (append mode).
    pub log_file: Option<PathBuf>,
    /// Pause duration at or above which an alert line is emitted.
    pub alert_threshold_ms: f64,
    /// Write folded flame-graph samples here at shutdown.
    pub flamegraph_file: Option<PathBuf>,
    /// Time-axis bucket width for the flame graph.
    pub flamegraph_bucket_secs: f64,
    /// Duration-axis bucket edges for the flame graph.
    pub duration_buckets: DurationBuckets,
    /// Render the ASCII flame graph into the summary.
    pub terminal_flamegraph: bool,
    /// Terminal flame-graph bar width, in characters.
    pub terminal_width: usize,
    /// Colorize the terminal flame graph.
    pub color: bool,
    /// Destination for live UDP events, when enabled.
    pub live_target: Option<SocketAddr>,
    /// Application category inferred from the target command line.
    pub profile: AppProfile,
}

impl SessionConfig {
    /// Build a validated config from parsed `run` arguments.
    ///
    /// Fails only on an unparseable `--live-host`; every numeric knob is
    /// clamped or falls back to its default instead of erroring.
    pub fn from_run_args(args: &RunArgs) -> Result<Self> {
        let live_target = if args.live {
            let host = IpAddr::from_str(&args.live_host)
                .with_context(|| format!("invalid --live-host address: {}", args.live_host))?;
            Some(SocketAddr::new(host, args.live_port))
        } else {
            None
        };

        let mut argv = vec![args.target.to_string_lossy().into_owned()];
        argv.extend(args.target_args.iter().cloned());

        Ok(SessionConfig {
            target: args.target.clone(),
            target_args: args.target_args.clone(),
            interval_secs: positive_or(args.interval, DEFAULT_INTERVAL_SECS),
            json: args.json,
            stats_only: args.stats_only,
            dump_objects: args.dump_objects,
            dump_garbage: args.dump_garbage,
            log_file: args.log_file.clone(),
            alert_threshold_ms: positive_or(args.alert_threshold_ms, DEFAULT_ALERT_THRESHOLD_MS),
            flamegraph_file: args.flamegraph_file.clone(),
            flamegraph_bucket_secs: positive_or(args.flamegraph_bucket, DEFAULT_FLAME_BUCKET_SECS),
            duration_buckets: DurationBuckets::parse(&args.duration_buckets),
            terminal_flamegraph: args.terminal_flamegraph,
            terminal_width: args.terminal_flamegraph_width.max(MIN_TERMINAL_WIDTH),
            color: args.terminal_flamegraph_color,
            live_target,
            profile: AppProfile::detect(&argv),
        })
    }

    /// A config with every knob at its default, for unit tests.
    #[cfg(test)]
    pub(crate) fn for_tests(target: &str) -> Self {
        Self {
            target: PathBuf::from(target),
            target_args: vec![],
            interval_secs: DEFAULT_INTERVAL_SECS,
            json: false,
            stats_only: false,
            dump_objects: false,
            dump_garbage: false,
            log_file: None,
            alert_threshold_ms: DEFAULT_ALERT_THRESHOLD_MS,
            flamegraph_file: None,
            flamegraph_bucket_secs: DEFAULT_FLAME_BUCKET_SECS,
            duration_buckets: DurationBuckets::default(),
            terminal_flamegraph: false,
            terminal_width: 80,
            color: false,
            live_target: None,
            profile: AppProfile::Unknown,
        }
    }

    /// The target command line as launched, for banners and logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.target.to_string_lossy().into_owned();
        for arg in &self.target_args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
