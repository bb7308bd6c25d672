//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gcscope_wire::{DEFAULT_LIVE_HOST, DEFAULT_LIVE_PORT};

#[derive(Parser)]
#[command(
    name = "gcscope",
    version,
    about = "Monitor garbage collection pauses in a supervised process",
    after_help = "\
EXAMPLES:
    gcscope run python app.py                        Narrative monitoring
    gcscope run --json --log-file gc.jsonl python app.py
    gcscope run --terminal-flamegraph -- python -m myapp --port 8080
    gcscope run --live --live-port 9000 ./worker --queue jobs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Launch a target process and record its GC activity until it exits
    Run(RunArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Executable to launch and supervise
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Arguments passed through to the target unmodified
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub target_args: Vec<String>,

    /// Snapshot cadence hint for the in-process adapter, in seconds
    #[arg(long, default_value_t = 5.0, value_name = "SECS")]
    pub interval: f64,

    /// Emit one JSON object per line instead of narrative text
    #[arg(long)]
    pub json: bool,

    /// Suppress per-event output; print only the final summary
    #[arg(long)]
    pub stats_only: bool,

    /// Include the collector's total tracked-object count in snapshots
    #[arg(long)]
    pub dump_objects: bool,

    /// Ask the adapter to retain uncollectable garbage for inspection
    #[arg(long)]
    pub dump_garbage: bool,

    /// Also append all report output to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Pause duration that triggers an alert line, in milliseconds
    #[arg(long, default_value_t = 50.0, value_name = "MS")]
    pub alert_threshold_ms: f64,

    /// Write folded flame-graph samples to this file at shutdown
    #[arg(long, value_name = "FILE")]
    pub flamegraph_file: Option<PathBuf>,

    /// Flame-graph time-axis bucket width, in seconds
    #[arg(long, default_value_t = 5.0, value_name = "SECS")]
    pub flamegraph_bucket: f64,

    /// Flame-graph duration bucket edges in milliseconds, comma-separated
    #[arg(long, default_value = "1,5,20,50,100", value_name = "CSV")]
    pub duration_buckets: String,

    /// Render an ASCII flame graph into the summary
    #[arg(long)]
    pub terminal_flamegraph: bool,

    /// Terminal flame-graph bar width in characters (minimum 40)
    #[arg(long, default_value_t = 80, value_name = "COLS")]
    pub terminal_flamegraph_width: usize,

    /// Colorize the terminal flame graph (ANSI 256-color)
    #[arg(long)]
    pub terminal_flamegraph_color: bool,

    /// Stream per-cycle events to a live viewer over UDP
    #[arg(long)]
    pub live: bool,

    /// Live stream destination host
    #[arg(long, default_value = DEFAULT_LIVE_HOST, value_name = "HOST")]
    pub live_host: String,

    /// Live stream destination port
    #[arg(long, default_value_t = DEFAULT_LIVE_PORT, value_name = "PORT")]
    pub live_port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["gcscope", "run", "python"]).unwrap();
        let Command::Run(args) = cli.command;
        assert_eq!(args.target, PathBuf::from("python"));
        assert!(args.target_args.is_empty());
        assert_eq!(args.interval, 5.0);
        assert_eq!(args.alert_threshold_ms, 50.0);
        assert_eq!(args.duration_buckets, "1,5,20,50,100");
        assert_eq!(args.terminal_flamegraph_width, 80);
        assert_eq!(args.live_host, "127.0.0.1");
        assert_eq!(args.live_port, 8989);
        assert!(!args.json && !args.stats_only && !args.live);
    }

    #[test]
    fn test_target_args_pass_through_with_hyphens() {
        let cli = Cli::try_parse_from([
            "gcscope",
            "run",
            "--json",
            "python",
            "-m",
            "myapp",
            "--port",
            "8080",
        ])
        .unwrap();
        let Command::Run(args) = cli.command;
        assert!(args.json);
        assert_eq!(args.target, PathBuf::from("python"));
        assert_eq!(args.target_args, vec!["-m", "myapp", "--port", "8080"]);
    }

    #[test]
    fn test_double_dash_separates_tool_flags_from_target() {
        let cli =
            Cli::try_parse_from(["gcscope", "run", "--stats-only", "--", "worker", "--live"])
                .unwrap();
        let Command::Run(args) = cli.command;
        assert!(args.stats_only);
        assert!(!args.live);
        assert_eq!(args.target, PathBuf::from("worker"));
        assert_eq!(args.target_args, vec!["--live"]);
    }

    #[test]
    fn test_missing_target_is_a_usage_error() {
        assert!(Cli::try_parse_from(["gcscope", "run"]).is_err());
    }
}
