//! # gcscope - Low-Overhead GC Monitoring
//!
//! gcscope watches the garbage collector of a target process without
//! materially perturbing it. A small adapter inside the target reports
//! collection cycles over an inherited pipe; gcscope records them with a
//! strictly bounded hot path and defers every expensive step (formatting,
//! aggregation, percentile math, rendering, file I/O) until the target
//! has finished running.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Target Process                           │
//! │            (collector + in-process hook adapter)                │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ JSON lines over inherited pipe
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     gcscope (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │    Ingest    │──▶│ CallbackHub  │──▶│  GcMonitor   │        │
//! │  │ (pump thread)│   │ (observers)  │   │ (record only)│        │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘        │
//! │                                               │ buffered       │
//! │                             optional UDP ◀────┤ tuples         │
//! │                                               ▼                │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │   GcStats    │──▶│    Advice    │──▶│ ReportWriter │        │
//! │  │ (percentiles)│   │  (blunders)  │   │ (stderr/file)│        │
//! │  └──────────────┘   └──────┬───────┘   └──────────────┘        │
//! │                           ▼                                    │
//! │                    ┌──────────────┐                            │
//! │                    │  FlameGraph  │                            │
//! │                    │ (folded/TTY) │                            │
//! │                    └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core Pipeline Modules
//!
//! - [`recorder`]: the measured window. `GcMonitor` buffers `(generation,
//!   duration, counts)` tuples under one short-lived lock and guarantees
//!   the drain runs exactly once, including through [`Drop`]
//! - [`drain`]: the deferred pass. Replays events and snapshots in time
//!   order through statistics, rendering and report writing
//! - [`stats`]: running aggregates, percentile math, per-generation and
//!   recent-window views
//! - [`flamegraph`]: duration-bucketed histogram over session time with
//!   folded-file and ASCII terminal renderings
//! - [`advice`]: threshold rules that turn aggregates into tuning
//!   recommendations and severity-graded blunders
//!
//! ### Transport and Supervision Modules
//!
//! - [`supervise`]: spawns the target with the hook pipe, forwards
//!   SIGINT/SIGTERM, maps its death onto a shell exit code
//! - [`ingest`]: parses hook-signal lines from the pipe and dispatches
//!   them into the observer registry
//! - [`hooks`]: the observer capability (`CycleObserver`, `HookRegistry`,
//!   `CallbackHub`) that decouples signal producers from recorders
//! - [`live`]: fire-and-forget UDP datagrams for an external dashboard
//! - [`report`]: narrative and JSON line formatting, stderr/log-file fanout
//!
//! ### Configuration and Data Modules
//!
//! - [`cli`]: command-line argument parsing
//! - [`config`]: the immutable per-session configuration snapshot
//! - [`domain`]: core domain types (`Generation`, `CycleEvent`,
//!   `SnapshotRecord`) and error enums
//!
//! ## Recording Discipline
//!
//! The recording hook runs synchronously on whatever thread delivers the
//! signal. It reads the monotonic clock, updates one start slot or
//! appends one tuple, and returns. No formatting, no allocation beyond
//! the buffer push, no I/O. Everything observable is produced by the
//! drain pass after recording has stopped, so a session's cost to the
//! target stays flat no matter which reports were requested.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Narrative monitoring, summary on exit
//! gcscope run python app.py
//!
//! # Machine-readable stream plus a log file
//! gcscope run --json --log-file gc.jsonl python app.py
//!
//! # ASCII flame graph in the terminal, folded samples to a file
//! gcscope run --terminal-flamegraph --flamegraph-file gc.folded ./worker
//! ```

pub mod advice;
pub mod cli;
pub mod config;
pub mod domain;
pub mod drain;
pub mod flamegraph;
pub mod hooks;
pub mod ingest;
pub mod live;
pub mod recorder;
pub mod report;
pub mod stats;
pub mod supervise;
