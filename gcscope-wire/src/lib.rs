//! # Shared Boundary Types (target adapter ↔ supervisor ↔ live viewers)
//!
//! Defines the data that crosses gcscope's two process boundaries:
//!
//! 1. **Hook-signal line protocol** - a target-runtime adapter reports each
//!    reclamation cycle to the supervising `gcscope` process as one JSON
//!    object per line ([`HookSignal`]) over an inherited pipe.
//! 2. **Live datagram events** - best-effort UDP JSON payloads
//!    ([`LiveEvent`]) for an external live viewer.
//!
//! Plus the environment-variable contract the supervisor uses to hand the
//! pipe and session options to the adapter. This crate is pure data: serde
//! types and constants, no I/O.

use serde::{Deserialize, Serialize};

// ============================================================================
// Environment Contract
// ============================================================================

/// File descriptor number of the hook pipe's write end, as decimal text.
///
/// Set by the supervisor before launching the target. The adapter inside
/// the target writes one [`HookSignal`] JSON object per line to this fd.
/// Absent when the target runs unsupervised; adapters must treat that as
/// "reporting disabled", never as an error.
pub const HOOK_FD_ENV: &str = "GCSCOPE_HOOK_FD";

/// Requested cadence for `snapshot` signals, in seconds (decimal text).
///
/// A hint only: adapters may snap to their own timer granularity or skip
/// snapshots entirely.
pub const SNAPSHOT_SECS_ENV: &str = "GCSCOPE_SNAPSHOT_SECS";

/// When set to `1`, the adapter should include `total_objects` in its
/// snapshot signals (the count of objects the collector currently tracks).
pub const DUMP_OBJECTS_ENV: &str = "GCSCOPE_DUMP_OBJECTS";

/// When set to `1`, the adapter should retain uncollectable garbage where
/// its runtime supports it, so post-run inspection sees the leaked set.
pub const DUMP_GARBAGE_ENV: &str = "GCSCOPE_DUMP_GARBAGE";

// ============================================================================
// Defaults
// ============================================================================

/// Default host for live datagram emission.
pub const DEFAULT_LIVE_HOST: &str = "127.0.0.1";

/// Default port for live datagram emission.
pub const DEFAULT_LIVE_PORT: u16 = 8989;

/// Number of collector generations carried by the protocol.
///
/// Generational collectors conventionally tier objects youngest=0 through
/// oldest=2; signals with a larger index are clamped to the oldest tier by
/// the receiver rather than rejected.
pub const GENERATION_COUNT: usize = 3;

// ============================================================================
// Hook-Signal Line Protocol
// ============================================================================

/// One line of the hook-signal protocol.
///
/// Serialized as a JSON object with a `phase` tag:
///
/// ```text
/// {"phase":"start","generation":0}
/// {"phase":"stop","generation":0,"collected":12,"uncollectable":0}
/// {"phase":"snapshot","gen0":421,"gen1":30,"gen2":6}
/// ```
///
/// `start`/`stop` bracket one reclamation cycle; the receiver measures the
/// pause between them with its own monotonic clock, so the wire carries no
/// timestamps. `collected`/`uncollectable` default to 0 when omitted, which
/// lets minimal adapters send bare `{"phase":"stop","generation":g}` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum HookSignal {
    /// A reclamation cycle is beginning for `generation`.
    Start { generation: u8 },

    /// The cycle for `generation` finished.
    Stop {
        generation: u8,
        /// Objects reclaimed by this cycle, as reported by the collector.
        #[serde(default)]
        collected: u64,
        /// Objects found unreachable but not freeable.
        #[serde(default)]
        uncollectable: u64,
    },

    /// Periodic pending-object counts, outside any cycle.
    Snapshot {
        gen0: u64,
        gen1: u64,
        gen2: u64,
        /// Total objects tracked by the collector; only present when the
        /// supervisor requested it via [`DUMP_OBJECTS_ENV`].
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_objects: Option<u64>,
    },
}

// ============================================================================
// Live Datagram Payload
// ============================================================================

/// One completed cycle, as pushed to a live viewer over UDP.
///
/// `timestamp` is wall-clock seconds since the Unix epoch (viewers plot
/// against real time, unlike the pipe protocol which is clock-free).
/// Delivery is unreliable by design; viewers must tolerate gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub timestamp: f64,
    pub generation: u8,
    pub duration_ms: f64,
    pub collected: u64,
    pub uncollectable: u64,
}
