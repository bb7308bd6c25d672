//! Domain types providing compile-time safety and self-documentation
//!
//! These types prevent common bugs like indexing a per-generation table
//! with an unchecked integer, and make function signatures more expressive.

use std::fmt;

/// Collector generation (age tier)
///
/// Generational collectors tier objects youngest=0 through oldest=2.
/// Signals occasionally report an out-of-range tier; those clamp to the
/// oldest generation rather than widening every table in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Generation {
    Gen0,
    Gen1,
    Gen2,
}

impl Generation {
    /// Number of generations; sizes the fixed per-generation tables.
    pub const COUNT: usize = 3;

    /// All generations, youngest first.
    pub const ALL: [Generation; Generation::COUNT] =
        [Generation::Gen0, Generation::Gen1, Generation::Gen2];

    /// Map a raw tier index to a generation, clamping to the oldest.
    #[must_use]
    pub fn from_index(index: u64) -> Self {
        match index {
            0 => Generation::Gen0,
            1 => Generation::Gen1,
            _ => Generation::Gen2,
        }
    }

    /// Table index (0, 1 or 2).
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// One completed reclamation cycle
///
/// Created on the recording hot path at cycle stop and never mutated.
/// `relative_time` is seconds since the monitoring session started
/// (monotonic clock), which keeps the record wall-clock independent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleEvent {
    pub relative_time: f64,
    pub generation: Generation,
    pub duration_ms: f64,
    /// Objects reclaimed, as reported by the collector (not recomputed).
    pub collected: u64,
    /// Objects found unreachable but not freeable.
    pub uncollectable: u64,
}

/// Periodic pending-object counts reported between cycles
///
/// Buffered like events (scalar append only) and replayed at drain time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotRecord {
    pub relative_time: f64,
    /// Objects awaiting collection, indexed by [`Generation::index`].
    pub pending: [u64; Generation::COUNT],
    /// Total objects tracked by the collector, when the adapter was asked
    /// to report it.
    pub total_objects: Option<u64>,
}
