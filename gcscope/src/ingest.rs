//! Hook-signal ingestion.
//!
//! Reads the line protocol from the pipe the target inherited and turns
//! each line into an observer dispatch. Runs on its own thread (the
//! supervisor owns the thread; this module is just the pump loop) and
//! exits at EOF, which happens once every write end of the pipe is
//! closed. A malformed line is counted and skipped; a broken reader ends
//! the pump the same way EOF does.

use std::io::BufRead;

use gcscope_wire::HookSignal;
use log::{debug, warn};

use crate::domain::Generation;
use crate::hooks::{CallbackHub, CycleInfo, CyclePhase, PendingCounts};

/// Counters reported when the pump loop finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Signals parsed and dispatched.
    pub signals: u64,
    /// Lines that were not valid signal JSON.
    pub malformed: u64,
}

/// Pump the reader dry, dispatching every signal into `hub`.
pub fn pump<R: BufRead>(reader: R, hub: &CallbackHub) -> IngestStats {
    let mut stats = IngestStats::default();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("hook pipe read failed, stopping ingest: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HookSignal>(&line) {
            Ok(signal) => {
                stats.signals += 1;
                dispatch(hub, signal);
            }
            Err(e) => {
                stats.malformed += 1;
                debug!("ignoring malformed hook signal: {e}");
            }
        }
    }

    debug!("ingest finished: {} signals, {} malformed", stats.signals, stats.malformed);
    stats
}

fn dispatch(hub: &CallbackHub, signal: HookSignal) {
    match signal {
        HookSignal::Start { generation } => {
            let info = CycleInfo::starting(Generation::from_index(u64::from(generation)));
            hub.dispatch_cycle(CyclePhase::Start, &info);
        }
        HookSignal::Stop { generation, collected, uncollectable } => {
            let info = CycleInfo {
                generation: Generation::from_index(u64::from(generation)),
                collected,
                uncollectable,
            };
            hub.dispatch_cycle(CyclePhase::Stop, &info);
        }
        HookSignal::Snapshot { gen0, gen1, gen2, total_objects } => {
            let counts = PendingCounts { pending: [gen0, gen1, gen2], total_objects };
            hub.dispatch_snapshot(&counts);
        }
    }
}
