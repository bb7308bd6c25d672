//! The deferred-drain cycle recorder.
//!
//! [`GcMonitor`] is the component that sits inside the measured window.
//! Its observer callback does the minimum that preserves the data: read
//! the clock, update one start slot or append one tuple. Formatting,
//! aggregation and every byte of I/O wait until [`GcMonitor::stop`],
//! which runs the drain pass exactly once no matter how many times it is
//! called or whether it is reached through [`Drop`].
//!
//! The monitor treats the observer registry as shared ground: it records
//! which observers were installed before it and, on stop, re-registers
//! any of them that have gone missing, so stacking monitors (or hosts
//! with their own observers) compose.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use gcscope_wire::LiveEvent;
use log::{debug, warn};

use crate::config::SessionConfig;
use crate::domain::{CycleEvent, Generation, SnapshotRecord};
use crate::drain::{self, DrainOutcome};
use crate::hooks::{CycleInfo, CycleObserver, CyclePhase, HookRegistry, PendingCounts};
use crate::live::UdpEmitter;
use crate::report::ReportWriter;

/// Mutable recording state, guarded by one lock.
///
/// Held only for the few instructions that update it; the live emitter
/// fires after the lock is released.
struct RecordState {
    /// Start instant of the in-flight cycle per generation, if any.
    starts: [Option<Instant>; Generation::COUNT],
    events: Vec<CycleEvent>,
    snapshots: Vec<SnapshotRecord>,
}

/// The observer half: what actually runs when a signal arrives.
struct RecorderCore {
    session_start: Instant,
    /// Wall-clock anchor for converting relative times back to epoch
    /// timestamps in structured output. 0 when the clock is unreadable.
    start_epoch_secs: f64,
    state: Mutex<RecordState>,
    live: Option<UdpEmitter>,
}

impl RecorderCore {
    #[allow(clippy::cast_possible_truncation)]
    fn emit_live(&self, event: CycleEvent) {
        if let Some(live) = &self.live {
            live.emit(&LiveEvent {
                timestamp: self.start_epoch_secs + event.relative_time,
                generation: event.generation.index() as u8,
                duration_ms: event.duration_ms,
                collected: event.collected,
                uncollectable: event.uncollectable,
            });
        }
    }
}

impl CycleObserver for RecorderCore {
    fn on_cycle(&self, phase: CyclePhase, info: &CycleInfo) {
        let now = Instant::now();
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match phase {
            CyclePhase::Start => {
                state.starts[info.generation.index()] = Some(now);
            }
            CyclePhase::Stop => {
                // A stop with no matching start still counts; it just has
                // no measurable pause.
                let started = state.starts[info.generation.index()].take();
                let duration_ms =
                    started.map_or(0.0, |s| now.duration_since(s).as_secs_f64() * 1000.0);
                let event = CycleEvent {
                    relative_time: now.duration_since(self.session_start).as_secs_f64(),
                    generation: info.generation,
                    duration_ms,
                    collected: info.collected,
                    uncollectable: info.uncollectable,
                };
                state.events.push(event);
                drop(state);
                self.emit_live(event);
            }
        }
    }

    fn on_snapshot(&self, counts: &PendingCounts) {
        let relative_time = self.session_start.elapsed().as_secs_f64();
        if let Ok(mut state) = self.state.lock() {
            state.snapshots.push(SnapshotRecord {
                relative_time,
                pending: counts.pending,
                total_objects: counts.total_objects,
            });
        }
    }
}

/// A monitoring session: hook registration, buffering and the once-only
/// drain.
pub struct GcMonitor {
    config: SessionConfig,
    registry: Arc<dyn HookRegistry>,
    core: Arc<RecorderCore>,
    /// Observers that were registered before this monitor installed.
    prior: Vec<Arc<dyn CycleObserver>>,
    stopped: AtomicBool,
}

impl GcMonitor {
    /// Register a recorder on `registry` and start the session clock.
    pub fn install(config: SessionConfig, registry: Arc<dyn HookRegistry>) -> Self {
        let live = match config.live_target {
            Some(addr) => match UdpEmitter::new(addr) {
                Ok(emitter) => {
                    debug!("live events to {}", emitter.target());
                    Some(emitter)
                }
                Err(e) => {
                    warn!("live emitter disabled: {e}");
                    None
                }
            },
            None => None,
        };

        let start_epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |since| since.as_secs_f64());

        let core = Arc::new(RecorderCore {
            session_start: Instant::now(),
            start_epoch_secs,
            state: Mutex::new(RecordState {
                starts: [None; Generation::COUNT],
                events: Vec::new(),
                snapshots: Vec::new(),
            }),
            live,
        });

        let prior = registry.snapshot();
        registry.register(core.clone());

        Self { config, registry, core, prior, stopped: AtomicBool::new(false) }
    }

    /// Whether the session has already been drained.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop recording and write the report to stderr (and the log file,
    /// when configured). Returns `None` on every call after the first.
    pub fn stop(&self) -> Option<DrainOutcome> {
        if self.is_stopped() {
            return None;
        }
        let mut writer = ReportWriter::stderr(self.config.stats_only);
        if let Some(path) = self.config.log_file.clone() {
            if let Err(e) = writer.open_log_file(&path) {
                // Report still goes to the terminal stream
                warn!("{e}");
            }
        }
        self.shutdown(&mut writer)
    }

    /// [`stop`](Self::stop) against a caller-supplied writer.
    pub fn shutdown(&self, writer: &mut ReportWriter) -> Option<DrainOutcome> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return None;
        }

        let core_dyn: Arc<dyn CycleObserver> = self.core.clone();
        self.registry.deregister(&core_dyn);
        for observer in &self.prior {
            if !self.registry.contains(observer) {
                self.registry.register(observer.clone());
            }
        }

        let elapsed_secs = self.core.session_start.elapsed().as_secs_f64();
        let (events, snapshots) = match self.core.state.lock() {
            Ok(mut state) => (mem::take(&mut state.events), mem::take(&mut state.snapshots)),
            Err(_) => (Vec::new(), Vec::new()),
        };
        debug!(
            "draining session: {} events, {} snapshots over {elapsed_secs:.1}s",
            events.len(),
            snapshots.len()
        );

        let outcome = drain::run(
            &events,
            &snapshots,
            &self.config,
            elapsed_secs,
            self.core.start_epoch_secs,
            writer,
        );
        writer.finish();
        Some(outcome)
    }
}

impl Drop for GcMonitor {
    fn drop(&mut self) {
        // Covers panic and early-return paths; a no-op after stop().
        self.stop();
    }
}
