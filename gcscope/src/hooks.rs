//! Reclamation-cycle observer capability
//!
//! The recorder never touches a process-global callback list directly.
//! Instead it depends on a [`HookRegistry`]: whoever owns the connection to
//! the collector (the supervisor's signal ingest, an embedding host, a
//! test) registers observers here and drives them through a
//! [`CallbackHub`]. That keeps the recorder composable with other
//! observers and testable without a live collector.

use std::sync::{Arc, RwLock};

use crate::domain::Generation;

/// Which edge of a reclamation cycle a signal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Start,
    Stop,
}

/// Payload of a cycle signal.
///
/// `collected`/`uncollectable` are only meaningful at [`CyclePhase::Stop`];
/// start signals carry zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleInfo {
    pub generation: Generation,
    pub collected: u64,
    pub uncollectable: u64,
}

impl CycleInfo {
    /// Info for a start signal, where counts do not exist yet.
    #[must_use]
    pub fn starting(generation: Generation) -> Self {
        Self { generation, collected: 0, uncollectable: 0 }
    }
}

/// Payload of a periodic snapshot signal (pending objects per generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCounts {
    pub pending: [u64; Generation::COUNT],
    pub total_objects: Option<u64>,
}

/// An observer of collector lifecycle signals.
///
/// `on_cycle` runs synchronously on whatever thread delivers the signal,
/// so implementations must stay cheap and must never call back into the
/// registry that is dispatching to them.
pub trait CycleObserver: Send + Sync {
    fn on_cycle(&self, phase: CyclePhase, info: &CycleInfo);

    /// Periodic pending-count report; most observers ignore these.
    fn on_snapshot(&self, _counts: &PendingCounts) {}
}

/// Register/unregister capability for cycle observers.
///
/// Implementations must tolerate observers other than the caller's own:
/// `snapshot` exposes the current registration list so a component can
/// record what was installed before it and restore any entry that went
/// missing when it deregisters itself.
pub trait HookRegistry: Send + Sync {
    fn register(&self, observer: Arc<dyn CycleObserver>);

    /// Remove the exact observer instance. Returns whether it was present.
    fn deregister(&self, observer: &Arc<dyn CycleObserver>) -> bool;

    /// Current registration list, in registration order.
    fn snapshot(&self) -> Vec<Arc<dyn CycleObserver>>;

    fn contains(&self, observer: &Arc<dyn CycleObserver>) -> bool {
        self.snapshot().iter().any(|existing| Arc::ptr_eq(existing, observer))
    }
}

/// The provided registry implementation: an ordered observer list plus the
/// dispatch entry points the signal source calls.
#[derive(Default)]
pub struct CallbackHub {
    observers: RwLock<Vec<Arc<dyn CycleObserver>>>,
}

impl CallbackHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a cycle signal to every registered observer, in order.
    ///
    /// Dispatch holds the registry read lock, so observers must not
    /// register or deregister from inside their callback. A poisoned lock
    /// drops the signal; recording-path failures never propagate.
    pub fn dispatch_cycle(&self, phase: CyclePhase, info: &CycleInfo) {
        if let Ok(observers) = self.observers.read() {
            for observer in observers.iter() {
                observer.on_cycle(phase, info);
            }
        }
    }

    /// Deliver a snapshot signal to every registered observer, in order.
    pub fn dispatch_snapshot(&self, counts: &PendingCounts) {
        if let Ok(observers) = self.observers.read() {
            for observer in observers.iter() {
                observer.on_snapshot(counts);
            }
        }
    }

    /// Number of currently registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().map_or(0, |list| list.len())
    }
}

impl HookRegistry for CallbackHub {
    fn register(&self, observer: Arc<dyn CycleObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    fn deregister(&self, observer: &Arc<dyn CycleObserver>) -> bool {
        let Ok(mut observers) = self.observers.write() else {
            return false;
        };
        let before = observers.len();
        observers.retain(|existing| !Arc::ptr_eq(existing, observer));
        observers.len() < before
    }

    fn snapshot(&self) -> Vec<Arc<dyn CycleObserver>> {
        self.observers.read().map(|list| list.clone()).unwrap_or_default()
    }
}
