//! Running GC statistics.
//!
//! This module accumulates per-cycle pause data during the drain pass to
//! produce totals, per-generation counts and percentile estimates for the
//! final report.
//!
//! # Architecture
//!
//! - **`GcStats`** - running accumulator, fed one event at a time
//! - **`StatsSummary`** - the totals "view model" for report rendering
//! - **`percentile()`** - linear-interpolated order statistic
//!
//! # Performance
//!
//! - `record()`: O(1) amortized (scalar updates plus a bounded deque push)
//! - `percentile()`: O(n log n) for n samples (sorting a copy)
//! - Memory: O(`HISTORY_CAP`) per generation, everything else scalar

// Rate and percentage math intentionally converts counters to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, VecDeque};

use crate::domain::Generation;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Rolling-window capacity per generation, in samples.
///
/// Percentiles are estimated over the most recent pauses only; keeping the
/// window fixed bounds memory for arbitrarily long sessions. 200 samples
/// is plenty for a stable p95 while staying cheap to sort at drain time.
pub const HISTORY_CAP: usize = 200;

// =============================================================================
// SUMMARY (OUTPUT TYPE)
// =============================================================================

/// Aggregated session totals for report rendering.
///
/// `by_generation` contains only the generations that actually collected,
/// in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    pub total_collections: u64,
    pub total_duration_ms: f64,
    /// 0 when no collections were recorded.
    pub mean_duration_ms: f64,
    pub max_duration_ms: f64,
    pub by_generation: BTreeMap<Generation, u64>,
}

// =============================================================================
// GC STATS (AGGREGATOR)
// =============================================================================

/// Running statistics accumulator.
///
/// Fed exactly once per recorded cycle during the single-threaded drain
/// pass. Totals are exact over the whole session; the per-generation
/// rolling windows hold only the last [`HISTORY_CAP`] pauses and exist
/// solely for percentile estimates.
#[derive(Debug)]
pub struct GcStats {
    total_collections: u64,
    total_duration_ms: f64,
    max_duration_ms: f64,

    /// Cycle count per generation, indexed by [`Generation::index`].
    counts: [u64; Generation::COUNT],

    /// Recent pause durations per generation, oldest evicted first.
    history: [VecDeque<f64>; Generation::COUNT],

    /// Relative time of every recorded cycle, for burstiness analysis.
    collection_times: Vec<f64>,
}

impl Default for GcStats {
    fn default() -> Self {
        Self {
            total_collections: 0,
            total_duration_ms: 0.0,
            max_duration_ms: 0.0,
            counts: [0; Generation::COUNT],
            history: [
                VecDeque::with_capacity(HISTORY_CAP),
                VecDeque::with_capacity(HISTORY_CAP),
                VecDeque::with_capacity(HISTORY_CAP),
            ],
            collection_times: Vec::new(),
        }
    }
}

impl GcStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed cycle.
    ///
    /// Must only be called from the drain pass; never concurrently.
    pub fn record(&mut self, generation: Generation, duration_ms: f64, relative_time: f64) {
        self.total_collections += 1;
        self.total_duration_ms += duration_ms;
        if duration_ms > self.max_duration_ms {
            self.max_duration_ms = duration_ms;
        }

        let idx = generation.index();
        self.counts[idx] += 1;

        let window = &mut self.history[idx];
        if window.len() == HISTORY_CAP {
            window.pop_front();
        }
        window.push_back(duration_ms);

        self.collection_times.push(relative_time);
    }

    #[must_use]
    pub fn total_collections(&self) -> u64 {
        self.total_collections
    }

    #[must_use]
    pub fn total_duration_ms(&self) -> f64 {
        self.total_duration_ms
    }

    #[must_use]
    pub fn max_duration_ms(&self) -> f64 {
        self.max_duration_ms
    }

    /// Cycle count for one generation.
    #[must_use]
    pub fn count(&self, generation: Generation) -> u64 {
        self.counts[generation.index()]
    }

    /// Recent pauses for one generation, oldest first.
    #[must_use]
    pub fn recent_pauses(&self, generation: Generation) -> Vec<f64> {
        self.history[generation.index()].iter().copied().collect()
    }

    /// Relative times of all recorded cycles, in record order.
    #[must_use]
    pub fn collection_times(&self) -> &[f64] {
        &self.collection_times
    }

    /// Aggregate totals for the final report.
    #[must_use]
    pub fn summary(&self) -> StatsSummary {
        let mean_duration_ms = if self.total_collections > 0 {
            self.total_duration_ms / self.total_collections as f64
        } else {
            0.0
        };

        let mut by_generation = BTreeMap::new();
        for generation in Generation::ALL {
            let count = self.counts[generation.index()];
            if count > 0 {
                by_generation.insert(generation, count);
            }
        }

        StatsSummary {
            total_collections: self.total_collections,
            total_duration_ms: self.total_duration_ms,
            mean_duration_ms,
            max_duration_ms: self.max_duration_ms,
            by_generation,
        }
    }
}

// =============================================================================
// PERCENTILE
// =============================================================================

/// Percentile of an unordered sample set with linear interpolation.
///
/// `p` is in `[0, 100]`. Returns 0.0 for an empty set and the sole value
/// for a singleton; p=0 is the minimum and p=100 the maximum.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (sorted.len() - 1) as f64 * (p / 100.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_all(stats: &mut GcStats, events: &[(Generation, f64, f64)]) {
        for &(generation, duration_ms, at) in events {
            stats.record(generation, duration_ms, at);
        }
    }

    #[test]
    fn test_totals_are_exact_sums_and_max() {
        let mut stats = GcStats::new();
        record_all(
            &mut stats,
            &[
                (Generation::Gen0, 0.5, 0.0),
                (Generation::Gen0, 0.6, 1.0),
                (Generation::Gen2, 60.0, 2.0),
            ],
        );

        assert_eq!(stats.total_collections(), 3);
        assert!((stats.total_duration_ms() - 61.1).abs() < 1e-9);
        assert!((stats.max_duration_ms() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_max_never_decreases() {
        let mut stats = GcStats::new();
        stats.record(Generation::Gen0, 40.0, 0.0);
        stats.record(Generation::Gen0, 5.0, 1.0);
        stats.record(Generation::Gen1, 12.0, 2.0);
        assert!((stats.max_duration_ms() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_with_no_collections_is_all_zero() {
        let summary = GcStats::new().summary();
        assert_eq!(summary.total_collections, 0);
        assert!(summary.total_duration_ms.abs() < f64::EPSILON);
        assert!(summary.mean_duration_ms.abs() < f64::EPSILON);
        assert!(summary.max_duration_ms.abs() < f64::EPSILON);
        assert!(summary.by_generation.is_empty());
    }

    #[test]
    fn test_summary_lists_only_occurring_generations() {
        let mut stats = GcStats::new();
        record_all(
            &mut stats,
            &[
                (Generation::Gen0, 0.5, 0.0),
                (Generation::Gen0, 0.6, 1.0),
                (Generation::Gen2, 60.0, 2.0),
            ],
        );

        let summary = stats.summary();
        assert_eq!(summary.by_generation.len(), 2);
        assert_eq!(summary.by_generation[&Generation::Gen0], 2);
        assert_eq!(summary.by_generation[&Generation::Gen2], 1);
        assert!(!summary.by_generation.contains_key(&Generation::Gen1));
    }

    #[test]
    fn test_rolling_window_evicts_oldest() {
        let mut stats = GcStats::new();
        for i in 0..(HISTORY_CAP + 10) {
            stats.record(Generation::Gen0, i as f64, i as f64);
        }

        let window = stats.recent_pauses(Generation::Gen0);
        assert_eq!(window.len(), HISTORY_CAP);
        assert!((window[0] - 10.0).abs() < f64::EPSILON);
        // Totals still cover every sample, not just the window
        assert_eq!(stats.total_collections(), (HISTORY_CAP + 10) as u64);
    }

    #[test]
    fn test_percentile_empty_and_singleton() {
        assert!(percentile(&[], 95.0).abs() < f64::EPSILON);
        assert!((percentile(&[7.5], 0.0) - 7.5).abs() < f64::EPSILON);
        assert!((percentile(&[7.5], 100.0) - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentile_sorts_its_input() {
        let samples = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert!((percentile(&samples, 50.0) - 3.0).abs() < f64::EPSILON);
        assert!((percentile(&samples, 0.0) - 1.0).abs() < f64::EPSILON);
        assert!((percentile(&samples, 100.0) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentile_interpolates_between_order_statistics() {
        // rank = 3 * 0.5 = 1.5 → halfway between 20 and 30
        assert!((percentile(&[10.0, 20.0, 30.0, 40.0], 50.0) - 25.0).abs() < 1e-9);
        // rank = 3 * 0.95 = 2.85 → 30 + 0.85 * 10
        assert!((percentile(&[10.0, 20.0, 30.0, 40.0], 95.0) - 38.5).abs() < 1e-9);
    }
}
