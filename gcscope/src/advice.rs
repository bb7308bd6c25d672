//! Heuristic tuning advice and blunder detection.
//!
//! Everything here is a pure function of the aggregated statistics, the
//! alert threshold and elapsed wall time; nothing feeds back into
//! measurement. Two independent outputs:
//!
//! - **advisories** - ordered tuning suggestions from a fixed rule set
//! - **blunders** - severity-graded anti-pattern diagnoses with a
//!   machine-readable type tag, for downstream tooling
//!
//! The optional [`AppProfile`] tailors advisory phrasing to the kind of
//! application being monitored; it never changes which rules fire.

// Rate and percentage math intentionally converts counters to f64
#![allow(clippy::cast_precision_loss)]

use std::fmt;

use serde::Serialize;

use crate::domain::Generation;
use crate::report::format_duration;
use crate::stats::{percentile, GcStats};

// =============================================================================
// THRESHOLDS
// =============================================================================

/// Generation-0 collection rate considered allocation churn, per minute.
const GEN0_CHURN_PER_MIN: f64 = 800.0;

/// Fraction of the alert threshold at which a p95 pause draws advice.
const P95_ALERT_FRACTION: f64 = 0.8;

/// Generation-2 mean pause considered heavy, in milliseconds.
const GEN2_MEAN_PAUSE_MS: f64 = 10.0;

/// Share of a generation's pauses at/over the alert threshold that
/// triggers the headroom advisory.
const LONG_PAUSE_SHARE: f64 = 0.2;

/// GC duty cycle (fraction of wall time) considered excessive.
const DUTY_CYCLE_LIMIT: f64 = 0.05;

/// Inter-collection gap counted as a burst, in seconds.
const BURST_GAP_SECS: f64 = 0.05;

/// Share of bursty gaps that triggers the throttling advisory.
const BURST_SHARE: f64 = 0.3;

/// Share of full (generation-2) collections flagged as excessive.
const GEN2_SHARE_LIMIT: f64 = 0.1;

/// Pause lengths grading the long-pause blunder, in milliseconds.
const PAUSE_HIGH_MS: f64 = 50.0;
const PAUSE_CRITICAL_MS: f64 = 100.0;

/// GC share of CPU time grading the cpu-usage blunder, in percent.
const GC_CPU_HIGH_PCT: f64 = 2.0;
const GC_CPU_CRITICAL_PCT: f64 = 5.0;

/// Uncollectable-object count beyond which leaks get flagged.
const UNCOLLECTABLE_LIMIT: u64 = 100;

// =============================================================================
// APP PROFILE
// =============================================================================

/// Detected application category, inferred from the target command line.
///
/// Used only to pick phrasing in advisories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppProfile {
    WebServerAsync,
    WorkerQueue,
    DataProcessing,
    Unknown,
}

impl AppProfile {
    /// Guess the category from the target argv.
    #[must_use]
    pub fn detect(argv: &[String]) -> Self {
        let haystack = argv.join(" ").to_lowercase();
        let matches_any = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

        if matches_any(&["uvicorn", "gunicorn", "hypercorn", "server", "http", "api"]) {
            AppProfile::WebServerAsync
        } else if matches_any(&["worker", "celery", "consumer", "queue"]) {
            AppProfile::WorkerQueue
        } else if matches_any(&["etl", "batch", "pipeline", "spark", "ingest"]) {
            AppProfile::DataProcessing
        } else {
            AppProfile::Unknown
        }
    }

    /// When this kind of application has slack for extra collections.
    fn idle_windows(self) -> &'static str {
        match self {
            AppProfile::WebServerAsync => "between request bursts",
            AppProfile::WorkerQueue => "between job batches",
            AppProfile::DataProcessing => "between pipeline stages",
            AppProfile::Unknown => "during idle periods",
        }
    }

    /// What to throttle when collections come in bursts.
    fn burst_advice(self) -> &'static str {
        match self {
            AppProfile::WebServerAsync => {
                "throttling background tasks or pacing request-driven allocations"
            }
            AppProfile::WorkerQueue => "throttling queue consumers or staggering batch starts",
            AppProfile::DataProcessing => "spacing batch stages or chunking large loads",
            AppProfile::Unknown => "throttling background workers or smoothing allocation bursts",
        }
    }
}

// =============================================================================
// ADVISORIES
// =============================================================================

/// Apply the fixed advisory rule set, in order.
///
/// Rules scanning per-generation state visit generations youngest first.
/// `elapsed_secs` below one second is treated as one so rates stay sane
/// for very short runs.
#[must_use]
pub fn recommendations(
    stats: &GcStats,
    alert_threshold_ms: f64,
    elapsed_secs: f64,
    profile: AppProfile,
) -> Vec<String> {
    let runtime = elapsed_secs.max(1.0);
    let mut recs = Vec::new();

    // 1. Generation-0 churn
    let gen0_per_min = stats.count(Generation::Gen0) as f64 / (runtime / 60.0);
    if gen0_per_min > GEN0_CHURN_PER_MIN {
        recs.push(format!(
            "Generation 0 is collecting {gen0_per_min:.0} times/min. Consider caching or \
             batching short-lived allocations, or raising gen0 thresholds."
        ));
    }

    // 2. p95 approaching the alert threshold
    for generation in Generation::ALL {
        let samples = stats.recent_pauses(generation);
        if samples.is_empty() {
            continue;
        }
        let p95 = percentile(&samples, 95.0);
        if p95 >= alert_threshold_ms * P95_ALERT_FRACTION {
            recs.push(format!(
                "Generation {generation} p95 pause {p95:.1}ms is approaching/exceeding the \
                 {alert_threshold_ms}ms alert threshold. Tune allocation pressure or trigger \
                 collections {}.",
                profile.idle_windows()
            ));
        }
    }

    // 3. Heavy full collections
    let gen2_pauses = stats.recent_pauses(Generation::Gen2);
    if !gen2_pauses.is_empty() {
        let mean = gen2_pauses.iter().sum::<f64>() / gen2_pauses.len() as f64;
        if mean > GEN2_MEAN_PAUSE_MS {
            recs.push(format!(
                "Generation 2 average pause {mean:.1}ms. Consider reducing long-lived \
                 allocations or forcing collections during low-traffic windows."
            ));
        }
    }

    // 4. Too many pauses at/over the threshold
    for generation in Generation::ALL {
        let samples = stats.recent_pauses(generation);
        if samples.is_empty() {
            continue;
        }
        let long = samples.iter().filter(|&&pause| pause >= alert_threshold_ms).count();
        let share = long as f64 / samples.len() as f64;
        if share > LONG_PAUSE_SHARE {
            recs.push(format!(
                "{:.0}% of Generation {generation} pauses exceed the alert threshold. Consider \
                 increasing heap headroom or revisiting worker batching.",
                share * 100.0
            ));
        }
    }

    // 5. Max pause over the threshold
    if stats.max_duration_ms() > alert_threshold_ms {
        recs.push(format!(
            "Observed GC pauses up to {} which exceeds the alert threshold of \
             {alert_threshold_ms}ms. Tune workload or increase heap headroom.",
            format_duration(stats.max_duration_ms())
        ));
    }

    // 6. Duty cycle
    let duty_cycle = (stats.total_duration_ms() / 1000.0) / runtime;
    if duty_cycle > DUTY_CYCLE_LIMIT {
        recs.push(format!(
            "GC consumed {:.1}% of runtime. Consider increasing spacing between \
             memory-intensive tasks or optimizing object lifetimes.",
            duty_cycle * 100.0
        ));
    }

    // 7. Bursty collections
    let times = stats.collection_times();
    let gaps: Vec<f64> = times
        .windows(2)
        .filter(|pair| pair[1] >= pair[0])
        .map(|pair| pair[1] - pair[0])
        .collect();
    if !gaps.is_empty() {
        let bursts = gaps.iter().filter(|&&gap| gap < BURST_GAP_SECS).count();
        if bursts as f64 / gaps.len() as f64 > BURST_SHARE {
            recs.push(format!(
                "GC events are bursting faster than 50ms apart. Consider {}.",
                profile.burst_advice()
            ));
        }
    }

    recs
}

// =============================================================================
// BLUNDERS
// =============================================================================

/// Blunder severity grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

/// Machine-readable blunder category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlunderKind {
    ExcessiveGen2Collections,
    LongGcPauses,
    HighGcCpuUsage,
    UncollectableObjects,
}

impl BlunderKind {
    /// Stable tag for logs and structured output.
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            BlunderKind::ExcessiveGen2Collections => "excessive_gen2_collections",
            BlunderKind::LongGcPauses => "long_gc_pauses",
            BlunderKind::HighGcCpuUsage => "high_gc_cpu_usage",
            BlunderKind::UncollectableObjects => "uncollectable_objects",
        }
    }

    /// Section heading for the narrative report.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            BlunderKind::ExcessiveGen2Collections => "Excessive Gen 2 Collections",
            BlunderKind::LongGcPauses => "Long GC Pauses",
            BlunderKind::HighGcCpuUsage => "High GC CPU Usage",
            BlunderKind::UncollectableObjects => "Uncollectable Objects",
        }
    }
}

/// One diagnosed anti-pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blunder {
    #[serde(rename = "type")]
    pub kind: BlunderKind,
    pub severity: Severity,
    pub metric: String,
    pub impact: String,
}

/// Grade the session against the fixed anti-pattern set.
///
/// `total_uncollectable` is summed over every recorded event by the
/// caller; the aggregator itself does not track it.
#[must_use]
pub fn detect_blunders(
    stats: &GcStats,
    total_uncollectable: u64,
    elapsed_secs: f64,
) -> Vec<Blunder> {
    let mut blunders = Vec::new();

    let total = stats.total_collections();
    let gen2 = stats.count(Generation::Gen2);
    if total > 0 && gen2 as f64 / total as f64 > GEN2_SHARE_LIMIT {
        blunders.push(Blunder {
            kind: BlunderKind::ExcessiveGen2Collections,
            severity: Severity::High,
            metric: format!("{gen2} Gen 2 collections out of {total} total"),
            impact: "Causes long application pauses and high latency spikes".to_string(),
        });
    }

    let max_pause = stats.max_duration_ms();
    if max_pause > PAUSE_HIGH_MS {
        let severity =
            if max_pause > PAUSE_CRITICAL_MS { Severity::Critical } else { Severity::High };
        blunders.push(Blunder {
            kind: BlunderKind::LongGcPauses,
            severity,
            metric: format!("Maximum GC pause: {max_pause:.1}ms"),
            impact: "Causes user-visible latency spikes and poor application responsiveness"
                .to_string(),
        });
    }

    if elapsed_secs > 0.0 {
        let gc_cpu_pct = (stats.total_duration_ms() / 1000.0) / elapsed_secs * 100.0;
        if gc_cpu_pct > GC_CPU_HIGH_PCT {
            let severity =
                if gc_cpu_pct > GC_CPU_CRITICAL_PCT { Severity::Critical } else { Severity::High };
            blunders.push(Blunder {
                kind: BlunderKind::HighGcCpuUsage,
                severity,
                metric: format!("GC uses {gc_cpu_pct:.1}% of total CPU time"),
                impact: format!(
                    "Wastes roughly {:.1}% of provisioned compute at typical 35% utilization",
                    gc_cpu_pct / 0.35
                ),
            });
        }
    }

    if total_uncollectable > UNCOLLECTABLE_LIMIT {
        blunders.push(Blunder {
            kind: BlunderKind::UncollectableObjects,
            severity: Severity::Medium,
            metric: format!("{total_uncollectable} uncollectable objects found"),
            impact: "Memory leaks and inefficient memory usage".to_string(),
        });
    }

    blunders
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_from(events: &[(Generation, f64, f64)]) -> GcStats {
        let mut stats = GcStats::new();
        for &(generation, duration_ms, at) in events {
            stats.record(generation, duration_ms, at);
        }
        stats
    }

    #[test]
    fn test_quiet_session_yields_no_advice() {
        let stats = stats_from(&[(Generation::Gen0, 0.5, 0.0), (Generation::Gen0, 0.4, 10.0)]);
        let recs = recommendations(&stats, 50.0, 60.0, AppProfile::Unknown);
        assert!(recs.is_empty(), "unexpected advice: {recs:?}");
    }

    #[test]
    fn test_gen0_churn_rule() {
        let mut stats = GcStats::new();
        for i in 0..900 {
            stats.record(Generation::Gen0, 0.2, f64::from(i) * 0.066);
        }
        let recs = recommendations(&stats, 500.0, 60.0, AppProfile::Unknown);
        assert!(recs.iter().any(|r| r.starts_with("Generation 0 is collecting")));
    }

    #[test]
    fn test_p95_rule_fires_at_eighty_percent_of_threshold() {
        let mut stats = GcStats::new();
        for i in 0..20 {
            stats.record(Generation::Gen1, 41.0, f64::from(i));
        }
        let recs = recommendations(&stats, 50.0, 60.0, AppProfile::Unknown);
        assert!(recs.iter().any(|r| r.contains("Generation 1 p95 pause")));

        let calm = stats_from(&[(Generation::Gen1, 10.0, 0.0), (Generation::Gen1, 12.0, 1.0)]);
        let none = recommendations(&calm, 50.0, 60.0, AppProfile::Unknown);
        assert!(!none.iter().any(|r| r.contains("p95")));
    }

    #[test]
    fn test_gen2_mean_pause_rule() {
        let stats = stats_from(&[
            (Generation::Gen2, 12.0, 0.0),
            (Generation::Gen2, 14.0, 5.0),
        ]);
        let recs = recommendations(&stats, 500.0, 60.0, AppProfile::Unknown);
        assert!(recs.iter().any(|r| r.starts_with("Generation 2 average pause 13.0ms")));
    }

    #[test]
    fn test_long_pause_share_rule() {
        let mut stats = GcStats::new();
        for i in 0..10 {
            let pause = if i < 3 { 60.0 } else { 1.0 };
            stats.record(Generation::Gen0, pause, f64::from(i));
        }
        let recs = recommendations(&stats, 50.0, 60.0, AppProfile::Unknown);
        assert!(recs.iter().any(|r| r.contains("30% of Generation 0 pauses")));
    }

    #[test]
    fn test_max_pause_rule_uses_duration_formatting() {
        let stats = stats_from(&[(Generation::Gen0, 60.0, 0.0)]);
        let recs = recommendations(&stats, 50.0, 60.0, AppProfile::Unknown);
        assert!(recs.iter().any(|r| r.contains("Observed GC pauses up to 60.0ms")));
    }

    #[test]
    fn test_duty_cycle_rule() {
        let stats = stats_from(&[(Generation::Gen2, 6000.0, 0.0)]);
        let recs = recommendations(&stats, 10_000.0, 100.0, AppProfile::Unknown);
        assert!(recs.iter().any(|r| r.starts_with("GC consumed 6.0% of runtime")));
    }

    #[test]
    fn test_burst_rule_counts_close_gaps() {
        let mut stats = GcStats::new();
        for i in 0..10 {
            stats.record(Generation::Gen0, 0.5, f64::from(i) * 0.01);
        }
        let recs = recommendations(&stats, 50.0, 60.0, AppProfile::WorkerQueue);
        assert!(recs
            .iter()
            .any(|r| r.contains("bursting faster than 50ms") && r.contains("queue consumers")));

        let mut spaced = GcStats::new();
        for i in 0..10 {
            spaced.record(Generation::Gen0, 0.5, f64::from(i));
        }
        let none = recommendations(&spaced, 50.0, 60.0, AppProfile::Unknown);
        assert!(!none.iter().any(|r| r.contains("bursting")));
    }

    #[test]
    fn test_profile_detection_from_argv() {
        let argv = |parts: &[&str]| parts.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        assert_eq!(
            AppProfile::detect(&argv(&["gunicorn", "app:api"])),
            AppProfile::WebServerAsync
        );
        assert_eq!(AppProfile::detect(&argv(&["celery", "-A", "proj"])), AppProfile::WorkerQueue);
        assert_eq!(
            AppProfile::detect(&argv(&["python", "etl_job.py"])),
            AppProfile::DataProcessing
        );
        assert_eq!(AppProfile::detect(&argv(&["./bench.sh"])), AppProfile::Unknown);
    }

    #[test]
    fn test_blunders_for_the_slow_full_collection_session() {
        let stats = stats_from(&[
            (Generation::Gen0, 0.5, 0.0),
            (Generation::Gen0, 0.6, 1.0),
            (Generation::Gen2, 60.0, 2.0),
        ]);
        let blunders = detect_blunders(&stats, 0, 60.0);

        let kinds: Vec<BlunderKind> = blunders.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BlunderKind::ExcessiveGen2Collections, BlunderKind::LongGcPauses]);

        let long = &blunders[1];
        assert_eq!(long.severity, Severity::High);
        assert!(long.metric.contains("60.0"));
    }

    #[test]
    fn test_long_pause_severity_grades() {
        let high = detect_blunders(&stats_from(&[(Generation::Gen0, 60.0, 0.0)]), 0, 60.0);
        assert_eq!(high[0].severity, Severity::High);

        let critical = detect_blunders(&stats_from(&[(Generation::Gen0, 150.0, 0.0)]), 0, 60.0);
        assert_eq!(critical[0].severity, Severity::Critical);

        let none = detect_blunders(&stats_from(&[(Generation::Gen0, 50.0, 0.0)]), 0, 60.0);
        assert!(none.is_empty());
    }

    #[test]
    fn test_cpu_usage_severity_grades() {
        // 3s of GC in 100s elapsed = 3%
        let high = detect_blunders(&stats_from(&[(Generation::Gen1, 3000.0, 0.0)]), 0, 100.0);
        assert!(high.iter().any(|b| b.kind == BlunderKind::HighGcCpuUsage
            && b.severity == Severity::High
            && b.metric == "GC uses 3.0% of total CPU time"));

        // 10s of GC in 100s elapsed = 10%
        let critical =
            detect_blunders(&stats_from(&[(Generation::Gen1, 10_000.0, 0.0)]), 0, 100.0);
        assert!(critical
            .iter()
            .any(|b| b.kind == BlunderKind::HighGcCpuUsage && b.severity == Severity::Critical));
    }

    #[test]
    fn test_uncollectable_count_boundary() {
        let stats = stats_from(&[(Generation::Gen0, 0.5, 0.0)]);
        assert!(detect_blunders(&stats, 100, 60.0).is_empty());

        let flagged = detect_blunders(&stats, 101, 60.0);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].kind, BlunderKind::UncollectableObjects);
        assert_eq!(flagged[0].severity, Severity::Medium);
        assert_eq!(flagged[0].metric, "101 uncollectable objects found");
    }

    #[test]
    fn test_blunder_serialization_tags() {
        let blunder = Blunder {
            kind: BlunderKind::LongGcPauses,
            severity: Severity::High,
            metric: "Maximum GC pause: 60.0ms".to_string(),
            impact: "latency".to_string(),
        };
        let value = serde_json::to_value(&blunder).unwrap();
        assert_eq!(value["type"], "long_gc_pauses");
        assert_eq!(value["severity"], "high");
        assert_eq!(BlunderKind::HighGcCpuUsage.as_tag(), "high_gc_cpu_usage");
    }

    #[test]
    fn test_empty_session_has_no_blunders() {
        assert!(detect_blunders(&GcStats::new(), 0, 60.0).is_empty());
    }
}
