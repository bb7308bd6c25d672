//! Shutdown drain: replay the buffered session through the analytics.
//!
//! Runs exactly once, after the target has finished. Every cost deferred
//! by the recording path lands here: per-event formatting, aggregation,
//! flame-graph accumulation, advisory evaluation and all report I/O.
//! Events and snapshots are replayed merged in relative-time order, so
//! the narrative reads the way the session actually ran.
//!
//! Nothing in this pass can fail the shutdown: report writes are
//! best-effort and the one real I/O hazard, the flame-graph file, is
//! reported as a summary message instead of an error.

use serde_json::json;

use crate::advice::{self, Blunder};
use crate::config::SessionConfig;
use crate::domain::{CycleEvent, SnapshotRecord};
use crate::flamegraph::FlameGraph;
use crate::report::{self, format_duration, ReportWriter};
use crate::stats::{GcStats, StatsSummary};

/// What the drain computed, for callers that want more than the text.
#[derive(Debug)]
pub struct DrainOutcome {
    pub summary: StatsSummary,
    pub recommendations: Vec<String>,
    pub blunders: Vec<Blunder>,
}

/// Replay the session and write the full report.
///
/// `elapsed_secs` is the wall-clock span of the session; rate-based
/// advisories divide by it. `start_epoch_secs` anchors relative event
/// times back to wall-clock timestamps for structured output.
pub fn run(
    events: &[CycleEvent],
    snapshots: &[SnapshotRecord],
    config: &SessionConfig,
    elapsed_secs: f64,
    start_epoch_secs: f64,
    writer: &mut ReportWriter,
) -> DrainOutcome {
    let mut stats = GcStats::new();
    let mut flame = (config.flamegraph_file.is_some() || config.terminal_flamegraph)
        .then(|| FlameGraph::new(config.flamegraph_bucket_secs, config.duration_buckets.clone()));
    let mut total_collected: u64 = 0;
    let mut total_uncollectable: u64 = 0;

    // Replay both streams in time order; an event and a snapshot at the
    // same relative time replay the event first.
    let mut pending_snapshots = snapshots.iter().peekable();
    for event in events {
        while let Some(snapshot) = pending_snapshots.peek() {
            if snapshot.relative_time < event.relative_time {
                replay_snapshot(writer, snapshot, config, start_epoch_secs);
                pending_snapshots.next();
            } else {
                break;
            }
        }

        stats.record(event.generation, event.duration_ms, event.relative_time);
        total_collected += event.collected;
        total_uncollectable += event.uncollectable;
        if let Some(flame) = flame.as_mut() {
            flame.record_sample(event.generation, event.duration_ms, event.relative_time);
        }

        if config.json {
            writer.event_line(&report::event_json(event, start_epoch_secs).to_string());
        } else {
            writer.event_line(&report::event_narrative(event));
            if event.duration_ms >= config.alert_threshold_ms {
                writer.event_line(&report::alert_narrative(event, config.alert_threshold_ms));
            }
        }
    }
    for snapshot in pending_snapshots {
        replay_snapshot(writer, snapshot, config, start_epoch_secs);
    }

    let summary = stats.summary();
    let recommendations = advice::recommendations(
        &stats,
        config.alert_threshold_ms,
        elapsed_secs,
        config.profile,
    );
    let blunders = advice::detect_blunders(&stats, total_uncollectable, elapsed_secs);

    if config.json {
        write_summary_json(
            writer,
            config,
            flame.as_ref(),
            &summary,
            &recommendations,
            &blunders,
            snapshots.last(),
            elapsed_secs,
            total_collected,
            total_uncollectable,
        );
    } else {
        write_summary_narrative(
            writer,
            config,
            flame.as_ref(),
            &summary,
            &recommendations,
            &blunders,
            snapshots.last(),
        );
    }

    DrainOutcome { summary, recommendations, blunders }
}

fn replay_snapshot(
    writer: &mut ReportWriter,
    snapshot: &SnapshotRecord,
    config: &SessionConfig,
    start_epoch_secs: f64,
) {
    if config.json {
        writer.event_line(&report::snapshot_json(snapshot, start_epoch_secs).to_string());
    } else {
        writer.event_line(&report::snapshot_narrative(snapshot));
    }
}

fn write_summary_narrative(
    writer: &mut ReportWriter,
    config: &SessionConfig,
    flame: Option<&FlameGraph>,
    summary: &StatsSummary,
    recommendations: &[String],
    blunders: &[Blunder],
    last_snapshot: Option<&SnapshotRecord>,
) {
    writer.summary_line("");
    writer.summary_line("=== GC MONITORING SUMMARY ===");
    writer.summary_line(&format!("Total GC collections: {}", summary.total_collections));
    if summary.total_collections > 0 {
        writer.summary_line(&format!(
            "Total GC time: {}",
            format_duration(summary.total_duration_ms)
        ));
        writer.summary_line(&format!(
            "Average GC duration: {}",
            format_duration(summary.mean_duration_ms)
        ));
        writer.summary_line(&format!(
            "Maximum GC duration: {}",
            format_duration(summary.max_duration_ms)
        ));
    }

    writer.summary_line("");
    writer.summary_line("Collections by generation:");
    for (generation, count) in &summary.by_generation {
        writer.summary_line(&format!("  Generation {generation}: {count} collections"));
    }

    if let Some(snapshot) = last_snapshot {
        writer.summary_line("");
        writer.summary_line(&report::snapshot_narrative(snapshot));
    }

    if !recommendations.is_empty() {
        writer.summary_line("");
        writer.summary_line("=== GC RECOMMENDATIONS ===");
        for rec in recommendations {
            writer.summary_line(&format!("- {rec}"));
        }
    }

    if let Some(flame) = flame {
        if let Some(path) = config.flamegraph_file.as_deref() {
            match flame.write_folded_file(path) {
                Ok(()) => writer.summary_line(&format!(
                    "GC flame graph data written to {}",
                    path.display()
                )),
                Err(e) => {
                    writer.summary_line(&format!("Failed to write flame graph data: {e}"));
                }
            }
        }
        if config.terminal_flamegraph {
            if flame.is_empty() {
                writer.summary_line("No GC flame graph samples collected.");
            } else {
                writer.summary_line("");
                writer.summary_line("=== GC FLAME GRAPH (ASCII) ===");
                for line in flame.render_terminal(config.terminal_width, config.color) {
                    writer.colored_pair(&line.plain, line.colored.as_deref());
                }
            }
        }
    }

    if !blunders.is_empty() {
        writer.summary_line("");
        writer.summary_line("=== GC BLUNDERS DETECTED ===");
        for blunder in blunders {
            writer.summary_line(&format!(
                "[{}] {}",
                blunder.severity.to_string().to_uppercase(),
                blunder.kind.title()
            ));
            writer.summary_line(&format!("  Metric: {}", blunder.metric));
            writer.summary_line(&format!("  Impact: {}", blunder.impact));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn write_summary_json(
    writer: &mut ReportWriter,
    config: &SessionConfig,
    flame: Option<&FlameGraph>,
    summary: &StatsSummary,
    recommendations: &[String],
    blunders: &[Blunder],
    last_snapshot: Option<&SnapshotRecord>,
    elapsed_secs: f64,
    total_collected: u64,
    total_uncollectable: u64,
) {
    let mut by_generation = serde_json::Map::new();
    for (generation, count) in &summary.by_generation {
        by_generation.insert(generation.to_string(), json!(count));
    }

    let mut doc = json!({
        "type": "summary",
        "elapsed_secs": elapsed_secs,
        "total_collections": summary.total_collections,
        "total_gc_time_ms": summary.total_duration_ms,
        "average_duration_ms": summary.mean_duration_ms,
        "max_duration_ms": summary.max_duration_ms,
        "collections_by_generation": by_generation,
        "total_collected": total_collected,
        "total_uncollectable": total_uncollectable,
        "recommendations": recommendations,
        "blunders": blunders,
    });

    if let Some(snapshot) = last_snapshot {
        doc["final_pending"] = json!({
            "gen0": snapshot.pending[0],
            "gen1": snapshot.pending[1],
            "gen2": snapshot.pending[2],
        });
        if let Some(total) = snapshot.total_objects {
            doc["total_objects"] = json!(total);
        }
    }

    if let Some(flame) = flame {
        if let Some(path) = config.flamegraph_file.as_deref() {
            match flame.write_folded_file(path) {
                Ok(()) => doc["flamegraph_file"] = json!(path.display().to_string()),
                Err(e) => {
                    doc["flamegraph_error"] =
                        json!(format!("Failed to write flame graph data: {e}"));
                }
            }
        }
    }

    writer.summary_line(&doc.to_string());
}
