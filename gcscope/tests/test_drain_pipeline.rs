//! End-to-end pipeline tests: hub dispatch through recorder, drain and
//! report, asserted against the written text rather than internals.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use gcscope::advice::AppProfile;
use gcscope::config::SessionConfig;
use gcscope::domain::Generation;
use gcscope::flamegraph::DurationBuckets;
use gcscope::hooks::{CallbackHub, CycleInfo, CyclePhase, PendingCounts};
use gcscope::recorder::GcMonitor;
use gcscope::report::ReportWriter;

/// Cloneable in-memory sink; the writer takes one handle, assertions the
/// other.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn session_config() -> SessionConfig {
    SessionConfig {
        target: PathBuf::from("/bin/true"),
        target_args: vec![],
        interval_secs: 5.0,
        json: false,
        stats_only: false,
        dump_objects: false,
        dump_garbage: false,
        log_file: None,
        alert_threshold_ms: 50.0,
        flamegraph_file: None,
        flamegraph_bucket_secs: 5.0,
        duration_buckets: DurationBuckets::default(),
        terminal_flamegraph: false,
        terminal_width: 80,
        color: false,
        live_target: None,
        profile: AppProfile::Unknown,
    }
}

fn stop_info(generation: Generation, collected: u64) -> CycleInfo {
    CycleInfo { generation, collected, uncollectable: 0 }
}

#[test]
fn test_full_session_narrative_report() {
    let hub = Arc::new(CallbackHub::new());
    let monitor = GcMonitor::install(session_config(), hub.clone());

    // One slow gen-0 cycle (crosses the 50ms alert threshold) and one
    // instantaneous gen-2 stop.
    hub.dispatch_cycle(CyclePhase::Start, &CycleInfo::starting(Generation::Gen0));
    thread::sleep(Duration::from_millis(60));
    hub.dispatch_cycle(CyclePhase::Stop, &stop_info(Generation::Gen0, 12));
    hub.dispatch_cycle(CyclePhase::Stop, &stop_info(Generation::Gen2, 5));
    hub.dispatch_snapshot(&PendingCounts { pending: [421, 30, 6], total_objects: None });

    let buf = SharedBuf::default();
    let mut writer = ReportWriter::with_term(false, false, Box::new(buf.clone()));
    let outcome = monitor.shutdown(&mut writer).expect("first shutdown yields the outcome");

    assert_eq!(outcome.summary.total_collections, 2);
    let report = buf.contents();
    assert!(report.contains("=== GC MONITORING SUMMARY ==="), "summary missing: {report}");
    assert!(report.contains("Total GC collections: 2"));
    assert!(report.contains("Generation 0: 1 collections"));
    assert!(report.contains("Generation 2: 1 collections"));
    assert!(report.contains("GC SNAPSHOT | Pending: gen0=421 gen1=30 gen2=6"));
    assert_eq!(report.matches("GC ALERT").count(), 1, "only the slow cycle alerts");
}

#[test]
fn test_json_session_emits_parseable_lines() {
    let mut config = session_config();
    config.json = true;
    let hub = Arc::new(CallbackHub::new());
    let monitor = GcMonitor::install(config, hub.clone());

    hub.dispatch_cycle(CyclePhase::Stop, &stop_info(Generation::Gen0, 10));
    hub.dispatch_cycle(CyclePhase::Stop, &stop_info(Generation::Gen1, 3));
    hub.dispatch_snapshot(&PendingCounts { pending: [100, 10, 1], total_objects: Some(5000) });

    let buf = SharedBuf::default();
    let mut writer = ReportWriter::with_term(false, false, Box::new(buf.clone()));
    monitor.shutdown(&mut writer).expect("first shutdown yields the outcome");

    let report = buf.contents();
    let lines: Vec<&str> = report.lines().filter(|line| !line.is_empty()).collect();
    assert_eq!(lines.len(), 4, "two events, one snapshot, one summary: {report}");
    for line in &lines {
        serde_json::from_str::<serde_json::Value>(line).expect("every line is JSON");
    }

    let summary: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
    assert_eq!(summary["type"], "summary");
    assert_eq!(summary["total_collections"], 2);
    assert_eq!(summary["total_collected"], 13);
    assert_eq!(summary["collections_by_generation"]["0"], 1);
    assert_eq!(summary["final_pending"]["gen0"], 100);
    assert_eq!(summary["total_objects"], 5000);
}

#[test]
fn test_stats_only_suppresses_replay_lines() {
    let mut config = session_config();
    config.stats_only = true;
    let hub = Arc::new(CallbackHub::new());
    let monitor = GcMonitor::install(config, hub.clone());

    hub.dispatch_cycle(CyclePhase::Stop, &stop_info(Generation::Gen0, 7));

    let buf = SharedBuf::default();
    let mut writer = ReportWriter::with_term(true, false, Box::new(buf.clone()));
    monitor.shutdown(&mut writer).expect("first shutdown yields the outcome");

    let report = buf.contents();
    assert!(!report.contains("GC STOP"), "replay should be suppressed: {report}");
    assert!(report.contains("Total GC collections: 1"));
}

#[test]
fn test_log_file_receives_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("gc.log");

    let hub = Arc::new(CallbackHub::new());
    let monitor = GcMonitor::install(session_config(), hub.clone());
    hub.dispatch_cycle(CyclePhase::Stop, &stop_info(Generation::Gen0, 1));

    let buf = SharedBuf::default();
    let mut writer = ReportWriter::with_term(false, false, Box::new(buf.clone()));
    writer.open_log_file(&path).expect("log file opens");
    monitor.shutdown(&mut writer).expect("first shutdown yields the outcome");

    let logged = std::fs::read_to_string(&path).expect("read log file");
    assert!(!logged.is_empty());
    assert!(logged.contains("=== GC MONITORING SUMMARY ==="));
    assert!(logged.contains("GC STOP | Gen: 0"));
    // The terminal stream got the same report.
    assert!(buf.contents().contains("=== GC MONITORING SUMMARY ==="));
}

#[test]
fn test_empty_session_reports_zero_activity() {
    let hub = Arc::new(CallbackHub::new());
    let monitor = GcMonitor::install(session_config(), hub.clone());

    let buf = SharedBuf::default();
    let mut writer = ReportWriter::with_term(false, false, Box::new(buf.clone()));
    let outcome = monitor.shutdown(&mut writer).expect("first shutdown yields the outcome");

    assert_eq!(outcome.summary.total_collections, 0);
    assert!(outcome.recommendations.is_empty());
    assert!(outcome.blunders.is_empty());
    let report = buf.contents();
    assert!(report.contains("Total GC collections: 0"));
    assert!(!report.contains("=== GC RECOMMENDATIONS ==="));
    assert!(!report.contains("=== GC BLUNDERS DETECTED ==="));
}
