//! Supervised execution of the target process.
//!
//! Owns everything between "the user typed `gcscope run app`" and "the
//! summary reached stderr": locating the target, wiring the hook pipe,
//! spawning the child with the write end advertised in its environment,
//! pumping signal lines into the [`CallbackHub`] from a dedicated
//! thread, forwarding SIGINT/SIGTERM, and mapping however the child
//! terminated onto a shell exit code.
//!
//! Ordering invariants:
//! - the monitor registers on the hub before the ingest pump starts, so
//!   no hook signal can be dispatched into an empty registry;
//! - the supervisor's copy of the pipe write end is dropped right after
//!   spawn, so pipe EOF tracks the child closing its end;
//! - the drain runs after the child has exited and the pump has been
//!   given a bounded grace window, never concurrently with ingestion.

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use gcscope_wire::{DUMP_GARBAGE_ENV, DUMP_OBJECTS_ENV, HOOK_FD_ENV, SNAPSHOT_SECS_ENV};
use log::{debug, warn};
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::timeout;

use crate::config::SessionConfig;
use crate::domain::SuperviseError;
use crate::drain::DrainOutcome;
use crate::hooks::{CallbackHub, HookRegistry};
use crate::ingest;
use crate::recorder::GcMonitor;

/// How long a forwarded signal gives the child before SIGKILL.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How long to wait for the ingest thread to see pipe EOF after the
/// child has exited. A leaked write end (inherited by a grandchild that
/// outlives the target) must not be able to hold the summary hostage.
const INGEST_GRACE: Duration = Duration::from_secs(2);

// =============================================================================
// CHILD LIFECYCLE
// =============================================================================

/// Lifecycle of the supervised child. Transitions are logged so a
/// confusing exit can be reconstructed from `RUST_LOG=debug` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildState {
    NotStarted,
    Running,
    Signaled,
    Exited,
}

fn advance(state: &mut ChildState, next: ChildState, detail: &str) {
    debug!("child {:?} -> {next:?}: {detail}", *state);
    *state = next;
}

/// What a finished session hands back to the CLI layer.
#[derive(Debug)]
pub struct SupervisedRun {
    /// Code the tool should exit with.
    pub exit_code: i32,
    /// Aggregates from the drain pass. `None` only if the monitor was
    /// already stopped, which cannot happen on this path.
    pub outcome: Option<DrainOutcome>,
}

// =============================================================================
// TARGET RESOLUTION AND LAUNCH
// =============================================================================

/// Locate the target executable.
///
/// A target with a directory component is taken as given. A bare name
/// is tried in the working directory first and then searched on `PATH`,
/// so both `gcscope run ./worker.sh` and `gcscope run python3` work.
fn resolve_target(target: &Path) -> Result<PathBuf, SuperviseError> {
    if target.components().count() > 1 {
        if target.is_file() {
            return Ok(target.to_path_buf());
        }
    } else {
        if target.is_file() {
            return Ok(target.to_path_buf());
        }
        if let Some(path) = env::var_os("PATH") {
            for dir in env::split_paths(&path) {
                let candidate = dir.join(target);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
    }
    Err(SuperviseError::TargetNotFound(target.to_path_buf()))
}

/// Create the hook pipe.
///
/// The write end is left inheritable so the spawned child receives it
/// at the same descriptor number we advertise; the read end is marked
/// close-on-exec and stays with the supervisor.
fn create_hook_pipe() -> Result<(OwnedFd, OwnedFd), SuperviseError> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    // SAFETY: `fds` is a valid two-element buffer for the duration of the call.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc != 0 {
        return Err(SuperviseError::PipeSetup(std::io::Error::last_os_error()));
    }
    // SAFETY: pipe() just returned these descriptors and nothing else owns them.
    #[allow(unsafe_code)]
    let (read_end, write_end) =
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    // SAFETY: plain fcntl flag update on a descriptor we own.
    #[allow(unsafe_code)]
    let rc = unsafe {
        let flags = libc::fcntl(read_end.as_raw_fd(), libc::F_GETFD);
        if flags == -1 {
            -1
        } else {
            libc::fcntl(read_end.as_raw_fd(), libc::F_SETFD, flags | libc::FD_CLOEXEC)
        }
    };
    if rc == -1 {
        return Err(SuperviseError::PipeSetup(std::io::Error::last_os_error()));
    }
    Ok((read_end, write_end))
}

fn spawn_target(
    target: &Path,
    config: &SessionConfig,
    hook_fd: &OwnedFd,
) -> Result<Child, SuperviseError> {
    let mut command = Command::new(target);
    command
        .args(&config.target_args)
        .env(HOOK_FD_ENV, hook_fd.as_raw_fd().to_string())
        .env(SNAPSHOT_SECS_ENV, config.interval_secs.to_string())
        // A supervisor error after spawn must not leave the target running.
        .kill_on_drop(true);
    if config.dump_objects {
        command.env(DUMP_OBJECTS_ENV, "1");
    }
    if config.dump_garbage {
        command.env(DUMP_GARBAGE_ENV, "1");
    }
    command
        .spawn()
        .map_err(|error| SuperviseError::SpawnFailed { target: target.to_path_buf(), error })
}

// =============================================================================
// SIGNAL FORWARDING
// =============================================================================

/// Forward `signo` to the child, then wait out the grace window before
/// resorting to SIGKILL.
async fn shutdown_child(
    child: &mut Child,
    signo: i32,
    state: &mut ChildState,
) -> Result<ExitStatus, SuperviseError> {
    if let Some(pid) = child.id() {
        // SAFETY: plain kill(2) on the pid we spawned.
        #[allow(unsafe_code)]
        #[allow(clippy::cast_possible_wrap)]
        let rc = unsafe { libc::kill(pid as libc::pid_t, signo) };
        if rc == -1 {
            // The child may have exited in the meantime; the wait below
            // settles it either way.
            warn!(
                "could not forward signal {signo} to pid {pid}: {}",
                std::io::Error::last_os_error()
            );
        }
        advance(state, ChildState::Signaled, &format!("forwarded signal {signo}"));
    }
    match timeout(SHUTDOWN_GRACE, child.wait()).await {
        Ok(status) => Ok(status?),
        Err(_) => {
            warn!(
                "target ignored signal {signo} for {}s, killing it",
                SHUTDOWN_GRACE.as_secs()
            );
            if let Err(e) = child.start_kill() {
                // Already-exited race; the wait below settles it.
                debug!("kill after grace window: {e}");
            }
            Ok(child.wait().await?)
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signo)) => format!("signal {signo}"),
        (None, None) => "unknown status".to_string(),
    }
}

/// Shell convention: the child's own code, or `128 + signo` when it
/// died by signal.
fn exit_code_for_status(status: ExitStatus) -> i32 {
    status.code().unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

// =============================================================================
// SESSION DRIVER
// =============================================================================

/// Run the target under monitoring until it exits, then drain.
///
/// The summary is produced no matter how the child terminated. Errors
/// are only returned for failures before or around the child itself
/// (target missing, pipe setup, spawn, signal handler installation);
/// even then the monitor's [`Drop`] guarantees the drain runs.
pub async fn run(
    config: SessionConfig,
    hub: Arc<CallbackHub>,
) -> Result<SupervisedRun, SuperviseError> {
    let target = resolve_target(&config.target)?;
    let (read_end, write_end) = create_hook_pipe()?;

    let mut state = ChildState::NotStarted;
    let mut child = spawn_target(&target, &config, &write_end)?;
    // The child now holds the only other write end. Dropping ours makes
    // pipe EOF track the child (and anything it spawned) closing theirs.
    drop(write_end);
    advance(
        &mut state,
        ChildState::Running,
        &format!("{} (pid {:?})", target.display(), child.id()),
    );

    let registry: Arc<dyn HookRegistry> = hub.clone();
    let monitor = GcMonitor::install(config, registry);

    let (done_tx, done_rx) = bounded::<ingest::IngestStats>(1);
    let pump_hub = hub.clone();
    let reader = BufReader::new(File::from(read_end));
    let ingest_thread = thread::Builder::new()
        .name("gcscope-ingest".into())
        .spawn(move || {
            let stats = ingest::pump(reader, &pump_hub);
            let _ = done_tx.send(stats);
        })?;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let mut forwarded: Option<i32> = None;
    let status = tokio::select! {
        status = child.wait() => status?,
        _ = sigint.recv() => {
            forwarded = Some(libc::SIGINT);
            shutdown_child(&mut child, libc::SIGINT, &mut state).await?
        }
        _ = sigterm.recv() => {
            forwarded = Some(libc::SIGTERM);
            shutdown_child(&mut child, libc::SIGTERM, &mut state).await?
        }
    };
    advance(&mut state, ChildState::Exited, &describe_status(status));

    // When the parent was interrupted, report the interruption (130/143)
    // rather than whatever code the child managed to exit with.
    let exit_code = forwarded.map_or_else(|| exit_code_for_status(status), |signo| 128 + signo);

    match done_rx.recv_timeout(INGEST_GRACE) {
        Ok(stats) => {
            debug!("ingest finished: {} signals, {} malformed", stats.signals, stats.malformed);
            let _ = ingest_thread.join();
        }
        Err(_) => {
            warn!(
                "hook pipe still open {}s after target exit, draining without it",
                INGEST_GRACE.as_secs()
            );
        }
    }

    let outcome = monitor.stop();
    Ok(SupervisedRun { exit_code, outcome })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("target.sh");
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn config_for(path: &Path) -> SessionConfig {
        let mut config = SessionConfig::for_tests("/bin/true");
        config.target = path.to_path_buf();
        config
    }

    #[test]
    fn test_resolve_explicit_path() {
        let resolved = resolve_target(Path::new("/bin/sh")).unwrap();
        assert_eq!(resolved, PathBuf::from("/bin/sh"));
    }

    #[test]
    fn test_resolve_missing_path_is_distinct_error() {
        let err = resolve_target(Path::new("/no/such/binary")).unwrap_err();
        assert!(matches!(err, SuperviseError::TargetNotFound(_)));
    }

    #[test]
    fn test_resolve_bare_name_searches_path() {
        let resolved = resolve_target(Path::new("sh")).unwrap();
        assert!(resolved.ends_with("sh"), "unexpected resolution: {}", resolved.display());
        assert!(resolved.is_file());
    }

    #[test]
    fn test_exit_code_conventions() {
        // Raw wait statuses: exit code in bits 8..16, signal in the low bits.
        assert_eq!(exit_code_for_status(ExitStatus::from_raw(7 << 8)), 7);
        assert_eq!(exit_code_for_status(ExitStatus::from_raw(9)), 137);
        assert_eq!(exit_code_for_status(ExitStatus::from_raw(0)), 0);
    }

    #[tokio::test]
    async fn test_child_exit_code_passes_through() {
        let dir = TempDir::new().unwrap();
        let target = script(&dir, "#!/bin/sh\nexit 7\n");
        let hub = Arc::new(CallbackHub::new());

        let run = run(config_for(&target), hub).await.unwrap();
        assert_eq!(run.exit_code, 7);
        let outcome = run.outcome.unwrap();
        assert_eq!(outcome.summary.total_collections, 0);
    }

    #[tokio::test]
    async fn test_child_signal_death_maps_to_128_plus_signo() {
        let dir = TempDir::new().unwrap();
        let target = script(&dir, "#!/bin/sh\nkill -9 $$\n");
        let hub = Arc::new(CallbackHub::new());

        let run = run(config_for(&target), hub).await.unwrap();
        assert_eq!(run.exit_code, 137);
    }

    #[tokio::test]
    async fn test_hook_signals_reach_the_summary() {
        let dir = TempDir::new().unwrap();
        let target = script(
            &dir,
            concat!(
                "#!/bin/sh\n",
                "out=\"/proc/self/fd/$GCSCOPE_HOOK_FD\"\n",
                "printf '%s\\n' '{\"phase\":\"start\",\"generation\":0}' >> \"$out\"\n",
                "printf '%s\\n' '{\"phase\":\"stop\",\"generation\":0,\"collected\":12,\"uncollectable\":1}' >> \"$out\"\n",
                "printf '%s\\n' '{\"phase\":\"snapshot\",\"gen0\":400,\"gen1\":20,\"gen2\":3}' >> \"$out\"\n",
            ),
        );
        let hub = Arc::new(CallbackHub::new());

        let run = run(config_for(&target), hub).await.unwrap();
        assert_eq!(run.exit_code, 0);
        let outcome = run.outcome.unwrap();
        assert_eq!(outcome.summary.total_collections, 1);
    }

    #[tokio::test]
    async fn test_missing_target_fails_before_launch() {
        let hub = Arc::new(CallbackHub::new());
        let err = run(config_for(Path::new("/no/such/target")), hub).await.unwrap_err();
        assert!(matches!(err, SuperviseError::TargetNotFound(_)));
    }

    #[tokio::test]
    async fn test_monitor_deregisters_after_run() {
        let dir = TempDir::new().unwrap();
        let target = script(&dir, "#!/bin/sh\nexit 0\n");
        let hub = Arc::new(CallbackHub::new());

        run(config_for(&target), hub.clone()).await.unwrap();
        assert_eq!(hub.observer_count(), 0);
    }
}
