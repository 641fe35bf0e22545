//! Runs the external tool as a child process, with both output streams
//! appended to one log file that a [`LogTailer`] forwards while it runs.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::string_ext::TailLines;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::logger::Logger;
use crate::tailer::LogTailer;

pub const DEFAULT_LOG_TAIL_LINES: usize = 40;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const EACCES: i32 = 13;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Could not open log file '{path}': {source}")]
    OpenLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Permission denied when running '{program}'. \
         Please check that the file is executable (chmod +x on Unix).\n{log_tail}"
    )]
    PermissionDenied { program: String, log_tail: String },

    #[error("Problem running '{program}': {source}\n{log_tail}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
        log_tail: String,
    },

    #[error("Lost track of the running process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    #[error("Process was cancelled.\n{log_tail}")]
    Cancelled { log_tail: String },
}

/// Shared flag that stops a running child process from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    /// Reported for logging only; the tool's exit code is not reliable.
    pub status: ExitStatus,
    pub elapsed: Duration,
}

/// Last `lines` lines of a log file, or an empty string when it cannot be read.
pub fn log_tail(path: &Path, lines: usize) -> String {
    std::fs::read_to_string(path)
        .map(|text| text.tail_lines(lines).to_string())
        .unwrap_or_default()
}

fn is_permission_denied(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::PermissionDenied || err.raw_os_error() == Some(EACCES)
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    tail_interval: Duration,
    tail_lines: usize,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            tail_interval: crate::tailer::DEFAULT_POLL_INTERVAL,
            tail_lines: DEFAULT_LOG_TAIL_LINES,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tail_interval(mut self, interval: Duration) -> Self {
        self.tail_interval = interval;
        self
    }

    /// Starts `command`, waits for it to exit and returns its status.
    ///
    /// There is no timeout; only `cancel` ends a process that never exits.
    pub fn run(
        &self,
        command: &[String],
        log_file: &Path,
        logger: Arc<dyn Logger>,
        cancel: &CancelHandle,
    ) -> Result<RunOutcome, RunError> {
        let (program, args) = command.split_first().ok_or(RunError::EmptyCommand)?;

        let open_log = |source| RunError::OpenLog {
            path: log_file.to_path_buf(),
            source,
        };
        let stdout: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(open_log)?;
        let stderr = stdout.try_clone().map_err(open_log)?;

        let mut tailer = LogTailer::start_with_interval(log_file, logger, self.tail_interval);
        let start = Instant::now();

        debug!(program = %program, args = ?args, log = %log_file.display(), "Spawning process");
        let spawned = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                tailer.stop();
                let log_tail = log_tail(log_file, self.tail_lines);
                return Err(if is_permission_denied(&source) {
                    RunError::PermissionDenied {
                        program: program.clone(),
                        log_tail,
                    }
                } else {
                    RunError::Launch {
                        program: program.clone(),
                        source,
                        log_tail,
                    }
                });
            }
        };

        let status = loop {
            if cancel.is_cancelled() {
                info!(pid = child.id(), "Cancelling process");
                kill_and_reap(&mut child);
                tailer.stop();
                return Err(RunError::Cancelled {
                    log_tail: log_tail(log_file, self.tail_lines),
                });
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(WAIT_POLL_INTERVAL),
                Err(source) => {
                    kill_and_reap(&mut child);
                    tailer.stop();
                    return Err(RunError::Wait { source });
                }
            }
        };

        tailer.stop();
        let elapsed = start.elapsed();
        info!(%status, ?elapsed, "Process exited");
        Ok(RunOutcome { status, elapsed })
    }
}

/// Kills `child` and waits for it so no zombie is left behind.
fn kill_and_reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(pid = child.id(), %err, "Kill failed");
    }
    if let Err(err) = child.wait() {
        warn!(pid = child.id(), %err, "Failed to reap process");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use common::output_stream::OutputStream;
    use common::test_utils::{process_lock, write_script};

    use super::*;

    fn tokens(path: &Path) -> Vec<String> {
        vec![path.display().to_string()]
    }

    fn fast_runner() -> ProcessRunner {
        ProcessRunner::new().with_tail_interval(Duration::from_millis(10))
    }

    #[test]
    fn both_streams_land_in_the_log_and_reach_the_logger() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let body = "echo to-stdout\necho to-stderr >&2\nexit 3";
        let script = write_script(dir.path(), "tool.sh", body);
        let log = dir.path().join("log.txt");
        let stream = OutputStream::new();

        let outcome = fast_runner()
            .run(&tokens(&script), &log, Arc::new(stream.clone()), &CancelHandle::new())
            .unwrap();

        assert_eq!(outcome.status.code(), Some(3));
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("to-stdout") && text.contains("to-stderr"));
        assert!(stream.contains("to-stdout"));
        assert!(stream.contains("to-stderr"));
    }

    #[test]
    fn log_is_appended_not_replaced() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool.sh", "echo second");
        let log = dir.path().join("log.txt");
        std::fs::write(&log, "first\n").unwrap();

        fast_runner()
            .run(&tokens(&script), &log, Arc::new(OutputStream::new()), &CancelHandle::new())
            .unwrap();

        assert_eq!(std::fs::read_to_string(&log).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn missing_execute_bit_is_reported_as_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool.sh", "echo never");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = fast_runner()
            .run(
                &tokens(&script),
                &dir.path().join("log.txt"),
                Arc::new(OutputStream::new()),
                &CancelHandle::new(),
            )
            .unwrap_err();

        assert!(matches!(err, RunError::PermissionDenied { .. }));
        assert!(err.to_string().contains("chmod +x"));
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fast_runner()
            .run(
                &tokens(&dir.path().join("does-not-exist")),
                &dir.path().join("log.txt"),
                Arc::new(OutputStream::new()),
                &CancelHandle::new(),
            )
            .unwrap_err();

        match err {
            RunError::Launch { source, .. } => assert_eq!(source.kind(), ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancelling_kills_the_child() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool.sh", "echo started\nexec sleep 30");
        let cancel = CancelHandle::new();

        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let start = Instant::now();
        let err = fast_runner()
            .run(
                &tokens(&script),
                &dir.path().join("log.txt"),
                Arc::new(OutputStream::new()),
                &cancel,
            )
            .unwrap_err();
        canceller.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(10));
        match err {
            RunError::Cancelled { log_tail } => assert!(log_tail.contains("started")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_command_and_unwritable_log() {
        let dir = tempfile::tempdir().unwrap();
        let logger: Arc<dyn Logger> = Arc::new(OutputStream::new());
        let cancel = CancelHandle::new();

        assert!(matches!(
            fast_runner().run(&[], &dir.path().join("log.txt"), logger.clone(), &cancel),
            Err(RunError::EmptyCommand)
        ));
        assert!(matches!(
            fast_runner().run(
                &["true".to_string()],
                &dir.path().join("missing").join("log.txt"),
                logger,
                &cancel
            ),
            Err(RunError::OpenLog { .. })
        ));
    }

    #[test]
    fn tail_keeps_the_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log.txt");
        let text: String = (1..=50).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&log, text).unwrap();

        let tail = log_tail(&log, DEFAULT_LOG_TAIL_LINES);
        assert_eq!(tail.lines().count(), 40);
        assert!(tail.starts_with("line 11\n"));
        assert!(tail.ends_with("line 50"));
        assert_eq!(log_tail(&dir.path().join("none"), 5), "");
    }

    #[test]
    fn killed_child_is_reaped() {
        let _lock = process_lock();
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        kill_and_reap(&mut child);

        let status = child.try_wait().unwrap().expect("child already reaped");
        assert!(!status.success());
        // A second call on a reaped child is harmless.
        kill_and_reap(&mut child);
    }
}
