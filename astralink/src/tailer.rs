//! Follows a growing log file from a background thread and forwards each new
//! line to a [`Logger`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::logger::Logger;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Splits raw log bytes into lines. `\n`, `\r\n` and bare `\r` (progress bar
/// redraws) all end a line; blank lines are dropped.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8], mut emit: impl FnMut(&str)) {
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                self.flush(&mut emit);
            } else {
                self.pending.push(byte);
            }
        }
    }

    fn flush(&mut self, mut emit: impl FnMut(&str)) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending);
        let line = line.trim_end();
        if !line.is_empty() {
            emit(line);
        }
        self.pending.clear();
    }
}

struct Follower {
    path: PathBuf,
    position: u64,
    splitter: LineSplitter,
    logger: Arc<dyn Logger>,
}

impl Follower {
    fn poll(&mut self) {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) => {
                debug!(path = %self.path.display(), %err, "Log file not readable yet");
                return;
            }
        };

        let len = file.metadata().map(|m| m.len()).unwrap_or(self.position);
        if len < self.position {
            // Truncated underneath us; start over.
            self.position = 0;
        }
        if len == self.position {
            return;
        }

        let mut bytes = Vec::with_capacity((len - self.position) as usize);
        let read = file
            .seek(SeekFrom::Start(self.position))
            .and_then(|_| file.read_to_end(&mut bytes));
        match read {
            Ok(count) => {
                self.position += count as u64;
                let logger = &self.logger;
                self.splitter.push(&bytes, |line| logger.log(line));
            }
            Err(err) => warn!(path = %self.path.display(), %err, "Failed to read log file"),
        }
    }

    fn finish(&mut self) {
        self.poll();
        let logger = &self.logger;
        self.splitter.flush(|line| logger.log(line));
    }
}

/// Background reader of a log file. Starts at the current end of the file so
/// earlier content is not repeated. Stopping, explicitly or on drop, reads the
/// file one last time so no trailing output is lost.
#[derive(Debug)]
pub struct LogTailer {
    stop_tx: Option<mpsc::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl LogTailer {
    pub fn start(path: &Path, logger: Arc<dyn Logger>) -> Self {
        Self::start_with_interval(path, logger, DEFAULT_POLL_INTERVAL)
    }

    pub fn start_with_interval(path: &Path, logger: Arc<dyn Logger>, interval: Duration) -> Self {
        let position = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let mut follower = Follower {
            path: path.to_path_buf(),
            position,
            splitter: LineSplitter::default(),
            logger,
        };
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_handle = thread::spawn(move || loop {
            follower.poll();
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    follower.finish();
                    break;
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            thread_handle: Some(thread_handle),
        }
    }

    /// Forwards what is left in the file and waits for the thread to exit.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Log tailer thread panicked");
            }
        }
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use common::output_stream::OutputStream;

    use super::*;

    fn texts(stream: &OutputStream) -> Vec<String> {
        stream.lines().into_iter().map(|line| line.text).collect()
    }

    #[test]
    fn splitter_handles_every_line_ending() {
        let mut splitter = LineSplitter::default();
        let mut lines = Vec::new();
        splitter.push(b"epoch 1\r\nprogress 10%\rprogress 50", |l| lines.push(l.to_string()));
        splitter.push(b"%\r\n\nlast", |l| lines.push(l.to_string()));
        assert_eq!(lines, ["epoch 1", "progress 10%", "progress 50%"]);

        splitter.flush(|l| lines.push(l.to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("last"));
    }

    #[test]
    fn only_new_lines_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "from an earlier run\n").unwrap();

        let stream = OutputStream::new();
        let mut tailer = LogTailer::start_with_interval(
            &path,
            Arc::new(stream.clone()),
            Duration::from_millis(10),
        );

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "loading model").unwrap();
        file.flush().unwrap();
        thread::sleep(Duration::from_millis(100));
        write!(file, "linking frame 2 without newline").unwrap();
        file.flush().unwrap();
        tailer.stop();

        assert_eq!(texts(&stream), ["loading model", "linking frame 2 without newline"]);
    }

    #[test]
    fn dropping_drains_pending_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "").unwrap();

        let stream = OutputStream::new();
        {
            let _tailer = LogTailer::start(&path, Arc::new(stream.clone()));
            std::fs::write(&path, "done\n").unwrap();
        }

        assert_eq!(texts(&stream), ["done"]);
    }
}
