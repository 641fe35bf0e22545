//! User-facing progress channel of the host application.
//!
//! Diagnostics go through `tracing`; a [`Logger`] carries what the user of the
//! tracker should see (tool output, skipped rows, status text).

use common::output_stream::{OutputLevel, OutputStream};

pub trait Logger: Send + Sync {
    fn log(&self, message: &str);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);

    fn set_status(&self, _status: &str) {}

    /// Progress in `0.0..=1.0`.
    fn set_progress(&self, _progress: f64) {}
}

/// Forwards everything to `tracing` under the `astralink::host` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "astralink::host", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "astralink::host", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "astralink::host", "{message}");
    }

    fn set_status(&self, status: &str) {
        tracing::debug!(target: "astralink::host", status);
    }

    fn set_progress(&self, progress: f64) {
        tracing::trace!(target: "astralink::host", progress);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VoidLogger;

impl Logger for VoidLogger {
    fn log(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

impl Logger for OutputStream {
    fn log(&self, message: &str) {
        self.write(OutputLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.write(OutputLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.write(OutputLevel::Error, message);
    }
}
