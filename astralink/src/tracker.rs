//! One full Trackastra pass: export the spots as a label image, run the tool,
//! read its edge table back as a graph.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::ScopeRef;
use thiserror::Error;
use tracing::{error, info};

use crate::command::{build_command, render_command, Platform};
use crate::config::{ConfigError, TrackastraConfig};
use crate::export::{ExportError, StackExporter};
use crate::graph::LinkGraph;
use crate::import::{import_edges, FrameLabelIndex, ImportError, ImportReport};
use crate::labels::{paint_labels, LabelError};
use crate::logger::{Logger, TracingLogger};
use crate::raster::{Calibration, SourceStack};
use crate::runner::{log_tail, CancelHandle, ProcessRunner, RunError, DEFAULT_LOG_TAIL_LINES};
use crate::spot::SpotCollection;

pub const EDGE_TABLE_FILE_NAME: &str = "trackastra-edge-table.csv";
pub const LOG_FILE_NAME: &str = "trackastra-log.txt";
pub const ERROR_PREFIX: &str = "[Trackastra] ";

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("There are no spots to track")]
    EmptySpots,

    #[error("Could not create the label image: {0}")]
    Labels(#[from] LabelError),

    #[error("Configuration is not valid: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Export(#[from] ExportError),

    #[error("{0}")]
    Run(#[from] RunError),

    #[error(
        "Trackastra did not execute properly: no edge table was written to '{path}'.\n\
         Last lines of the log:\n{log_tail}"
    )]
    NoOutput { path: PathBuf, log_tail: String },

    #[error("Problem reading the Trackastra results: {0}")]
    Import(#[from] ImportError),
}

/// Links `spots` with Trackastra.
///
/// Each call to [`process`](Self::process) exports fresh inputs, runs the
/// tool once and replaces the previous result.
pub struct TrackastraTracker<'a> {
    config: TrackastraConfig,
    spots: &'a SpotCollection,
    source: &'a SourceStack,
    calibration: Calibration,
    logger: Arc<dyn Logger>,
    platform: Platform,
    runner: ProcessRunner,
    cancel: CancelHandle,
    title: String,

    graph: Option<LinkGraph>,
    report: Option<ImportReport>,
    error_message: Option<String>,
    processing_time: Duration,
}

impl<'a> TrackastraTracker<'a> {
    pub fn new(
        mut config: TrackastraConfig,
        spots: &'a SpotCollection,
        source: &'a SourceStack,
        calibration: Calibration,
    ) -> Self {
        config.n_channels = source.channels() as u32;
        Self {
            config,
            spots,
            source,
            calibration,
            logger: Arc::new(TracingLogger),
            platform: Platform::current(),
            runner: ProcessRunner::new(),
            cancel: CancelHandle::new(),
            title: "trackastra-input".to_string(),
            graph: None,
            report: None,
            error_message: None,
            processing_time: Duration::ZERO,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Name prefix of the exported frame files.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Handle that stops a running [`process`](Self::process) from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &TrackastraConfig {
        &self.config
    }

    pub fn process(&mut self) -> Result<&LinkGraph, TrackerError> {
        let start = Instant::now();
        self.graph = None;
        self.report = None;
        self.error_message = None;
        self.cancel.reset();

        let logger = self.logger.clone();
        let _done = ScopeRef::new(move || {
            logger.set_progress(1.0);
            logger.set_status("");
        });

        let result = self.run_pipeline();
        self.processing_time = start.elapsed();

        match result {
            Ok((graph, report)) => {
                info!(
                    edges = graph.edge_count(),
                    skipped = report.skipped_rows,
                    elapsed = ?self.processing_time,
                    "Trackastra linking done"
                );
                self.report = Some(report);
                Ok(self.graph.insert(graph))
            }
            Err(err) => {
                error!(?err, "Trackastra tracking failed");
                self.error_message = Some(format!("{ERROR_PREFIX}{err}"));
                Err(err)
            }
        }
    }

    fn run_pipeline(&self) -> Result<(LinkGraph, ImportReport), TrackerError> {
        let logger = self.logger.as_ref();
        if self.spots.is_empty() {
            return Err(TrackerError::EmptySpots);
        }
        self.config.check_user_settings()?;

        logger.set_status("Creating label image");
        logger.set_progress(0.0);
        let labels = paint_labels(self.spots, self.source.dims(), &self.calibration)?;

        let exporter = StackExporter::new()
            .with_title(self.title.as_str())
            .with_temp_root(self.config.temp_root.clone());
        let exported = exporter.export(&labels, self.source, self.config.target_channel, logger)?;
        logger.set_progress(0.2);

        let mut config = self.config.clone();
        let edge_table = exported.mask_dir().join(EDGE_TABLE_FILE_NAME);
        config.image_folder = Some(exported.image_dir().to_path_buf());
        config.mask_folder = Some(exported.mask_dir().to_path_buf());
        config.output_edge_table = Some(edge_table.clone());
        let command = build_command(&config, self.platform)?;

        let log_file = exported.mask_dir().join(LOG_FILE_NAME);
        logger.set_status("Running Trackastra");
        logger.log(&format!("Running Trackastra with: {}", render_command(&command)));
        logger.log(&format!("Trackastra output is logged to {}", log_file.display()));
        let outcome = self
            .runner
            .run(&command, &log_file, self.logger.clone(), &self.cancel)?;
        logger.log(&format!(
            "Trackastra finished ({}) in {:.1} s",
            outcome.status,
            outcome.elapsed.as_secs_f64()
        ));
        logger.set_progress(0.9);

        if !edge_table.exists() {
            return Err(TrackerError::NoOutput {
                path: edge_table,
                log_tail: log_tail(&log_file, DEFAULT_LOG_TAIL_LINES),
            });
        }

        logger.set_status("Importing links");
        let index = FrameLabelIndex::from_label_stack(self.spots, &labels, &self.calibration);
        let mut graph = LinkGraph::new();
        let report = import_edges(&edge_table, &index, &mut graph, logger)?;
        if report.skipped_rows > 0 {
            logger.log(&format!(
                "{} of {} rows did not match a spot and were skipped",
                report.skipped_rows, report.rows
            ));
        }
        logger.set_progress(1.0);

        Ok((graph, report))
    }

    pub fn result(&self) -> Option<&LinkGraph> {
        self.graph.as_ref()
    }

    pub fn import_report(&self) -> Option<&ImportReport> {
        self.report.as_ref()
    }

    /// Set when the last [`process`](Self::process) failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }
}
