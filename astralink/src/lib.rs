//! Astralink - links detected objects across frames with the external
//! Trackastra tool.
//!
//! The pipeline for one invocation:
//! - paint the spots into a label image and export it, frame by frame, next to
//!   the source image channel
//! - build the Trackastra command line from a checked [`TrackastraConfig`]
//! - run the tool, forwarding its log while it works
//! - read its edge table back into a [`LinkGraph`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use astralink::{Calibration, TrackastraConfig, TrackastraTracker};
//!
//! let mut config = TrackastraConfig::new(1);
//! config.conda_root = Some("/opt/conda".into());
//!
//! let mut tracker = TrackastraTracker::new(config, &spots, &source, Calibration::default());
//! let graph = tracker.process()?;
//! println!("{} links", graph.edge_count());
//! ```

pub mod command;
pub mod config;
pub mod export;
pub mod factory;
pub mod graph;
pub mod import;
pub mod labels;
pub mod logger;
pub mod raster;
pub mod runner;
pub mod settings;
pub mod spot;
pub mod tailer;
pub mod tiff_io;
pub mod tracker;

// ============================================================================
// Data model
// ============================================================================

pub use graph::LinkGraph;
pub use raster::{Calibration, Dimensions, LabelStack, SourceStack, Stack};
pub use spot::{Spot, SpotCollection, SpotId};

// ============================================================================
// Configuration
// ============================================================================

pub use command::{build_command, render_command, Platform};
pub use config::{
    ConfigError, Device, LauncherKind, ModelSource, PretrainedModel, TrackastraConfig, TrackingMode,
};
pub use settings::{SettingValue, SettingsMap};

// ============================================================================
// Pipeline
// ============================================================================

pub use export::{ExportError, ExportedStacks, StackExporter};
pub use import::{import_edges, FrameLabelIndex, ImportError, ImportReport};
pub use logger::{Logger, TracingLogger, VoidLogger};
pub use runner::{CancelHandle, ProcessRunner, RunError, RunOutcome};
pub use tracker::{TrackastraTracker, TrackerError};
pub use factory::TrackastraTrackerFactory;
