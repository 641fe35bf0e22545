//! astralink CLI - links objects of a label movie with Trackastra.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use astralink::labels::spots_from_labels;
use astralink::tiff_io::{read_label_stack, read_source_stack};
use astralink::{
    Calibration, Device, LauncherKind, LinkGraph, SourceStack, SpotCollection, TrackastraConfig,
    TrackastraTracker, TrackingMode, TracingLogger,
};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "astralink")]
#[command(about = "Link segmented objects across frames with an external Trackastra installation")]
#[command(version)]
struct Cli {
    /// Folder of per-frame label TIFFs, sorted by file name.
    #[arg(long)]
    labels: PathBuf,

    /// Folder of per-frame source TIFFs. The label images are used when absent.
    #[arg(long)]
    images: Option<PathBuf>,

    /// Tracker configuration (YAML or JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the linked edges (CSV).
    #[arg(long)]
    output: PathBuf,

    /// Run this trackastra executable instead of the configured launcher.
    #[arg(long)]
    executable: Option<PathBuf>,

    /// Conda installation holding the trackastra environment.
    #[arg(long)]
    conda_root: Option<PathBuf>,

    #[arg(long)]
    conda_env: Option<String>,

    /// greedy_nodiv, greedy or ilp.
    #[arg(long)]
    mode: Option<TrackingMode>,

    /// automatic, mps, cuda or cpu.
    #[arg(long)]
    device: Option<Device>,

    /// 1-based channel of the source image holding the objects.
    #[arg(long)]
    channel: Option<u32>,

    /// Physical pixel size, applied to x, y and z.
    #[arg(long, default_value = "1.0")]
    pixel_size: f64,

    /// Write the effective configuration to this file and continue.
    #[arg(long)]
    save_config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write logs to daily files in this folder.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn load_config(cli: &Cli, n_channels: u32) -> anyhow::Result<TrackastraConfig> {
    let mut config = match &cli.config {
        Some(path) => TrackastraConfig::load(path, n_channels)?,
        None => TrackastraConfig::new(n_channels),
    };

    if let Some(executable) = &cli.executable {
        config.launcher = LauncherKind::Executable;
        config.executable_path = Some(executable.clone());
    }
    if let Some(root) = &cli.conda_root {
        config.launcher = LauncherKind::Conda;
        config.conda_root = Some(root.clone());
    }
    if let Some(env) = &cli.conda_env {
        config.conda_env = env.clone();
    }
    if let Some(mode) = cli.mode {
        config.tracking_mode = mode;
    }
    if let Some(device) = cli.device {
        config.device = device;
    }
    if let Some(channel) = cli.channel {
        config.target_channel = channel;
    }
    Ok(config)
}

fn write_edges(path: &Path, graph: &LinkGraph, spots: &SpotCollection) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create '{}'", path.display()))?;
    writer.write_record([
        "source_id",
        "source_frame",
        "source_x",
        "source_y",
        "target_id",
        "target_frame",
        "target_x",
        "target_y",
        "weight",
    ])?;

    for (a, b, weight) in graph.edges() {
        let (Some(a), Some(b)) = (spots.get(a), spots.get(b)) else {
            continue;
        };
        let (source, target) = if a.frame <= b.frame { (a, b) } else { (b, a) };
        writer.write_record([
            source.id.to_string(),
            source.frame.to_string(),
            source.x.to_string(),
            source.y.to_string(),
            target.id.to_string(),
            target.frame.to_string(),
            target.x.to_string(),
            target.y.to_string(),
            weight.to_string(),
        ])?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write '{}'", path.display()))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let calibration = Calibration {
        pixel_width: cli.pixel_size,
        pixel_height: cli.pixel_size,
        pixel_depth: cli.pixel_size,
    };

    let labels = read_label_stack(&cli.labels)?;
    let spots = spots_from_labels(&labels, &calibration);
    tracing::info!(spots = spots.len(), frames = labels.dims().frames, "Loaded label image");

    let source = match &cli.images {
        Some(dir) => read_source_stack(dir)?,
        None => SourceStack::from(labels),
    };

    let config = load_config(&cli, source.channels() as u32)?;
    if let Some(path) = &cli.save_config {
        config.save(path)?;
    }

    let mut tracker = TrackastraTracker::new(config, &spots, &source, calibration)
        .with_logger(Arc::new(TracingLogger));
    let graph = tracker.process()?.clone();
    tracing::info!(
        links = graph.edge_count(),
        elapsed = ?tracker.processing_time(),
        "Tracking done"
    );

    write_edges(&cli.output, &graph, &spots)?;
    tracing::info!(path = %cli.output.display(), "Wrote edges");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = common::log_setup::setup_logging(&cli.log_level, cli.log_dir.as_deref()) {
        eprintln!("Failed to set up logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
