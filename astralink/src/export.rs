//! Writes the label image and the source image as per-frame TIFF files into
//! two fresh temporary folders the external tracker reads from.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::logger::Logger;
use crate::raster::{Dimensions, LabelStack, SourceStack, Stack};
use crate::tiff_io::{self, TiffIoError, TiffSample};

pub const MASKS_DIR_PREFIX: &str = "astralink-masks_";
pub const IMAGES_DIR_PREFIX: &str = "astralink-imgs_";

const MASK_INFIX: &str = "-mask-t";
const IMAGE_INFIX: &str = "-img-t";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Could not create temp folder to save {what}: {source}")]
    CreateTempDir {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Problem saving {what} to '{dir}': {source}")]
    WriteFrame {
        what: &'static str,
        dir: PathBuf,
        #[source]
        source: TiffIoError,
    },

    #[error("Channel {channel} does not exist; the source image has {channels} channel(s)")]
    ChannelOutOfRange { channel: u32, channels: usize },

    #[error("Label image {labels:?} and source image {source_dims:?} differ in size")]
    DimensionMismatch {
        labels: Dimensions,
        source_dims: Dimensions,
    },
}

/// The two exported folders. Dropping this value deletes both folders and
/// everything written into them afterwards (log, result table).
#[derive(Debug)]
pub struct ExportedStacks {
    masks: TempDir,
    images: TempDir,
    frames: usize,
}

impl ExportedStacks {
    pub fn mask_dir(&self) -> &Path {
        self.masks.path()
    }

    pub fn image_dir(&self) -> &Path {
        self.images.path()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

#[derive(Debug, Clone)]
pub struct StackExporter {
    title: String,
    temp_root: Option<PathBuf>,
}

impl Default for StackExporter {
    fn default() -> Self {
        Self {
            title: "stack".to_string(),
            temp_root: None,
        }
    }
}

impl StackExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name prefix of the written files.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Creates the temp folders under `root` instead of the system temp folder.
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    /// File name of frame `frame` (0-based) for the given role infix; files are numbered from 1.
    pub fn frame_file_name(&self, infix: &str, frame: usize) -> String {
        format!("{}{}{:04}.tif", self.title, infix, frame + 1)
    }

    fn create_dir(&self, prefix: &str, what: &'static str) -> Result<TempDir, ExportError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| ExportError::CreateTempDir { what, source })
    }

    fn write_frames<T: TiffSample>(
        &self,
        stack: &Stack<T>,
        dir: &Path,
        infix: &str,
        what: &'static str,
    ) -> Result<(), ExportError> {
        for frame in 0..stack.dims().frames {
            let path = dir.join(self.frame_file_name(infix, frame));
            tiff_io::write_frame(&path, stack, frame).map_err(|source| ExportError::WriteFrame {
                what,
                dir: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Exports `labels` and one channel of `source` (1-based `target_channel`,
    /// ignored for single-channel sources).
    pub fn export(
        &self,
        labels: &LabelStack,
        source: &SourceStack,
        target_channel: u32,
        logger: &dyn Logger,
    ) -> Result<ExportedStacks, ExportError> {
        if labels.dims() != source.dims() {
            return Err(ExportError::DimensionMismatch {
                labels: labels.dims(),
                source_dims: source.dims(),
            });
        }

        let channel = if source.channels() == 1 {
            None
        } else {
            let extracted = source.extract_channel(target_channel as usize).ok_or(
                ExportError::ChannelOutOfRange {
                    channel: target_channel,
                    channels: source.channels(),
                },
            )?;
            Some(extracted)
        };

        let masks = self.create_dir(MASKS_DIR_PREFIX, "masks")?;
        logger.set_status("Saving masks");
        logger.log(&format!("Saving masks to {}", masks.path().display()));
        self.write_frames(labels, masks.path(), MASK_INFIX, "masks")?;

        let images = self.create_dir(IMAGES_DIR_PREFIX, "input image")?;
        logger.set_status("Saving source image");
        match &channel {
            Some(_) => logger.log(&format!(
                "Saving channel {target_channel} of the source image to {}",
                images.path().display()
            )),
            None => logger.log(&format!("Saving source image to {}", images.path().display())),
        }
        let image = channel.as_ref().unwrap_or(source);
        match image {
            SourceStack::U8(stack) => {
                self.write_frames(stack, images.path(), IMAGE_INFIX, "input image")?
            }
            SourceStack::U16(stack) => {
                self.write_frames(stack, images.path(), IMAGE_INFIX, "input image")?
            }
            SourceStack::F32(stack) => {
                self.write_frames(stack, images.path(), IMAGE_INFIX, "input image")?
            }
        }

        debug!(
            masks = %masks.path().display(),
            images = %images.path().display(),
            frames = labels.dims().frames,
            "Exported stacks"
        );

        Ok(ExportedStacks {
            masks,
            images,
            frames: labels.dims().frames,
        })
    }
}
