//! Per-frame TIFF files: one file per time point, one page per z slice.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::{ColorType, TiffError, TiffResult};

use crate::raster::{Dimensions, LabelStack, SourceStack, Stack};

#[derive(Debug, Error)]
pub enum TiffIoError {
    #[error("Failed to create '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list '{path}': {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: TiffError,
    },

    #[error("Failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: TiffError,
    },

    #[error("Unsupported TIFF content in '{path}': {what}")]
    Unsupported { path: PathBuf, what: String },

    #[error("'{path}' does not match the first frame: {message}")]
    Inconsistent { path: PathBuf, message: String },

    #[error("No TIFF files found in '{0}'")]
    Empty(PathBuf),
}

pub type Result<T> = std::result::Result<T, TiffIoError>;

/// Sample types that can be written as single-channel TIFF pages.
pub trait TiffSample: Copy + Default {
    fn write_page<W: Write + Seek>(
        encoder: &mut TiffEncoder<W>,
        width: u32,
        height: u32,
        data: &[Self],
    ) -> TiffResult<()>;
}

impl TiffSample for u8 {
    fn write_page<W: Write + Seek>(
        encoder: &mut TiffEncoder<W>,
        width: u32,
        height: u32,
        data: &[Self],
    ) -> TiffResult<()> {
        encoder.write_image::<colortype::Gray8>(width, height, data)
    }
}

impl TiffSample for u16 {
    fn write_page<W: Write + Seek>(
        encoder: &mut TiffEncoder<W>,
        width: u32,
        height: u32,
        data: &[Self],
    ) -> TiffResult<()> {
        encoder.write_image::<colortype::Gray16>(width, height, data)
    }
}

impl TiffSample for f32 {
    fn write_page<W: Write + Seek>(
        encoder: &mut TiffEncoder<W>,
        width: u32,
        height: u32,
        data: &[Self],
    ) -> TiffResult<()> {
        encoder.write_image::<colortype::Gray32Float>(width, height, data)
    }
}

/// Writes channel 0 of one frame, all z slices, to an uncompressed TIFF.
pub fn write_frame<T: TiffSample>(path: &Path, stack: &Stack<T>, frame: usize) -> Result<()> {
    let dims = stack.dims();
    let file = File::create(path).map_err(|source| TiffIoError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let encode_err = |source| TiffIoError::Encode {
        path: path.to_path_buf(),
        source,
    };

    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(encode_err)?;
    for z in 0..dims.depth {
        T::write_page(
            &mut encoder,
            dims.width as u32,
            dims.height as u32,
            stack.plane(frame, 0, z),
        )
        .map_err(encode_err)?;
    }
    Ok(())
}

enum Pages {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl Pages {
    fn kind(&self) -> &'static str {
        match self {
            Pages::U8(_) => "8-bit",
            Pages::U16(_) => "16-bit",
            Pages::U32(_) => "32-bit integer",
            Pages::F32(_) => "32-bit float",
        }
    }

    fn append(&mut self, page: DecodingResult, path: &Path) -> Result<()> {
        match (self, page) {
            (Pages::U8(all), DecodingResult::U8(page)) => all.extend(page),
            (Pages::U16(all), DecodingResult::U16(page)) => all.extend(page),
            (Pages::U32(all), DecodingResult::U32(page)) => all.extend(page),
            (Pages::F32(all), DecodingResult::F32(page)) => all.extend(page),
            (pages, _) => {
                return Err(TiffIoError::Inconsistent {
                    path: path.to_path_buf(),
                    message: format!("sample type differs from {}", pages.kind()),
                })
            }
        }
        Ok(())
    }

    fn from_first(page: DecodingResult, path: &Path) -> Result<Self> {
        match page {
            DecodingResult::U8(page) => Ok(Pages::U8(page)),
            DecodingResult::U16(page) => Ok(Pages::U16(page)),
            DecodingResult::U32(page) => Ok(Pages::U32(page)),
            DecodingResult::F32(page) => Ok(Pages::F32(page)),
            _ => Err(TiffIoError::Unsupported {
                path: path.to_path_buf(),
                what: "sample type".to_string(),
            }),
        }
    }
}

/// Reads every page of one file, returning `(width, height, depth)`.
fn read_file(path: &Path, pages: &mut Option<Pages>) -> Result<(usize, usize, usize)> {
    let file = File::open(path).map_err(|source| TiffIoError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_err = |source| TiffIoError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = Decoder::new(BufReader::new(file)).map_err(decode_err)?;
    let (width, height) = decoder.dimensions().map_err(decode_err)?;
    let mut depth = 0;

    loop {
        match decoder.colortype().map_err(decode_err)? {
            ColorType::Gray(_) => {}
            other => {
                return Err(TiffIoError::Unsupported {
                    path: path.to_path_buf(),
                    what: format!("color type {other:?}"),
                })
            }
        }
        if decoder.dimensions().map_err(decode_err)? != (width, height) {
            return Err(TiffIoError::Inconsistent {
                path: path.to_path_buf(),
                message: "pages differ in size".to_string(),
            });
        }

        let page = decoder.read_image().map_err(decode_err)?;
        if let Some(all) = pages.as_mut() {
            all.append(page, path)?;
        } else {
            *pages = Some(Pages::from_first(page, path)?);
        }
        depth += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(decode_err)?;
    }

    Ok((width as usize, height as usize, depth))
}

fn read_pages(dir: &Path) -> Result<(Dimensions, Pages)> {
    let files = common::file_utils::tiff_files(dir).map_err(|source| TiffIoError::List {
        path: dir.to_path_buf(),
        source,
    })?;
    if files.is_empty() {
        return Err(TiffIoError::Empty(dir.to_path_buf()));
    }

    let mut pages = None;
    let mut first: Option<(usize, usize, usize)> = None;
    for path in &files {
        let shape = read_file(path, &mut pages)?;
        match first {
            Some(expected) if expected != shape => {
                return Err(TiffIoError::Inconsistent {
                    path: path.clone(),
                    message: format!("shape {shape:?} instead of {expected:?}"),
                })
            }
            Some(_) => {}
            None => first = Some(shape),
        }
    }

    let (width, height, depth) = first.unwrap_or_default();
    let dims = Dimensions::new(width, height, depth, files.len());
    let pages = pages.ok_or_else(|| TiffIoError::Empty(dir.to_path_buf()))?;
    Ok((dims, pages))
}

/// Loads a folder of per-frame TIFFs (sorted by name) as a single-channel stack.
pub fn read_source_stack(dir: &Path) -> Result<SourceStack> {
    let (dims, pages) = read_pages(dir)?;
    let unsupported = |what: &str| TiffIoError::Unsupported {
        path: dir.to_path_buf(),
        what: what.to_string(),
    };

    Ok(match pages {
        Pages::U8(data) => SourceStack::U8(
            Stack::from_vec(dims, 1, data).ok_or_else(|| unsupported("pixel count"))?,
        ),
        Pages::U16(data) => SourceStack::U16(
            Stack::from_vec(dims, 1, data).ok_or_else(|| unsupported("pixel count"))?,
        ),
        Pages::F32(data) => SourceStack::F32(
            Stack::from_vec(dims, 1, data).ok_or_else(|| unsupported("pixel count"))?,
        ),
        Pages::U32(_) => return Err(unsupported("32-bit integer source image")),
    })
}

/// Loads a folder of per-frame label TIFFs; 8, 16 and 32-bit integer labels are accepted.
pub fn read_label_stack(dir: &Path) -> Result<LabelStack> {
    let (dims, pages) = read_pages(dir)?;
    let unsupported = |what: &str| TiffIoError::Unsupported {
        path: dir.to_path_buf(),
        what: what.to_string(),
    };

    let data: Vec<u16> = match pages {
        Pages::U8(data) => data.into_iter().map(u16::from).collect(),
        Pages::U16(data) => data,
        Pages::U32(data) => data
            .into_iter()
            .map(u16::try_from)
            .collect::<std::result::Result<Vec<u16>, _>>()
            .map_err(|_| unsupported("label value above 65535"))?,
        Pages::F32(_) => return Err(unsupported("floating point label image")),
    };

    Stack::from_vec(dims, 1, data).ok_or_else(|| unsupported("pixel count"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_written_as_files_are_read_back_as_a_stack() {
        let dir = tempfile::tempdir().unwrap();
        let dims = Dimensions::new(5, 4, 2, 3);
        let mut stack: Stack<u16> = Stack::new(dims, 1);
        stack.set(1, 2, 1, 0, 2, 9);
        stack.set(4, 0, 0, 0, 0, 3);

        for frame in 0..dims.frames {
            let path = dir.path().join(format!("mask-t{:04}.tif", frame + 1));
            write_frame(&path, &stack, frame).unwrap();
        }

        let loaded = read_label_stack(dir.path()).unwrap();
        assert_eq!(loaded, stack);
    }

    #[test]
    fn float_sources_keep_their_sample_type() {
        let dir = tempfile::tempdir().unwrap();
        let dims = Dimensions::new(3, 3, 1, 1);
        let mut stack: Stack<f32> = Stack::new(dims, 1);
        stack.set(1, 1, 0, 0, 0, 0.5);
        write_frame(&dir.path().join("img-t0001.tif"), &stack, 0).unwrap();

        match read_source_stack(dir.path()).unwrap() {
            SourceStack::F32(loaded) => assert_eq!(loaded, stack),
            other => panic!("unexpected sample type: {other:?}"),
        }
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let small: Stack<u8> = Stack::new(Dimensions::new(2, 2, 1, 1), 1);
        let large: Stack<u8> = Stack::new(Dimensions::new(3, 2, 1, 1), 1);
        write_frame(&dir.path().join("a.tif"), &small, 0).unwrap();
        write_frame(&dir.path().join("b.tif"), &large, 0).unwrap();

        assert!(matches!(
            read_source_stack(dir.path()),
            Err(TiffIoError::Inconsistent { .. })
        ));
    }

    #[test]
    fn empty_folder_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_label_stack(dir.path()),
            Err(TiffIoError::Empty(_))
        ));
    }
}
