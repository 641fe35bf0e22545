//! Dense multi-frame rasters.
//!
//! Pixels are stored frame-major as `[frame][channel][z][y][x]`, so one
//! `(frame, channel, z)` plane is a contiguous `width * height` slice.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub frames: usize,
}

impl Dimensions {
    pub fn new(width: usize, height: usize, depth: usize, frames: usize) -> Self {
        Self {
            width,
            height,
            depth,
            frames,
        }
    }

    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_3d(&self) -> bool {
        self.depth > 1
    }
}

/// Physical size of one pixel along each axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub pixel_depth: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixel_width: 1.0,
            pixel_height: 1.0,
            pixel_depth: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stack<T> {
    dims: Dimensions,
    channels: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Stack<T> {
    pub fn new(dims: Dimensions, channels: usize) -> Self {
        let len = dims.plane_len() * dims.depth * dims.frames * channels;
        Self {
            dims,
            channels,
            data: vec![T::default(); len],
        }
    }

    /// Wraps existing pixels laid out `[frame][channel][z][y][x]`.
    pub fn from_vec(dims: Dimensions, channels: usize, data: Vec<T>) -> Option<Self> {
        let len = dims.plane_len() * dims.depth * dims.frames * channels;
        (data.len() == len).then_some(Self {
            dims,
            channels,
            data,
        })
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Index of the first pixel of a plane; `channel` is 0-based here.
    fn plane_offset(&self, frame: usize, channel: usize, z: usize) -> usize {
        debug_assert!(frame < self.dims.frames && channel < self.channels && z < self.dims.depth);
        ((frame * self.channels + channel) * self.dims.depth + z) * self.dims.plane_len()
    }

    pub fn plane(&self, frame: usize, channel: usize, z: usize) -> &[T] {
        let start = self.plane_offset(frame, channel, z);
        &self.data[start..start + self.dims.plane_len()]
    }

    pub fn plane_mut(&mut self, frame: usize, channel: usize, z: usize) -> &mut [T] {
        let start = self.plane_offset(frame, channel, z);
        let len = self.dims.plane_len();
        &mut self.data[start..start + len]
    }

    pub fn get(&self, x: usize, y: usize, z: usize, channel: usize, frame: usize) -> T {
        self.plane(frame, channel, z)[y * self.dims.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, channel: usize, frame: usize, value: T) {
        let width = self.dims.width;
        self.plane_mut(frame, channel, z)[y * width + x] = value;
    }

    /// Copies one channel (1-based, as users count them) into a single-channel stack.
    pub fn extract_channel(&self, channel: usize) -> Option<Stack<T>> {
        if channel == 0 || channel > self.channels {
            return None;
        }

        let mut out = Stack::new(self.dims, 1);
        for frame in 0..self.dims.frames {
            for z in 0..self.dims.depth {
                out.plane_mut(frame, 0, z)
                    .copy_from_slice(self.plane(frame, channel - 1, z));
            }
        }
        Some(out)
    }
}

/// Label image: one `u16` channel where each object of a frame has its own value.
pub type LabelStack = Stack<u16>;

/// Source image in one of the sample types microscopy files commonly use.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceStack {
    U8(Stack<u8>),
    U16(Stack<u16>),
    F32(Stack<f32>),
}

impl SourceStack {
    pub fn dims(&self) -> Dimensions {
        match self {
            SourceStack::U8(stack) => stack.dims(),
            SourceStack::U16(stack) => stack.dims(),
            SourceStack::F32(stack) => stack.dims(),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            SourceStack::U8(stack) => stack.channels(),
            SourceStack::U16(stack) => stack.channels(),
            SourceStack::F32(stack) => stack.channels(),
        }
    }

    pub fn extract_channel(&self, channel: usize) -> Option<SourceStack> {
        Some(match self {
            SourceStack::U8(stack) => SourceStack::U8(stack.extract_channel(channel)?),
            SourceStack::U16(stack) => SourceStack::U16(stack.extract_channel(channel)?),
            SourceStack::F32(stack) => SourceStack::F32(stack.extract_channel(channel)?),
        })
    }
}

impl From<LabelStack> for SourceStack {
    fn from(stack: LabelStack) -> Self {
        SourceStack::U16(stack)
    }
}
