// SPDX-License-Identifier: GPL-3.0-only

//! Frame snapshot types
//!
//! Frames are immutable once captured; payloads are `Arc`-backed so a
//! frame can be handed from the capture thread to the consumer without
//! copying pixel data. Dimensions are recorded at arrival time because
//! the device may renegotiate the stream shape between frames.

use std::sync::Arc;

/// One 16-bit depth frame
#[derive(Debug, Clone)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    data: Arc<[u16]>,
}

impl DepthFrame {
    /// Wrap raw depth samples; `data.len()` must equal `width * height`.
    pub fn new(width: u32, height: u32, data: Vec<u16>) -> Self {
        assert_eq!(
            data.len(),
            (width * height) as usize,
            "depth frame payload does not match dimensions"
        );
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    /// Sample at pixel (x, y), or `None` when out of bounds
    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(y * self.width + x) as usize])
    }
}

/// One 8-bit video frame (color: 3 channels, infrared: 1 channel)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    channels: u32,
    data: Arc<[u8]>,
}

impl VideoFrame {
    /// Wrap raw samples; `data.len()` must equal `width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * channels) as usize,
            "video frame payload does not match dimensions"
        );
        Self {
            width,
            height,
            channels,
            data: data.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// One synchronized batch of frames delivered by the hardware pipeline
///
/// Streams the device did not bind are `None`.
#[derive(Debug, Clone, Default)]
pub struct Frameset {
    pub depth: Option<DepthFrame>,
    pub color: Option<VideoFrame>,
    pub infrared: Option<VideoFrame>,
}
