// SPDX-License-Identifier: GPL-3.0-only

//! Stream configuration types
//!
//! A `StreamSet` describes which logical streams (depth, color, infrared)
//! a device should bind at the next `start()`. Stream shapes are not
//! hot-reconfigurable; changing them on a running device takes effect
//! after a restart.

use serde::{Deserialize, Serialize};

/// Default stream width in pixels
pub const DEFAULT_WIDTH: u32 = 640;
/// Default stream height in pixels
pub const DEFAULT_HEIGHT: u32 = 360;
/// Default stream frame rate
pub const DEFAULT_FPS: u32 = 30;

/// Logical stream identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Depth,
    Color,
    Infrared,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Depth => write!(f, "depth"),
            StreamKind::Color => write!(f, "color"),
            StreamKind::Infrared => write!(f, "infrared"),
        }
    }
}

/// Pixel sample layout for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 16-bit depth samples
    Z16,
    /// 8-bit RGB, 3 channels
    Rgb8,
    /// 8-bit luminance, 1 channel
    Y8,
}

impl PixelFormat {
    /// Bytes per pixel for this format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Z16 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Y8 => 1,
        }
    }
}

/// Shape of one enabled stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
}

impl StreamConfig {
    pub fn depth(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            format: PixelFormat::Z16,
        }
    }

    pub fn color(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            format: PixelFormat::Rgb8,
        }
    }

    pub fn infrared(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            format: PixelFormat::Y8,
        }
    }
}

impl std::fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} @ {}fps", self.width, self.height, self.fps)
    }
}

/// The set of streams a device binds at `start()`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSet {
    pub depth: Option<StreamConfig>,
    pub color: Option<StreamConfig>,
    pub infrared: Option<StreamConfig>,
}

impl StreamSet {
    /// True when no stream is enabled
    pub fn is_empty(&self) -> bool {
        self.depth.is_none() && self.color.is_none() && self.infrared.is_none()
    }

    pub fn get(&self, kind: StreamKind) -> Option<StreamConfig> {
        match kind {
            StreamKind::Depth => self.depth,
            StreamKind::Color => self.color,
            StreamKind::Infrared => self.infrared,
        }
    }
}

/// Frameset alignment applied before any per-stream processing
///
/// `Depth` and `Color` reproject the whole frameset into that stream's
/// viewport. Default is `None` (no reprojection).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignMode {
    #[default]
    None,
    Depth,
    Color,
}

impl AlignMode {
    /// Integer code used by the parameter bus (0 = none, 1 = depth, 2 = color)
    pub fn code(&self) -> u8 {
        match self {
            AlignMode::None => 0,
            AlignMode::Depth => 1,
            AlignMode::Color => 2,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => AlignMode::Depth,
            2 => AlignMode::Color,
            _ => AlignMode::None,
        }
    }
}

impl std::fmt::Display for AlignMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignMode::None => write!(f, "none"),
            AlignMode::Depth => write!(f, "depth"),
            AlignMode::Color => write!(f, "color"),
        }
    }
}
