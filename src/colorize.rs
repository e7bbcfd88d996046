// SPDX-License-Identifier: GPL-3.0-only

//! Depth-to-RGB visualization
//!
//! Converts raw 16-bit depth frames into 8-bit RGB buffers for display.
//! Pixels outside the configured metric range are clamped; pixels with no
//! depth reading render black.

use crate::frame::{DepthFrame, VideoFrame};

/// Colorizer minimum-distance range in meters
pub const MIN_DISTANCE_RANGE: (f32, f32) = (0.0, 16.0);
/// Colorizer maximum-distance range in meters
pub const MAX_DISTANCE_RANGE: (f32, f32) = (0.0, 16.0);
/// Default minimum distance in meters
pub const DEFAULT_MIN_DISTANCE: f32 = 0.0;
/// Default maximum distance in meters
pub const DEFAULT_MAX_DISTANCE: f32 = 6.0;

/// Depth colorization settings, live-tunable through the parameter bus
#[derive(Debug, Clone, Copy)]
pub struct Colorizer {
    /// Depth mapped to the near end of the colormap, meters
    pub min_depth_m: f32,
    /// Depth mapped to the far end of the colormap, meters
    pub max_depth_m: f32,
}

impl Default for Colorizer {
    fn default() -> Self {
        Self {
            min_depth_m: DEFAULT_MIN_DISTANCE,
            max_depth_m: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl Colorizer {
    /// Colorize a raw depth frame into an RGB8 frame
    ///
    /// `depth_scale` converts raw sample units to meters.
    pub fn colorize(&self, frame: &DepthFrame, depth_scale: f32) -> VideoFrame {
        let pixel_count = (frame.width() * frame.height()) as usize;
        let mut rgb = Vec::with_capacity(pixel_count * 3);

        let range = (self.max_depth_m - self.min_depth_m).max(f32::EPSILON);

        for &d in frame.data() {
            if d == 0 {
                // No reading, render black
                rgb.extend_from_slice(&[0, 0, 0]);
            } else {
                let meters = d as f32 * depth_scale;
                let t = ((meters - self.min_depth_m) / range).clamp(0.0, 1.0);
                rgb.extend_from_slice(&turbo(t));
            }
        }

        VideoFrame::new(frame.width(), frame.height(), 3, rgb)
    }
}

/// Turbo colormap: perceptually uniform rainbow (blue=near, red=far)
///
/// Based on the Google Turbo colormap.
fn turbo(t: f32) -> [u8; 3] {
    let r = (0.13572138
        + t * (4.6153926 + t * (-42.66032 + t * (132.13108 + t * (-152.54825 + t * 59.28144)))))
        .clamp(0.0, 1.0);
    let g = (0.09140261
        + t * (2.19418 + t * (4.84296 + t * (-14.18503 + t * (4.27805 + t * 2.53377)))))
        .clamp(0.0, 1.0);
    let b = (0.1066733
        + t * (12.64194 + t * (-60.58204 + t * (109.99648 + t * (-82.52904 + t * 20.43388)))))
        .clamp(0.0, 1.0);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}
