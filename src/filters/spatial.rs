// SPDX-License-Identifier: GPL-3.0-only

//! Spatial edge-preserving smoothing
//!
//! Runs directional one-dimensional exponential moving averages over the
//! frame: left-to-right, right-to-left, top-to-bottom, bottom-to-top,
//! repeated `magnitude` times. A neighbor only participates when its
//! value is within `smooth_delta` of the current sample, which preserves
//! depth edges. An optional in-pass hole fill carries the last valid
//! value across short gaps.

use crate::frame::DepthFrame;

pub const MAGNITUDE_MIN: i64 = 1;
pub const MAGNITUDE_MAX: i64 = 5;
pub const MAGNITUDE_DEFAULT: i64 = 2;

pub const SMOOTH_ALPHA_MIN: f64 = 0.25;
pub const SMOOTH_ALPHA_MAX: f64 = 1.0;
pub const SMOOTH_ALPHA_DEFAULT: f64 = 0.5;

pub const SMOOTH_DELTA_MIN: i64 = 1;
pub const SMOOTH_DELTA_MAX: i64 = 50;
pub const SMOOTH_DELTA_DEFAULT: i64 = 20;

/// Hole fill mode: 0 disables, mode n fills gaps up to 2^(n-1) pixels
pub const HOLE_FILL_MIN: i64 = 0;
pub const HOLE_FILL_MAX: i64 = 5;
pub const HOLE_FILL_DEFAULT: i64 = 0;

#[derive(Debug, Clone)]
pub struct SpatialFilter {
    pub enabled: bool,
    /// Number of smoothing iterations
    pub magnitude: u32,
    /// EMA weight of the current sample
    pub smooth_alpha: f32,
    /// Edge threshold in depth units
    pub smooth_delta: u16,
    /// In-pass hole fill mode, 0 = off
    pub hole_fill_mode: u32,
}

impl Default for SpatialFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            magnitude: MAGNITUDE_DEFAULT as u32,
            smooth_alpha: SMOOTH_ALPHA_DEFAULT as f32,
            smooth_delta: SMOOTH_DELTA_DEFAULT as u16,
            hole_fill_mode: HOLE_FILL_DEFAULT as u32,
        }
    }
}

impl SpatialFilter {
    pub fn process(&self, frame: &DepthFrame) -> DepthFrame {
        let w = frame.width() as usize;
        let h = frame.height() as usize;
        let mut data = frame.data().to_vec();

        let iterations = self
            .magnitude
            .clamp(MAGNITUDE_MIN as u32, MAGNITUDE_MAX as u32);
        let fill_limit = match self.hole_fill_mode.min(HOLE_FILL_MAX as u32) {
            0 => 0usize,
            mode => 1usize << (mode - 1),
        };

        for _ in 0..iterations {
            for y in 0..h {
                self.pass(&mut data, y * w, 1, w, fill_limit);
                self.pass(&mut data, y * w + (w - 1), -1, w, fill_limit);
            }
            for x in 0..w {
                self.pass(&mut data, x, w as isize, h, fill_limit);
                self.pass(&mut data, (h - 1) * w + x, -(w as isize), h, fill_limit);
            }
        }

        DepthFrame::new(frame.width(), frame.height(), data)
    }

    /// One directional EMA pass over `len` samples starting at `start`,
    /// advancing by `stride` indices per step.
    fn pass(&self, data: &mut [u16], start: usize, stride: isize, len: usize, fill_limit: usize) {
        let alpha = self.smooth_alpha.clamp(SMOOTH_ALPHA_MIN as f32, SMOOTH_ALPHA_MAX as f32);
        let delta = self.smooth_delta as i32;

        let mut last: Option<(u16, usize)> = None; // (value, gap distance)
        let mut idx = start as isize;
        for _ in 0..len {
            let i = idx as usize;
            let cur = data[i];
            if cur != 0 {
                if let Some((prev, _)) = last {
                    if (cur as i32 - prev as i32).abs() <= delta {
                        let smoothed =
                            alpha * cur as f32 + (1.0 - alpha) * prev as f32;
                        data[i] = smoothed.round() as u16;
                    }
                }
                last = Some((data[i], 0));
            } else if let Some((prev, dist)) = last {
                if fill_limit > 0 && dist < fill_limit {
                    data[i] = prev;
                }
                last = Some((prev, dist + 1));
            }
            idx += stride;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SpatialFilter {
        SpatialFilter {
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn uniform_frame_is_unchanged() {
        let frame = DepthFrame::new(6, 6, vec![1000; 36]);
        let out = filter().process(&frame);
        assert!(out.data().iter().all(|&d| d == 1000));
    }

    #[test]
    fn smooths_small_variations() {
        let mut data = vec![1000u16; 36];
        data[14] = 1010; // within delta of its neighbors
        let frame = DepthFrame::new(6, 6, data);
        let out = filter().process(&frame);
        let v = out.get(2, 2).unwrap();
        assert!(v > 1000 && v < 1010, "expected smoothing, got {}", v);
    }

    #[test]
    fn preserves_depth_edges() {
        // Left half near, right half far, far beyond delta: the edge
        // columns must keep their side's value.
        let mut data = vec![0u16; 36];
        for y in 0..6 {
            for x in 0..6 {
                data[y * 6 + x] = if x < 3 { 1000 } else { 3000 };
            }
        }
        let frame = DepthFrame::new(6, 6, data);
        let out = filter().process(&frame);
        assert_eq!(out.get(2, 3), Some(1000));
        assert_eq!(out.get(3, 3), Some(3000));
    }

    #[test]
    fn hole_fill_bridges_short_gaps_only() {
        let mut f = filter();
        f.hole_fill_mode = 2; // fills gaps up to 2 pixels
        let mut data = vec![2000u16; 8];
        data[3] = 0;
        let frame = DepthFrame::new(8, 1, data);
        let out = f.process(&frame);
        assert_eq!(out.get(3, 0), Some(2000));

        // Mode 0 leaves holes alone
        let mut f0 = filter();
        f0.hole_fill_mode = 0;
        let mut data = vec![2000u16; 8];
        data[3] = 0;
        let frame = DepthFrame::new(8, 1, data);
        let out = f0.process(&frame);
        assert_eq!(out.get(3, 0), Some(0));
    }

    #[test]
    fn pass_is_deterministic() {
        let data: Vec<u16> = (0..64).map(|i| 1000 + (i % 7) as u16).collect();
        let frame = DepthFrame::new(8, 8, data);
        let f = filter();
        assert_eq!(f.process(&frame).data(), f.process(&frame).data());
    }
}
