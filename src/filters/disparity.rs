// SPDX-License-Identifier: GPL-3.0-only

//! Depth/disparity domain transform
//!
//! Smoothing filters behave better in disparity space, where sample
//! spacing is proportional to distance error. The chain runs the forward
//! transform before spatial/temporal smoothing and the inverse transform
//! after hole filling, both gated by the same enable flag.

use crate::frame::DepthFrame;

/// Fixed scale relating depth and disparity: disparity = SCALE / depth.
/// Chosen so the full u16 disparity domain covers depths from ~122 units
/// upward; zeros (invalid) pass through untouched.
pub const DISPARITY_SCALE: f32 = 8_000_000.0;

#[derive(Debug, Clone, Default)]
pub struct DisparityTransform {
    pub enabled: bool,
}

impl DisparityTransform {
    /// Forward transform: depth domain to disparity domain
    pub fn to_disparity(&self, frame: &DepthFrame) -> DepthFrame {
        self.map(frame)
    }

    /// Inverse transform: disparity domain back to depth domain
    pub fn to_depth(&self, frame: &DepthFrame) -> DepthFrame {
        // The mapping is its own inverse up to rounding.
        self.map(frame)
    }

    fn map(&self, frame: &DepthFrame) -> DepthFrame {
        let out = frame
            .data()
            .iter()
            .map(|&d| {
                if d == 0 {
                    0
                } else {
                    (DISPARITY_SCALE / d as f32).round().clamp(1.0, u16::MAX as f32) as u16
                }
            })
            .collect();
        DepthFrame::new(frame.width(), frame.height(), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_pass_through() {
        let transform = DisparityTransform { enabled: true };
        let frame = DepthFrame::new(2, 1, vec![0, 4000]);
        let disp = transform.to_disparity(&frame);
        assert_eq!(disp.get(0, 0), Some(0));
        assert_eq!(disp.get(1, 0), Some(2000));
    }

    #[test]
    fn round_trip_within_rounding() {
        let transform = DisparityTransform { enabled: true };
        let depths: Vec<u16> = vec![200, 800, 1234, 5000, 20000, 65000];
        let frame = DepthFrame::new(depths.len() as u32, 1, depths.clone());
        let back = transform.to_depth(&transform.to_disparity(&frame));
        for (orig, rt) in depths.iter().zip(back.data()) {
            assert!(
                (*orig as i32 - *rt as i32).abs() <= 1,
                "{} round-tripped to {}",
                orig,
                rt
            );
        }
    }

    #[test]
    fn near_depth_clamps_instead_of_overflowing() {
        let transform = DisparityTransform { enabled: true };
        let frame = DepthFrame::new(1, 1, vec![1]);
        let disp = transform.to_disparity(&frame);
        assert_eq!(disp.get(0, 0), Some(u16::MAX));
    }
}
