// SPDX-License-Identifier: GPL-3.0-only

//! Decimation: block subsampling of the depth frame

use crate::frame::DepthFrame;

/// Decimation magnitude range (block edge in pixels)
pub const MAGNITUDE_MIN: i64 = 2;
pub const MAGNITUDE_MAX: i64 = 8;
pub const MAGNITUDE_DEFAULT: i64 = 2;

/// Reduces depth frame resolution by an integer factor
///
/// Each output pixel is the median of the valid (non-zero) samples in
/// its magnitude-by-magnitude source block, zero when the block holds no
/// valid depth. Output dimensions shrink accordingly, which downstream
/// stages and the point cloud reconstructor pick up from the frame.
#[derive(Debug, Clone)]
pub struct DecimationFilter {
    pub enabled: bool,
    pub magnitude: u32,
}

impl Default for DecimationFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            magnitude: MAGNITUDE_DEFAULT as u32,
        }
    }
}

impl DecimationFilter {
    pub fn process(&self, frame: &DepthFrame) -> DepthFrame {
        let m = self.magnitude.clamp(MAGNITUDE_MIN as u32, MAGNITUDE_MAX as u32);
        let out_w = (frame.width() / m).max(1);
        let out_h = (frame.height() / m).max(1);

        let src = frame.data();
        let mut out = Vec::with_capacity((out_w * out_h) as usize);
        let mut block = Vec::with_capacity((m * m) as usize);

        for by in 0..out_h {
            for bx in 0..out_w {
                block.clear();
                let y_end = ((by + 1) * m).min(frame.height());
                let x_end = ((bx + 1) * m).min(frame.width());
                for y in by * m..y_end {
                    for x in bx * m..x_end {
                        let d = src[(y * frame.width() + x) as usize];
                        if d != 0 {
                            block.push(d);
                        }
                    }
                }
                if block.is_empty() {
                    out.push(0);
                } else {
                    block.sort_unstable();
                    out.push(block[block.len() / 2]);
                }
            }
        }

        DepthFrame::new(out_w, out_h, out)
    }
}
