// SPDX-License-Identifier: GPL-3.0-only

//! Ordered depth filter chain
//!
//! Stages run in a fixed order that configuration cannot change:
//! decimation, disparity transform (forward), spatial smoothing,
//! temporal smoothing, hole filling, disparity transform (inverse).
//! Individual stages toggle on and off; each enabled stage fully
//! replaces the depth frame with its output. No stage reads the clock
//! or any randomness, so one pass over a fixed input is bit-for-bit
//! reproducible.

pub mod decimation;
pub mod disparity;
pub mod hole_filling;
pub mod spatial;
pub mod temporal;

pub use decimation::DecimationFilter;
pub use disparity::DisparityTransform;
pub use hole_filling::HoleFillingFilter;
pub use spatial::SpatialFilter;
pub use temporal::TemporalFilter;

use crate::frame::DepthFrame;

/// The full depth processing chain for one device
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    pub decimation: DecimationFilter,
    pub disparity: DisparityTransform,
    pub spatial: SpatialFilter,
    pub temporal: TemporalFilter,
    pub hole_filling: HoleFillingFilter,
}

impl FilterChain {
    /// Run one pass over a depth frame, honoring each stage's enabled flag
    pub fn process(&mut self, frame: DepthFrame) -> DepthFrame {
        let mut frame = frame;
        if self.decimation.enabled {
            frame = self.decimation.process(&frame);
        }
        if self.disparity.enabled {
            frame = self.disparity.to_disparity(&frame);
        }
        if self.spatial.enabled {
            frame = self.spatial.process(&frame);
        }
        if self.temporal.enabled {
            frame = self.temporal.process(&frame);
        }
        if self.hole_filling.enabled {
            frame = self.hole_filling.process(&frame);
        }
        if self.disparity.enabled {
            frame = self.disparity.to_depth(&frame);
        }
        frame
    }

    /// Drop accumulated history (temporal smoothing state)
    pub fn reset(&mut self) {
        self.temporal.reset();
    }
}
