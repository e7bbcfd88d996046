// SPDX-License-Identifier: GPL-3.0-only

//! Frameset alignment
//!
//! Reprojects every stream of a frameset into a common viewport (that of
//! the depth or the color stream) before per-stream processing. Without
//! device calibration this core uses nearest-neighbor viewport
//! resampling under identity extrinsics; a backend that exposes real
//! extrinsics can pre-align framesets before delivery instead.

use crate::config::AlignMode;
use crate::frame::{DepthFrame, Frameset, VideoFrame};

/// Reproject all streams of `frameset` into the viewport selected by `mode`
///
/// No-op when the target stream is absent from the frameset.
pub fn align_frameset(frameset: &mut Frameset, mode: AlignMode) {
    match mode {
        AlignMode::None => {}
        AlignMode::Depth => {
            let Some(depth) = &frameset.depth else { return };
            let (w, h) = (depth.width(), depth.height());
            if let Some(color) = &frameset.color {
                frameset.color = Some(resample_video(color, w, h));
            }
            if let Some(infrared) = &frameset.infrared {
                frameset.infrared = Some(resample_video(infrared, w, h));
            }
        }
        AlignMode::Color => {
            let Some(color) = &frameset.color else { return };
            let (w, h) = (color.width(), color.height());
            if let Some(depth) = &frameset.depth {
                frameset.depth = Some(resample_depth(depth, w, h));
            }
            if let Some(infrared) = &frameset.infrared {
                frameset.infrared = Some(resample_video(infrared, w, h));
            }
        }
    }
}

fn resample_depth(frame: &DepthFrame, width: u32, height: u32) -> DepthFrame {
    if frame.width() == width && frame.height() == height {
        return frame.clone();
    }
    let src = frame.data();
    let mut out = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        let sy = y * frame.height() / height;
        for x in 0..width {
            let sx = x * frame.width() / width;
            out.push(src[(sy * frame.width() + sx) as usize]);
        }
    }
    DepthFrame::new(width, height, out)
}

fn resample_video(frame: &VideoFrame, width: u32, height: u32) -> VideoFrame {
    if frame.width() == width && frame.height() == height {
        return frame.clone();
    }
    let channels = frame.channels();
    let src = frame.data();
    let mut out = Vec::with_capacity((width * height * channels) as usize);
    for y in 0..height {
        let sy = y * frame.height() / height;
        for x in 0..width {
            let sx = x * frame.width() / width;
            let base = ((sy * frame.width() + sx) * channels) as usize;
            out.extend_from_slice(&src[base..base + channels as usize]);
        }
    }
    VideoFrame::new(width, height, channels, out)
}
