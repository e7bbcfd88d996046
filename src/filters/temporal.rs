// SPDX-License-Identifier: GPL-3.0-only

//! Temporal smoothing across consecutive depth frames
//!
//! Blends each pixel with its previous filtered value when the change is
//! within `smooth_delta`, and optionally holds the last valid value for
//! pixels that briefly lose their reading (persistency). The filter
//! keeps per-pixel history; it resets when the frame shape changes or
//! when the pipeline restarts.

use crate::frame::DepthFrame;

pub const SMOOTH_ALPHA_MIN: f64 = 0.0;
pub const SMOOTH_ALPHA_MAX: f64 = 1.0;
pub const SMOOTH_ALPHA_DEFAULT: f64 = 0.4;

pub const SMOOTH_DELTA_MIN: i64 = 1;
pub const SMOOTH_DELTA_MAX: i64 = 100;
pub const SMOOTH_DELTA_DEFAULT: i64 = 20;

/// Persistency mode: 0 never holds a stale value, 8 always holds it,
/// 1..=7 hold for at most that many consecutive missing frames.
pub const PERSISTENCY_MIN: i64 = 0;
pub const PERSISTENCY_MAX: i64 = 8;
pub const PERSISTENCY_DEFAULT: i64 = 3;

#[derive(Debug, Clone)]
struct History {
    width: u32,
    height: u32,
    /// Last output value per pixel
    values: Vec<u16>,
    /// Consecutive frames since the pixel last had a direct reading
    ages: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TemporalFilter {
    pub enabled: bool,
    /// EMA weight of the current sample
    pub smooth_alpha: f32,
    /// Change threshold in depth units
    pub smooth_delta: u16,
    /// Stale-value hold mode
    pub persistency: u32,
    history: Option<History>,
}

impl Default for TemporalFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            smooth_alpha: SMOOTH_ALPHA_DEFAULT as f32,
            smooth_delta: SMOOTH_DELTA_DEFAULT as u16,
            persistency: PERSISTENCY_DEFAULT as u32,
            history: None,
        }
    }
}

impl TemporalFilter {
    pub fn process(&mut self, frame: &DepthFrame) -> DepthFrame {
        let dims_changed = self
            .history
            .as_ref()
            .is_some_and(|h| h.width != frame.width() || h.height != frame.height());
        if dims_changed {
            self.history = None;
        }

        let Some(history) = self.history.as_mut() else {
            // First frame after (re)start: output as-is, seed history.
            let values = frame.data().to_vec();
            let ages = values.iter().map(|&d| if d != 0 { 0 } else { u8::MAX }).collect();
            self.history = Some(History {
                width: frame.width(),
                height: frame.height(),
                values,
                ages,
            });
            return frame.clone();
        };

        let alpha = self
            .smooth_alpha
            .clamp(SMOOTH_ALPHA_MIN as f32, SMOOTH_ALPHA_MAX as f32);
        let delta = self.smooth_delta as i32;
        let persistency = self.persistency.min(PERSISTENCY_MAX as u32);

        let mut out = Vec::with_capacity(frame.data().len());
        for (i, &cur) in frame.data().iter().enumerate() {
            let prev = history.values[i];
            let age = history.ages[i];

            let value = if cur != 0 {
                let blended = if prev != 0 && (cur as i32 - prev as i32).abs() <= delta {
                    (alpha * cur as f32 + (1.0 - alpha) * prev as f32).round() as u16
                } else {
                    cur
                };
                history.values[i] = blended;
                history.ages[i] = 0;
                blended
            } else {
                let hold = match persistency {
                    0 => false,
                    8 => prev != 0,
                    p => prev != 0 && (age as u32) < p,
                };
                history.ages[i] = age.saturating_add(1);
                if hold { prev } else { 0 }
            };
            out.push(value);
        }

        DepthFrame::new(frame.width(), frame.height(), out)
    }

    /// Drop all per-pixel history
    pub fn reset(&mut self) {
        self.history = None;
    }
}
