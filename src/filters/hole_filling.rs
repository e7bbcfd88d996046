// SPDX-License-Identifier: GPL-3.0-only

//! Hole filling: replace invalid depth pixels from their neighborhood

use crate::frame::DepthFrame;

/// Fill mode: 0 = fill from left, 1 = farthest from around,
/// 2 = nearest from around.
pub const MODE_MIN: i64 = 0;
pub const MODE_MAX: i64 = 2;
pub const MODE_DEFAULT: i64 = 1;

#[derive(Debug, Clone)]
pub struct HoleFillingFilter {
    pub enabled: bool,
    pub mode: u32,
}

impl Default for HoleFillingFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: MODE_DEFAULT as u32,
        }
    }
}

impl HoleFillingFilter {
    pub fn process(&self, frame: &DepthFrame) -> DepthFrame {
        match self.mode.min(MODE_MAX as u32) {
            0 => self.fill_from_left(frame),
            1 => self.fill_from_around(frame, true),
            _ => self.fill_from_around(frame, false),
        }
    }

    /// Carry the last valid value rightward along each row
    fn fill_from_left(&self, frame: &DepthFrame) -> DepthFrame {
        let w = frame.width() as usize;
        let mut data = frame.data().to_vec();
        for row in data.chunks_exact_mut(w) {
            let mut last = 0u16;
            for d in row.iter_mut() {
                if *d != 0 {
                    last = *d;
                } else if last != 0 {
                    *d = last;
                }
            }
        }
        DepthFrame::new(frame.width(), frame.height(), data)
    }

    /// Fill each hole from its valid 8-neighborhood in the input:
    /// the farthest (max) or nearest (min) reading.
    fn fill_from_around(&self, frame: &DepthFrame, farthest: bool) -> DepthFrame {
        let w = frame.width() as i64;
        let h = frame.height() as i64;
        let src = frame.data();
        let mut out = src.to_vec();

        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) as usize;
                if src[i] != 0 {
                    continue;
                }
                let mut candidate: Option<u16> = None;
                for dy in -1..=1i64 {
                    for dx in -1..=1i64 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let (nx, ny) = (x + dx, y + dy);
                        if nx < 0 || ny < 0 || nx >= w || ny >= h {
                            continue;
                        }
                        let n = src[(ny * w + nx) as usize];
                        if n == 0 {
                            continue;
                        }
                        candidate = Some(match candidate {
                            None => n,
                            Some(c) if farthest => c.max(n),
                            Some(c) => c.min(n),
                        });
                    }
                }
                if let Some(v) = candidate {
                    out[i] = v;
                }
            }
        }

        DepthFrame::new(frame.width(), frame.height(), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_from_left_carries_last_valid() {
        let filter = HoleFillingFilter {
            enabled: true,
            mode: 0,
        };
        let frame = DepthFrame::new(5, 1, vec![0, 700, 0, 0, 900]);
        let out = filter.process(&frame);
        // Leading hole has no left neighbor and stays invalid
        assert_eq!(out.data(), &[0, 700, 700, 700, 900]);
    }

    #[test]
    fn farthest_from_around_takes_max_neighbor() {
        let filter = HoleFillingFilter {
            enabled: true,
            mode: 1,
        };
        let frame = DepthFrame::new(3, 3, vec![100, 200, 300, 400, 0, 500, 600, 700, 800]);
        let out = filter.process(&frame);
        assert_eq!(out.get(1, 1), Some(800));
    }

    #[test]
    fn nearest_from_around_takes_min_neighbor() {
        let filter = HoleFillingFilter {
            enabled: true,
            mode: 2,
        };
        let frame = DepthFrame::new(3, 3, vec![100, 200, 300, 400, 0, 500, 600, 700, 800]);
        let out = filter.process(&frame);
        assert_eq!(out.get(1, 1), Some(100));
    }

    #[test]
    fn isolated_hole_with_no_neighbors_stays_invalid() {
        let filter = HoleFillingFilter {
            enabled: true,
            mode: 1,
        };
        let frame = DepthFrame::new(3, 3, vec![0; 9]);
        let out = filter.process(&frame);
        assert!(out.data().iter().all(|&d| d == 0));
    }

    #[test]
    fn valid_pixels_never_change() {
        let filter = HoleFillingFilter {
            enabled: true,
            mode: 1,
        };
        let frame = DepthFrame::new(3, 1, vec![100, 0, 300]);
        let out = filter.process(&frame);
        assert_eq!(out.get(0, 0), Some(100));
        assert_eq!(out.get(2, 0), Some(300));
    }
}
