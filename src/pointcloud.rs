// SPDX-License-Identifier: GPL-3.0-only

//! Point cloud reconstruction from filtered depth frames
//!
//! Deprojects every valid depth pixel through the depth stream's pinhole
//! model and pairs it with a normalized texture coordinate into the
//! mapped stream (color, infrared, or the depth frame itself). Vertex
//! layouts are `bytemuck`-Pod so buffers can be uploaded to a GPU as-is
//! by the embedding application.

use crate::backend::Intrinsics;
use crate::frame::DepthFrame;

/// One reconstructed surface point, meters, camera coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Normalized texture coordinate into the mapped stream, [0, 1]
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TexCoord {
    pub u: f32,
    pub v: f32,
}

/// Vertices plus matching texture coordinates, regenerated every cycle
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub vertices: Vec<Vertex>,
    pub tex_coords: Vec<TexCoord>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Reconstructs point clouds for one pipeline session
///
/// Holds the depth stream's intrinsics and scale captured at `start()`.
#[derive(Debug, Clone, Copy)]
pub struct PointCloudReconstructor {
    depth_intrinsics: Intrinsics,
    depth_scale: f32,
}

impl PointCloudReconstructor {
    pub fn new(depth_intrinsics: Intrinsics, depth_scale: f32) -> Self {
        Self {
            depth_intrinsics,
            depth_scale,
        }
    }

    /// Reconstruct one cloud from a filtered depth frame
    ///
    /// Only pixels with a valid (non-zero) reading become points. When
    /// `texture_intrinsics` is given, each point is projected into that
    /// stream's viewport (identity extrinsics) for its texture
    /// coordinate; otherwise the coordinate is the point's own position
    /// in the depth frame.
    pub fn reconstruct(
        &self,
        depth: &DepthFrame,
        texture_intrinsics: Option<&Intrinsics>,
    ) -> PointCloud {
        // Filters may have changed the frame shape since negotiation.
        let intr = self
            .depth_intrinsics
            .scaled_to(depth.width(), depth.height());

        let mut vertices = Vec::new();
        let mut tex_coords = Vec::new();

        let data = depth.data();
        for py in 0..depth.height() {
            for px in 0..depth.width() {
                let d = data[(py * depth.width() + px) as usize];
                if d == 0 {
                    continue;
                }
                let z = d as f32 * self.depth_scale;
                let x = (px as f32 + 0.5 - intr.cx) / intr.fx * z;
                let y = (py as f32 + 0.5 - intr.cy) / intr.fy * z;
                vertices.push(Vertex { x, y, z });

                let tc = match texture_intrinsics {
                    Some(tex) => {
                        let tu = (x / z * tex.fx + tex.cx) / tex.width as f32;
                        let tv = (y / z * tex.fy + tex.cy) / tex.height as f32;
                        TexCoord {
                            u: tu.clamp(0.0, 1.0),
                            v: tv.clamp(0.0, 1.0),
                        }
                    }
                    None => TexCoord {
                        u: (px as f32 + 0.5) / depth.width() as f32,
                        v: (py as f32 + 0.5) / depth.height() as f32,
                    },
                };
                tex_coords.push(tc);
            }
        }

        PointCloud {
            vertices,
            tex_coords,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_intrinsics() -> Intrinsics {
        Intrinsics {
            width: 4,
            height: 4,
            fx: 4.0,
            fy: 4.0,
            cx: 2.0,
            cy: 2.0,
        }
    }

    #[test]
    fn only_valid_pixels_become_points() {
        let mut data = vec![0u16; 16];
        data[0] = 1000;
        data[5] = 2000;
        data[10] = 3000;
        let depth = DepthFrame::new(4, 4, data);

        let reconstructor = PointCloudReconstructor::new(test_intrinsics(), 0.001);
        let cloud = reconstructor.reconstruct(&depth, None);

        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.tex_coords.len(), 3);
    }

    #[test]
    fn principal_point_deprojects_to_axis() {
        // Pixel at the principal point has x = y = 0 at any depth.
        // With cx = cy = 2.0 that is pixel center (1.5, 1.5) + 0.5.
        let mut data = vec![0u16; 16];
        data[(1 * 4 + 1) as usize] = 2000;
        let depth = DepthFrame::new(4, 4, data);

        let reconstructor = PointCloudReconstructor::new(test_intrinsics(), 0.001);
        let cloud = reconstructor.reconstruct(&depth, None);

        assert_eq!(cloud.len(), 1);
        let v = cloud.vertices[0];
        assert!(v.x.abs() < 1e-6);
        assert!(v.y.abs() < 1e-6);
        assert!((v.z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn tex_coords_stay_normalized() {
        let depth = DepthFrame::new(4, 4, vec![1500; 16]);
        let tex = Intrinsics {
            width: 8,
            height: 8,
            fx: 8.0,
            fy: 8.0,
            cx: 4.0,
            cy: 4.0,
        };

        let reconstructor = PointCloudReconstructor::new(test_intrinsics(), 0.001);
        let cloud = reconstructor.reconstruct(&depth, Some(&tex));

        assert_eq!(cloud.len(), 16);
        for tc in &cloud.tex_coords {
            assert!((0.0..=1.0).contains(&tc.u));
            assert!((0.0..=1.0).contains(&tc.v));
        }
    }

    #[test]
    fn reconstruction_is_deterministic() {
        let depth = DepthFrame::new(4, 4, vec![1234; 16]);
        let reconstructor = PointCloudReconstructor::new(test_intrinsics(), 0.001);
        let a = reconstructor.reconstruct(&depth, None);
        let b = reconstructor.reconstruct(&depth, None);
        assert_eq!(a.vertices, b.vertices);
        assert_eq!(a.tex_coords, b.tex_coords);
    }

    #[test]
    fn vertices_are_pod() {
        let cloud = PointCloud {
            vertices: vec![Vertex {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            }],
            tex_coords: vec![TexCoord { u: 0.5, v: 0.5 }],
        };
        let bytes: &[u8] = bytemuck::cast_slice(&cloud.vertices);
        assert_eq!(bytes.len(), 12);
    }
}
