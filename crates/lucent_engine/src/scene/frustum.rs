//! View frustum culling
//!
//! Planes are extracted from a combined view-projection matrix (clip-space
//! rows, depth in `[0, 1]`) and tested against world-space bounding boxes
//! when [`RenderScene::draw`](super::RenderScene::draw) flattens the scene
//! into a view snapshot.

use crate::foundation::math::{Mat4, Vec3, Vec4};

use super::entities::Aabb;

/// Six view-frustum planes with inward-facing normals
#[derive(Debug, Clone)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract planes from `projection * view`
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let row = |i: usize| {
            Vec4::new(
                view_projection[(i, 0)],
                view_projection[(i, 1)],
                view_projection[(i, 2)],
                view_projection[(i, 3)],
            )
        };

        let r0 = row(0);
        let r1 = row(1);
        let r2 = row(2);
        let r3 = row(3);

        let mut planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r2,      // near, depth range [0, 1]
            r3 - r2, // far
        ];
        for plane in &mut planes {
            let len = plane.xyz().norm();
            if len > f32::EPSILON {
                *plane /= len;
            }
        }
        Self { planes }
    }

    /// Whether any part of `aabb` is inside the frustum
    ///
    /// Positive-vertex test: conservative, may keep boxes that only nearly
    /// intersect, never culls a visible one.
    pub fn contains_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let normal = plane.xyz();
            let positive = Vec3::new(
                if normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if normal.dot(&positive) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}
