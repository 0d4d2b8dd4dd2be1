//! Baking camera

use crate::foundation::math::{Vec2, Vec3};
use crate::scene::AABB;

/// Orthographic camera used to frame a baking scene
///
/// The baking axis is world +Z regardless of any light direction: the camera
/// sits on the Z minimum of the framed box, centered on XY, looking down +Z.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position
    pub position: Vec3,

    /// View direction (unit length)
    pub direction: Vec3,

    /// Orthographic view volume size on XY
    pub ortho_size: Vec2,

    /// Near clip distance
    pub near_clip: f32,

    /// Far clip distance
    pub far_clip: f32,
}

impl Camera {
    /// Frame a bounding box for baking
    ///
    /// Near clip is fixed at 1; far clip covers the box depth behind it.
    pub fn fit_bounding_box(bounds: &AABB) -> Self {
        let near = 1.0;
        let far = bounds.size().z + near;

        let mut position = bounds.center();
        position.z = bounds.min.z - near;

        Self {
            position,
            direction: Vec3::new(0.0, 0.0, 1.0),
            ortho_size: Vec2::new(bounds.size().x, bounds.size().y),
            near_clip: near,
            far_clip: far,
        }
    }

    /// View-space depth of a world point along the camera axis
    pub fn depth_of(&self, world: Vec3) -> f32 {
        (world - self.position).dot(&self.direction)
    }

    /// Whether a view-space depth lies inside the clip range
    pub fn depth_in_range(&self, depth: f32) -> bool {
        depth >= self.near_clip && depth <= self.far_clip
    }
}
