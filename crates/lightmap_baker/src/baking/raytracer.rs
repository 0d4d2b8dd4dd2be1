//! Ray-traceable occlusion scene
//!
//! World-space triangles behind an octree, built once per bake and read-only
//! after commit. Triangles are stored by centroid with a cached maximum
//! bounding radius; ray traversal expands node bounds by that radius so
//! triangles spanning node boundaries are never missed. Queries are any-hit
//! occlusion tests, issued one ray packet at a time.

use crate::baking::geometry::GeometryRecord;
use crate::baking::RAY_PACKET_SIZE;
use crate::foundation::math::Vec3;
use crate::scene::AABB;
use log::debug;

/// Sentinel ray distance marking a lane as "no ray" in a packet
pub const NO_HIT_DISTANCE: f32 = -1.0;

const INTERSECT_EPSILON: f32 = 1.0e-7;

/// A packet of up to [`RAY_PACKET_SIZE`] occlusion rays
///
/// All rays in a packet share one direction (the anti-light direction), so
/// only origins and per-lane validity vary. Invalid lanes carry the
/// [`NO_HIT_DISTANCE`] sentinel.
#[derive(Debug, Clone)]
pub struct RayPacket {
    /// Per-lane validity; invalid lanes are skipped by the query
    pub valid: [bool; RAY_PACKET_SIZE],

    /// Per-lane ray origins
    pub origin: [Vec3; RAY_PACKET_SIZE],

    /// Shared ray direction
    pub direction: Vec3,

    /// Minimum hit distance
    pub t_near: f32,

    /// Per-lane maximum hit distance, `NO_HIT_DISTANCE` when invalid
    pub t_far: [f32; RAY_PACKET_SIZE],
}

impl RayPacket {
    /// Create a packet with every lane invalid
    pub fn empty(direction: Vec3) -> Self {
        Self {
            valid: [false; RAY_PACKET_SIZE],
            origin: [Vec3::zeros(); RAY_PACKET_SIZE],
            direction,
            t_near: 0.0,
            t_far: [NO_HIT_DISTANCE; RAY_PACKET_SIZE],
        }
    }

    /// Fill one lane with a live ray
    pub fn set_ray(&mut self, lane: usize, origin: Vec3, t_far: f32) {
        self.valid[lane] = true;
        self.origin[lane] = origin;
        self.t_far[lane] = t_far;
    }

    /// Number of live lanes
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
}

impl Triangle {
    fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    fn bounding_radius(&self) -> f32 {
        let centroid = self.centroid();
        (self.v0 - centroid)
            .magnitude()
            .max((self.v1 - centroid).magnitude())
            .max((self.v2 - centroid).magnitude())
    }

    /// Möller–Trumbore intersection, both-sided
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let p = direction.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() < INTERSECT_EPSILON {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = origin - self.v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        Some(edge2.dot(&q) * inv_det)
    }
}

#[derive(Debug, Clone, Copy)]
struct TriangleRef {
    index: u32,
    centroid: Vec3,
}

struct OctreeConfig {
    max_entries_per_node: usize,
    max_depth: u32,
    min_node_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_entries_per_node: 16,
            max_depth: 8,
            min_node_size: 0.25,
        }
    }
}

struct OctreeNode {
    bounds: AABB,
    entries: Vec<TriangleRef>,
    children: Option<Box<[OctreeNode; 8]>>,
    depth: u32,
}

impl OctreeNode {
    fn new(bounds: AABB, depth: u32) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: None,
            depth,
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    fn octant_index(center: Vec3, position: Vec3) -> usize {
        let x_bit = usize::from(position.x >= center.x);
        let y_bit = usize::from(position.y >= center.y);
        let z_bit = usize::from(position.z >= center.z);
        (z_bit << 2) | (y_bit << 1) | x_bit
    }

    fn subdivide(&mut self) {
        let center = self.bounds.center();
        let quarter_extents = self.bounds.extents() * 0.5;

        let make_child = |octant: usize| {
            let x_sign = if octant & 1 != 0 { 1.0 } else { -1.0 };
            let y_sign = if octant & 2 != 0 { 1.0 } else { -1.0 };
            let z_sign = if octant & 4 != 0 { 1.0 } else { -1.0 };

            let child_center = Vec3::new(
                center.x + quarter_extents.x * x_sign,
                center.y + quarter_extents.y * y_sign,
                center.z + quarter_extents.z * z_sign,
            );
            OctreeNode::new(
                AABB::from_center_extents(child_center, quarter_extents),
                self.depth + 1,
            )
        };

        self.children = Some(Box::new([
            make_child(0),
            make_child(1),
            make_child(2),
            make_child(3),
            make_child(4),
            make_child(5),
            make_child(6),
            make_child(7),
        ]));

        let entries = std::mem::take(&mut self.entries);
        if let Some(ref mut children) = self.children {
            for entry in entries {
                let octant = Self::octant_index(center, entry.centroid);
                children[octant].entries.push(entry);
            }
        }
    }

    fn insert(&mut self, entry: TriangleRef, config: &OctreeConfig) {
        if self.is_leaf() {
            let should_subdivide = self.entries.len() >= config.max_entries_per_node
                && self.depth < config.max_depth
                && self.bounds.extents().x > config.min_node_size;

            if !should_subdivide {
                self.entries.push(entry);
                return;
            }
            self.subdivide();
        }

        let center = self.bounds.center();
        let octant = Self::octant_index(center, entry.centroid);
        if let Some(ref mut children) = self.children {
            children[octant].insert(entry, config);
        }
    }

    /// Any-hit traversal; bounds expanded by the tree-wide max radius
    fn occluded(
        &self,
        origin: Vec3,
        direction: Vec3,
        t_near: f32,
        t_far: f32,
        max_radius: f32,
        triangles: &[Triangle],
    ) -> bool {
        let expansion = Vec3::new(max_radius, max_radius, max_radius);
        let expanded = AABB::new(self.bounds.min - expansion, self.bounds.max + expansion);

        match expanded.intersect_ray(origin, direction) {
            Some(entry_distance) if entry_distance <= t_far => {}
            _ => return false,
        }

        for entry in &self.entries {
            let triangle = &triangles[entry.index as usize];
            if let Some(t) = triangle.intersect(origin, direction) {
                if t >= t_near && t <= t_far {
                    return true;
                }
            }
        }

        if let Some(ref children) = self.children {
            for child in children.iter() {
                if child.occluded(origin, direction, t_near, t_far, max_radius, triangles) {
                    return true;
                }
            }
        }

        false
    }
}

/// Builder accepting geometry insertions before the single commit point
pub struct RaytracerSceneBuilder {
    triangles: Vec<Triangle>,
    bounds: AABB,
    geometry_count: usize,
}

impl RaytracerSceneBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
            bounds: AABB::empty(),
            geometry_count: 0,
        }
    }

    /// Insert one world-space triangle batch
    pub fn attach_geometry(&mut self, record: &GeometryRecord) {
        for tri in &record.triangles {
            let triangle = Triangle {
                v0: record.positions[tri[0] as usize],
                v1: record.positions[tri[1] as usize],
                v2: record.positions[tri[2] as usize],
            };
            self.bounds.merge_point(triangle.v0);
            self.bounds.merge_point(triangle.v1);
            self.bounds.merge_point(triangle.v2);
            self.triangles.push(triangle);
        }
        self.geometry_count += 1;
    }

    /// Number of geometry batches attached so far
    pub fn geometry_count(&self) -> usize {
        self.geometry_count
    }

    /// Whether any triangles have been attached
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Build the immutable scene; the single serialization point of the bake
    pub fn commit(self) -> RaytracerScene {
        debug!(
            "committing raytracer scene: {} triangles from {} geometries",
            self.triangles.len(),
            self.geometry_count
        );

        if self.triangles.is_empty() {
            return RaytracerScene {
                triangles: Vec::new(),
                root: None,
                max_radius: 0.0,
            };
        }

        let config = OctreeConfig::default();
        let mut root = OctreeNode::new(self.bounds, 0);
        let mut max_radius = 0.0f32;

        for (index, triangle) in self.triangles.iter().enumerate() {
            max_radius = max_radius.max(triangle.bounding_radius());
            root.insert(
                TriangleRef {
                    index: index as u32,
                    centroid: triangle.centroid(),
                },
                &config,
            );
        }

        RaytracerScene {
            triangles: self.triangles,
            root: Some(root),
            max_radius,
        }
    }
}

impl Default for RaytracerSceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Committed, read-only occlusion scene
///
/// Owned by the bake session; dropping it releases everything, on the happy
/// path and on early abort alike.
pub struct RaytracerScene {
    triangles: Vec<Triangle>,
    root: Option<OctreeNode>,
    max_radius: f32,
}

impl RaytracerScene {
    /// Number of triangles in the scene
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Any-hit occlusion test for a single ray
    pub fn occluded(&self, origin: Vec3, direction: Vec3, t_near: f32, t_far: f32) -> bool {
        if direction == Vec3::zeros() {
            return false;
        }
        match &self.root {
            Some(root) => root.occluded(
                origin,
                direction,
                t_near,
                t_far,
                self.max_radius,
                &self.triangles,
            ),
            None => false,
        }
    }

    /// Batched occlusion query; invalid lanes report unoccluded
    pub fn occluded_packet(&self, packet: &RayPacket) -> [bool; RAY_PACKET_SIZE] {
        let mut result = [false; RAY_PACKET_SIZE];
        for lane in 0..RAY_PACKET_SIZE {
            if packet.valid[lane] {
                result[lane] = self.occluded(
                    packet.origin[lane],
                    packet.direction,
                    packet.t_near,
                    packet.t_far[lane],
                );
            }
        }
        result
    }
}
