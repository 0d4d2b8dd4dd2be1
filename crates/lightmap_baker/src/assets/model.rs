//! Model representation for baking
//!
//! A model is a list of geometries, each with one or more LODs of indexed
//! triangle data. Vertices carry the lightmap UV channel produced by the
//! external unwrapper, and every model carries the unwrapper's texel-density
//! metadata so the region allocator can size its atlas rectangle.

use crate::foundation::math::Vec3;
use crate::scene::AABB;

/// Vertex layout consumed by the baking pipeline
///
/// The `lightmap_uv` channel addresses the model's own unwrapped chart
/// layout in [0, 1]; the region allocator remaps it into atlas space via the
/// per-receiver scale/offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelVertex {
    /// Position in model space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Lightmap texture coordinates
    pub lightmap_uv: [f32; 2],
}

impl ModelVertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], lightmap_uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            lightmap_uv,
        }
    }
}

/// One level of detail of a geometry: an indexed triangle list
#[derive(Debug, Clone)]
pub struct GeometryLod {
    /// Vertex data
    pub vertices: Vec<ModelVertex>,

    /// Index data for triangles
    pub indices: Vec<u32>,
}

impl GeometryLod {
    /// Create a new LOD from vertex and index data
    pub fn new(vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of triangles in this LOD
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A geometry with its LOD chain, coarsest last
#[derive(Debug, Clone)]
pub struct Geometry {
    /// LODs, index 0 is the full-detail mesh
    pub lods: Vec<GeometryLod>,
}

impl Geometry {
    /// Create a geometry with a single LOD
    pub fn single_lod(lod: GeometryLod) -> Self {
        Self { lods: vec![lod] }
    }
}

/// Lightmap UV metadata attached to a model by the external unwrapper
#[derive(Debug, Clone, Copy)]
pub struct LightmapMeta {
    /// Chart layout size in texels the unwrapper targeted
    pub uv_size: (u32, u32),

    /// Texel density (texels per world unit) the layout was authored at
    pub density: u32,
}

impl LightmapMeta {
    /// Create lightmap metadata
    pub fn new(uv_size: (u32, u32), density: u32) -> Self {
        Self { uv_size, density }
    }
}

/// A renderable model asset
#[derive(Debug, Clone)]
pub struct Model {
    /// Asset name, unique within a resource cache
    pub name: String,

    /// Geometries making up the model
    pub geometries: Vec<Geometry>,

    /// Lightmap UV metadata from the unwrapper
    pub lightmap_meta: LightmapMeta,

    /// Model-space bounding box over all LOD-0 vertices
    pub bounding_box: AABB,
}

impl Model {
    /// Create a model, computing its bounding box from LOD-0 vertices
    pub fn new(
        name: impl Into<String>,
        geometries: Vec<Geometry>,
        lightmap_meta: LightmapMeta,
    ) -> Self {
        let mut bounding_box = AABB::empty();
        for geometry in &geometries {
            if let Some(lod) = geometry.lods.first() {
                for vertex in &lod.vertices {
                    bounding_box.merge_point(Vec3::from(vertex.position));
                }
            }
        }

        Self {
            name: name.into(),
            geometries,
            lightmap_meta,
            bounding_box,
        }
    }

    /// Flat quad in the XY plane, centered at the origin, facing -Z
    ///
    /// Lightmap UVs cover the full [0, 1] square. Used in tests and small
    /// demo scenes.
    pub fn from_quad(name: impl Into<String>, size: f32, meta: LightmapMeta) -> Self {
        let half = size * 0.5;
        let normal = [0.0, 0.0, -1.0];
        let vertices = vec![
            ModelVertex::new([-half, -half, 0.0], normal, [0.0, 0.0]),
            ModelVertex::new([half, -half, 0.0], normal, [1.0, 0.0]),
            ModelVertex::new([half, half, 0.0], normal, [1.0, 1.0]),
            ModelVertex::new([-half, half, 0.0], normal, [0.0, 1.0]),
        ];
        let indices = vec![0, 1, 2, 2, 3, 0];

        Self::new(
            name,
            vec![Geometry::single_lod(GeometryLod::new(vertices, indices))],
            meta,
        )
    }

    /// Axis-aligned box centered at the origin
    ///
    /// Face normals point outward; lightmap UVs are a degenerate per-face
    /// mapping, adequate for obstacles that are never lit themselves.
    pub fn from_box(name: impl Into<String>, extents: Vec3, meta: LightmapMeta) -> Self {
        let e = extents;
        let faces: [([f32; 3], [Vec3; 4]); 6] = [
            // +Z
            ([0.0, 0.0, 1.0], [
                Vec3::new(-e.x, -e.y, e.z),
                Vec3::new(e.x, -e.y, e.z),
                Vec3::new(e.x, e.y, e.z),
                Vec3::new(-e.x, e.y, e.z),
            ]),
            // -Z
            ([0.0, 0.0, -1.0], [
                Vec3::new(e.x, -e.y, -e.z),
                Vec3::new(-e.x, -e.y, -e.z),
                Vec3::new(-e.x, e.y, -e.z),
                Vec3::new(e.x, e.y, -e.z),
            ]),
            // +X
            ([1.0, 0.0, 0.0], [
                Vec3::new(e.x, -e.y, e.z),
                Vec3::new(e.x, -e.y, -e.z),
                Vec3::new(e.x, e.y, -e.z),
                Vec3::new(e.x, e.y, e.z),
            ]),
            // -X
            ([-1.0, 0.0, 0.0], [
                Vec3::new(-e.x, -e.y, -e.z),
                Vec3::new(-e.x, -e.y, e.z),
                Vec3::new(-e.x, e.y, e.z),
                Vec3::new(-e.x, e.y, -e.z),
            ]),
            // +Y
            ([0.0, 1.0, 0.0], [
                Vec3::new(-e.x, e.y, e.z),
                Vec3::new(e.x, e.y, e.z),
                Vec3::new(e.x, e.y, -e.z),
                Vec3::new(-e.x, e.y, -e.z),
            ]),
            // -Y
            ([0.0, -1.0, 0.0], [
                Vec3::new(-e.x, -e.y, -e.z),
                Vec3::new(e.x, -e.y, -e.z),
                Vec3::new(e.x, -e.y, e.z),
                Vec3::new(-e.x, -e.y, e.z),
            ]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        for (normal, corners) in &faces {
            let base = vertices.len() as u32;
            for (corner, uv) in corners.iter().zip(uvs.iter()) {
                vertices.push(ModelVertex::new([corner.x, corner.y, corner.z], *normal, *uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self::new(
            name,
            vec![Geometry::single_lod(GeometryLod::new(vertices, indices))],
            meta,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_bounding_box() {
        let model = Model::from_quad("q", 4.0, LightmapMeta::new((16, 16), 8));
        assert_eq!(model.bounding_box.min, Vec3::new(-2.0, -2.0, 0.0));
        assert_eq!(model.bounding_box.max, Vec3::new(2.0, 2.0, 0.0));
        assert_eq!(model.geometries[0].lods[0].triangle_count(), 2);
    }

    #[test]
    fn test_box_has_twelve_triangles() {
        let model = Model::from_box("b", Vec3::new(1.0, 2.0, 3.0), LightmapMeta::new((16, 16), 8));
        assert_eq!(model.geometries[0].lods[0].triangle_count(), 12);
        assert_eq!(model.bounding_box.max, Vec3::new(1.0, 2.0, 3.0));
    }
}
