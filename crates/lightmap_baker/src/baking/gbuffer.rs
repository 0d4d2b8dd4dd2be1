//! G-buffer render stage
//!
//! Renders one atlas's baking scene into four RGBA32-float targets: world
//! position (with a non-zero marker in `w` for texels covered by geometry),
//! smoothed position, face normal, and smoothed normal. Rendering happens in
//! lightmap-UV space: each receiver's lightmap UVs are remapped through its
//! region scale/offset, so a triangle lands exactly on the atlas texels its
//! region owns. Depth is resolved against the baking camera's clip window.
//!
//! The stage returns an owned [`GBuffer`]; the ray caster takes it as input,
//! which makes "bake only what was just rendered" a type-level guarantee
//! instead of a call-order convention.

use crate::assets::{GeometryLod, Model};
use crate::foundation::math::{Mat4, Point3, Vec2, Vec3, Vec4};
use crate::render::{Camera, GraphicsDevice, Material, RenderError, RenderTexture};
use log::debug;
use std::sync::Arc;

/// Shader parameter carrying the per-receiver lightmap scale/offset
pub const LIGHTMAP_OFFSET_PARAM: &str = "LMOffset";

/// One receiver instance cloned into a baking scene
pub struct BakingInstance {
    /// The receiver's model
    pub model: Arc<Model>,

    /// World transform of the receiver node
    pub world: Mat4,

    /// Clone of the baking material, specialized with the receiver's
    /// lightmap scale/offset
    pub material: Material,
}

/// Dedicated off-screen scene for one atlas
///
/// Transient: built during baker initialization, discarded after the atlas's
/// G-buffer has been captured.
pub struct BakingScene {
    /// Orthographic camera framing all receivers
    pub camera: Camera,

    /// Receiver instances routed to this atlas
    pub instances: Vec<BakingInstance>,
}

/// CPU-side per-texel attribute buffers for one rendered atlas
///
/// Produced by [`render_gbuffer`] and owned by the caller; the buffers are
/// valid exactly as long as this value lives, there is no shared
/// "current atlas" state behind it.
pub struct GBuffer {
    /// Atlas this G-buffer was rendered for
    pub lightmap_index: u32,

    /// Atlas width in texels
    pub width: u32,

    /// Atlas height in texels
    pub height: u32,

    /// World position per texel; `w` is the coverage marker, zero for
    /// background texels
    pub positions: Vec<Vec4>,

    /// Smoothed world position per texel
    pub smooth_positions: Vec<Vec4>,

    /// Face normal per texel
    pub face_normals: Vec<Vec4>,

    /// Smoothed (vertex-interpolated) normal per texel
    pub smooth_normals: Vec<Vec4>,
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

struct GBufferTargets {
    position: RenderTexture,
    smooth_position: RenderTexture,
    face_normal: RenderTexture,
    smooth_normal: RenderTexture,
    depth: Vec<f32>,
}

impl GBufferTargets {
    fn new(width: u32, height: u32) -> Self {
        Self {
            position: RenderTexture::new(width, height),
            smooth_position: RenderTexture::new(width, height),
            face_normal: RenderTexture::new(width, height),
            smooth_normal: RenderTexture::new(width, height),
            depth: vec![f32::INFINITY; (width * height) as usize],
        }
    }
}

/// Render one atlas's baking scene and return its owned G-buffer
///
/// Fails only if the device cannot begin a frame; no targets are created or
/// written in that case.
pub fn render_gbuffer(
    device: &mut dyn GraphicsDevice,
    scene: &BakingScene,
    lightmap_index: u32,
    width: u32,
    height: u32,
) -> Result<GBuffer, RenderError> {
    device.begin_frame()?;

    let mut targets = GBufferTargets::new(width, height);

    // Geometry ids start at 1 so the marker channel is non-zero wherever
    // geometry covers a texel.
    let mut geometry_id = 1u32;
    for instance in &scene.instances {
        let scale_offset = instance
            .material
            .shader_parameter(LIGHTMAP_OFFSET_PARAM)
            .unwrap_or_else(|| Vec4::new(1.0, 1.0, 0.0, 0.0));

        for geometry in &instance.model.geometries {
            let Some(lod) = geometry.lods.first() else {
                continue;
            };
            rasterize_lod(
                &mut targets,
                &scene.camera,
                &instance.world,
                scale_offset,
                lod,
                geometry_id as f32,
                width,
                height,
            );
            geometry_id += 1;
        }
    }

    device.end_frame();

    debug!(
        "captured gbuffer for lightmap {lightmap_index}: {width}x{height}, {} geometries",
        geometry_id - 1
    );

    Ok(GBuffer {
        lightmap_index,
        width,
        height,
        positions: targets.position.read_back(),
        smooth_positions: targets.smooth_position.read_back(),
        face_normals: targets.face_normal.read_back(),
        smooth_normals: targets.smooth_normal.read_back(),
    })
}

fn rasterize_lod(
    targets: &mut GBufferTargets,
    camera: &Camera,
    world: &Mat4,
    scale_offset: Vec4,
    lod: &GeometryLod,
    marker: f32,
    width: u32,
    height: u32,
) {
    let atlas_size = Vec2::new(width as f32, height as f32);

    for tri in lod.indices.chunks_exact(3) {
        let fetch = |index: u32| {
            let vertex = &lod.vertices[index as usize];
            let position = world
                .transform_point(&Point3::from(Vec3::from(vertex.position)))
                .coords;
            let normal = world.transform_vector(&Vec3::from(vertex.normal));
            let uv = Vec2::from(vertex.lightmap_uv);
            let atlas_uv = Vec2::new(
                uv.x * scale_offset.x + scale_offset.z,
                uv.y * scale_offset.y + scale_offset.w,
            );
            (position, normal, atlas_uv.component_mul(&atlas_size))
        };

        let (p0, n0, t0) = fetch(tri[0]);
        let (p1, n1, t1) = fetch(tri[1]);
        let (p2, n2, t2) = fetch(tri[2]);

        let area = edge(t0, t1, t2);
        if area.abs() < 1.0e-8 {
            continue;
        }

        let face_normal = (p1 - p0).cross(&(p2 - p0)).normalize();

        // Clamped texel bounding box of the triangle
        let min_x = t0.x.min(t1.x).min(t2.x).floor().max(0.0) as u32;
        let min_y = t0.y.min(t1.y).min(t2.y).floor().max(0.0) as u32;
        let max_x = (t0.x.max(t1.x).max(t2.x).ceil() as u32).min(width);
        let max_y = (t0.y.max(t1.y).max(t2.y).ceil() as u32).min(height);

        for y in min_y..max_y {
            for x in min_x..max_x {
                let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);

                // Signed-area barycentrics; dividing by the signed area
                // makes the inside test winding-independent.
                let b0 = edge(t1, t2, center) / area;
                let b1 = edge(t2, t0, center) / area;
                let b2 = edge(t0, t1, center) / area;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }

                let position = p0 * b0 + p1 * b1 + p2 * b2;
                let depth = camera.depth_of(position);
                if !camera.depth_in_range(depth) {
                    continue;
                }

                let depth_index = (y * width + x) as usize;
                if depth >= targets.depth[depth_index] {
                    continue;
                }
                targets.depth[depth_index] = depth;

                let smooth_normal = (n0 * b0 + n1 * b1 + n2 * b2).normalize();

                targets.position.set_texel(
                    x,
                    y,
                    Vec4::new(position.x, position.y, position.z, marker),
                );
                targets.smooth_position.set_texel(
                    x,
                    y,
                    Vec4::new(position.x, position.y, position.z, 0.0),
                );
                targets.face_normal.set_texel(
                    x,
                    y,
                    Vec4::new(face_normal.x, face_normal.y, face_normal.z, 0.0),
                );
                targets.smooth_normal.set_texel(
                    x,
                    y,
                    Vec4::new(smooth_normal.x, smooth_normal.y, smooth_normal.z, 0.0),
                );
            }
        }
    }
}
