//! Static lightmap baking pipeline
//!
//! The pipeline runs in strictly ordered stages per bake session:
//!
//! 1. [`LightmapBaker::new`] validates settings, allocates atlas regions for
//!    every receiver and builds the per-atlas baking scenes.
//! 2. [`LightmapBaker::cook_raytracing_scene`] imports obstacle geometry in
//!    parallel and commits the occlusion octree.
//! 3. Per atlas, [`LightmapBaker::render_gbuffer`] captures the G-buffer and
//!    [`LightmapBaker::bake_lightmap`] consumes it, casting shadow rays in
//!    parallel bands.
//! 4. [`LightmapBaker::apply_lightmaps`] binds the results back onto the
//!    receivers.
//!
//! Stage 3's data dependency is enforced by ownership: `bake_lightmap` takes
//! the [`GBuffer`] value `render_gbuffer` returned, so baking an atlas that
//! was never rendered does not compile.

mod baker;
mod gbuffer;
mod geometry;
mod rect_packer;
mod regions;
mod settings;

pub mod raytracer;

#[cfg(test)]
mod pipeline_tests;

pub use baker::{LightmapBakedData, LightmapBaker};
pub use gbuffer::{BakingInstance, BakingScene, GBuffer, LIGHTMAP_OFFSET_PARAM};
pub use geometry::{
    build_import_cache, create_geometry_records, import_model, GeometryRecord, ImportCache,
    ImportedLod, ImportedModel,
};
pub use raytracer::{RayPacket, RaytracerScene, RaytracerSceneBuilder};
pub use rect_packer::{Rect, RectPacker};
pub use regions::{
    allocate_region, allocate_regions, compute_model_lightmap_size, LightReceiver, LightmapDesc,
    LightmapRegion,
};
pub use settings::BakingSettings;

use crate::assets::AssetError;
use crate::render::RenderError;
use thiserror::Error;

/// Width of one occlusion ray packet in texels
pub const RAY_PACKET_SIZE: usize = 16;

/// Self-intersection bias applied to shadow-ray origins, in world units
pub const RAY_BIAS: f32 = 0.001;

/// Errors produced by the baking pipeline
#[derive(Debug, Error)]
pub enum BakeError {
    /// `lightmap_size` does not divide evenly into the parallel chunks
    #[error("lightmap size {size} is not divisible by {chunks} parallel chunks")]
    InvalidChunkCount {
        /// Configured atlas size
        size: u32,
        /// Configured chunk count
        chunks: u32,
    },

    /// `lightmap_size` does not divide evenly into ray packets
    #[error("lightmap size {size} is not divisible by the ray packet width {packet}")]
    InvalidPacketAlignment {
        /// Configured atlas size
        size: u32,
        /// Ray packet width
        packet: u32,
    },

    /// A named baking resource could not be resolved
    #[error("missing baking resource: {0}")]
    Resource(#[from] AssetError),

    /// The configured render path does not declare a required G-buffer output
    #[error("render path {render_path} does not declare output {output}")]
    RenderPathOutputMissing {
        /// Render path name
        render_path: String,
        /// The missing output attachment
        output: String,
    },

    /// A lightmap index outside the allocated atlases was requested
    #[error("unknown lightmap index {0}")]
    UnknownLightmap(u32),

    /// The atlas's transient baking scene was already consumed by a capture
    #[error("baking scene for lightmap {0} was already captured")]
    BakingSceneConsumed(u32),

    /// `bake_lightmap` was called before the raytracing scene was cooked
    #[error("raytracing scene has not been cooked")]
    RaytracingSceneNotCooked,

    /// The graphics device failed to begin a frame
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}
