//! # Lightmap Baker
//!
//! A static lightmap baking pipeline written in Rust.
//!
//! Given a scene's receiver, obstacle, and light nodes, the baker computes
//! per-texel diffuse lighting and hard-shadow occlusion into one or more
//! lightmap atlases, then binds atlas indices and UV scale/offsets back onto
//! the receivers for runtime sampling.
//!
//! ## Pipeline
//!
//! - **Region allocation**: per-receiver texel sizes from UV-density
//!   metadata, packed into fixed-size atlases (oversized objects get
//!   dedicated atlases).
//! - **Raytracing scene cook**: obstacle geometry imported in parallel and
//!   committed into an octree for occlusion queries.
//! - **G-buffer capture**: each atlas's baking scene rendered off-screen to
//!   per-texel position and normal buffers.
//! - **Ray casting**: shadow rays cast in 16-wide packets over parallel
//!   horizontal bands, producing `white × diffuse × shadow` per texel.
//! - **Result binding**: lightmap index and UV scale/offset written back to
//!   receiver components.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lightmap_baker::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = BakingSettings::default();
//!
//!     let mut cache = ResourceCache::new();
//!     cache.insert_material(&settings.baking_material, Material::new("bake"));
//!     cache.insert_render_path(RenderPath::lightmap_gbuffer(&settings.baking_render_path));
//!     let model = cache.insert_model(Model::from_quad(
//!         "floor",
//!         8.0,
//!         LightmapMeta::new((64, 64), 16),
//!     ));
//!
//!     let mut scene = Scene::new();
//!     let floor = scene.add_node(
//!         SceneNode::new("floor", Transform::identity()).with_static_mesh(model),
//!     );
//!     let sun = scene.add_node(
//!         SceneNode::new("sun", Transform::identity())
//!             .with_light(Light::directional(Vec3::new(0.2, -0.8, 0.4))),
//!     );
//!
//!     let mut baker =
//!         LightmapBaker::new(settings, &scene, &[floor], vec![], vec![sun], &cache)?;
//!     baker.cook_raytracing_scene(&scene);
//!
//!     for index in 0..baker.num_lightmaps() {
//!         let gbuffer = baker.render_gbuffer(index)?;
//!         let baked = baker.bake_lightmap(&scene, &gbuffer)?;
//!         // hand `baked` to the texture packaging step
//!         let _ = baked.as_bytes();
//!     }
//!     baker.apply_lightmaps(&mut scene, 0);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod baking;
pub mod foundation;
pub mod render;
pub mod scene;

pub use baking::{BakeError, BakingSettings, LightmapBakedData, LightmapBaker};

/// Common imports for baker users
pub mod prelude {
    pub use crate::{
        assets::{LightmapMeta, Model, ObjLoader, ResourceCache},
        baking::{
            BakeError, BakingSettings, GBuffer, LightmapBakedData, LightmapBaker, LightmapRegion,
        },
        foundation::math::{Mat4, Transform, Vec2, Vec3, Vec4},
        render::{Material, RenderPath},
        scene::{Light, LightType, NodeId, Scene, SceneNode},
    };
}
