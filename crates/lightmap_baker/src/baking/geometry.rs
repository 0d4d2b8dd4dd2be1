//! Geometry import for occlusion testing
//!
//! Converts renderable models into neutral triangle batches the raytracer
//! can ingest. Import is split the way the bake pipeline consumes it: a
//! model-space import cached per distinct asset (many obstacle nodes share
//! meshes), then a world-space batch per (node, geometry, LOD) derived from
//! the cached import and the node's world transform. Both steps are pure
//! functions and parallelize across assets and nodes respectively.

use crate::assets::Model;
use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::scene::NodeId;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Model-space triangle batch for one (geometry, LOD) pair
#[derive(Debug, Clone)]
pub struct ImportedLod {
    /// Geometry index within the model
    pub geometry_index: u32,

    /// LOD index within the geometry
    pub lod_index: u32,

    /// Vertex positions in model space
    pub positions: Vec<Vec3>,

    /// Triangle indices into `positions`
    pub triangles: Vec<[u32; 3]>,
}

/// Neutral import of a whole model, cached per asset
#[derive(Debug, Clone)]
pub struct ImportedModel {
    /// Source asset name
    pub name: String,

    /// All (geometry, LOD) triangle batches of the model
    pub lods: Vec<ImportedLod>,
}

/// Convert a model into its neutral triangle batches (model space)
pub fn import_model(model: &Model) -> ImportedModel {
    let mut lods = Vec::new();

    for (geometry_index, geometry) in model.geometries.iter().enumerate() {
        for (lod_index, lod) in geometry.lods.iter().enumerate() {
            let positions = lod
                .vertices
                .iter()
                .map(|vertex| Vec3::from(vertex.position))
                .collect();

            let triangles = lod
                .indices
                .chunks_exact(3)
                .map(|tri| [tri[0], tri[1], tri[2]])
                .collect();

            lods.push(ImportedLod {
                geometry_index: geometry_index as u32,
                lod_index: lod_index as u32,
                positions,
                triangles,
            });
        }
    }

    ImportedModel {
        name: model.name.clone(),
        lods,
    }
}

/// Import cache keyed by asset name
pub type ImportCache = HashMap<String, Arc<ImportedModel>>;

/// Import a deduplicated set of models in parallel, one task per asset
pub fn build_import_cache(models: &[Arc<Model>]) -> ImportCache {
    models
        .par_iter()
        .map(|model| (model.name.clone(), Arc::new(import_model(model))))
        .collect()
}

/// World-space triangle batch ready for insertion into the raytracer
///
/// Keyed by (node, geometry index, LOD index); consumed immediately by the
/// acceleration-structure builder.
#[derive(Debug, Clone)]
pub struct GeometryRecord {
    /// Obstacle node the batch came from
    pub node: NodeId,

    /// Geometry index within the node's model
    pub geometry_index: u32,

    /// LOD index the batch was taken from
    pub lod_index: u32,

    /// Vertex positions in world space
    pub positions: Vec<Vec3>,

    /// Triangle indices into `positions`
    pub triangles: Vec<[u32; 3]>,
}

/// Build world-space batches for one obstacle node from its cached import
///
/// Only the selected LOD of each geometry is emitted; the record keeps the
/// LOD index so the raytracer key stays (node, geometry, LOD).
pub fn create_geometry_records(
    imported: &ImportedModel,
    world: &Mat4,
    node: NodeId,
    selected_lod: u32,
) -> Vec<GeometryRecord> {
    imported
        .lods
        .iter()
        .filter(|lod| lod.lod_index == selected_lod)
        .map(|lod| {
            let positions = lod
                .positions
                .iter()
                .map(|position| {
                    world
                        .transform_point(&Point3::from(*position))
                        .coords
                })
                .collect();

            GeometryRecord {
                node,
                geometry_index: lod.geometry_index,
                lod_index: lod.lod_index,
                positions,
                triangles: lod.triangles.clone(),
            }
        })
        .collect()
}
