//! Asset types and the resource cache
//!
//! Named assets (models, materials, render paths) are resolved through a
//! [`ResourceCache`] by string identifier. Asset production (exporters, UV
//! unwrappers, material authoring) is external; the cache only stores and
//! hands out what the caller registered.

pub mod model;
pub mod obj_loader;

pub use model::{Geometry, GeometryLod, LightmapMeta, Model, ModelVertex};
pub use obj_loader::{ObjError, ObjLoader};

use crate::render::{Material, RenderPath};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced when resolving named assets
#[derive(Debug, Error)]
pub enum AssetError {
    /// No asset with the requested name is registered
    #[error("asset not found: {0}")]
    NotFound(String),
}

/// Cache of named assets
///
/// Models are shared via `Arc` because many scene nodes typically reference
/// the same mesh; materials and render paths are cloned out on lookup since
/// the baker specializes a material per receiver anyway.
#[derive(Default)]
pub struct ResourceCache {
    models: HashMap<String, Arc<Model>>,
    materials: HashMap<String, Material>,
    render_paths: HashMap<String, RenderPath>,
}

impl ResourceCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own name, returning the shared handle
    pub fn insert_model(&mut self, model: Model) -> Arc<Model> {
        let handle = Arc::new(model);
        self.models.insert(handle.name.clone(), Arc::clone(&handle));
        handle
    }

    /// Register a material under a name
    pub fn insert_material(&mut self, name: impl Into<String>, material: Material) {
        self.materials.insert(name.into(), material);
    }

    /// Register a render path under its own name
    pub fn insert_render_path(&mut self, render_path: RenderPath) {
        self.render_paths.insert(render_path.name.clone(), render_path);
    }

    /// Resolve a model by name
    pub fn model(&self, name: &str) -> Result<Arc<Model>, AssetError> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    /// Resolve a material by name
    pub fn material(&self, name: &str) -> Result<Material, AssetError> {
        self.materials
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    /// Resolve a render path by name
    pub fn render_path(&self, name: &str) -> Result<RenderPath, AssetError> {
        self.render_paths
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}
