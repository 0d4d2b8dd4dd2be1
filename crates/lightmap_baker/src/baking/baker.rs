//! Bake session orchestration
//!
//! [`LightmapBaker`] owns everything a bake needs: allocated regions,
//! transient baking scenes, the committed occlusion scene, and the graphics
//! device. It walks the stages in order. The session releases the
//! acceleration structure and any remaining baking scenes when it is
//! dropped, whether the bake finished or was abandoned mid-way.

use crate::assets::{Model, ResourceCache};
use crate::baking::gbuffer::{self, BakingInstance, BakingScene, GBuffer, LIGHTMAP_OFFSET_PARAM};
use crate::baking::geometry::{build_import_cache, create_geometry_records, GeometryRecord};
use crate::baking::raytracer::{RayPacket, RaytracerScene, RaytracerSceneBuilder};
use crate::baking::regions::{allocate_regions, LightReceiver, LightmapDesc};
use crate::baking::{BakeError, BakingSettings, RAY_BIAS, RAY_PACKET_SIZE};
use crate::foundation::math::Vec3;
use crate::render::{Camera, RenderPath, SoftwareDevice};
use crate::scene::{LightType, NodeId, Scene, AABB};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// G-buffer outputs the baking render path must declare
const REQUIRED_GBUFFER_OUTPUTS: [&str; 4] =
    ["position", "smoothposition", "facenormal", "smoothnormal"];

/// Baked lighting for one atlas
///
/// Flat row-major RGBA buffer, one value per texel. Texels never covered by
/// geometry keep the default white (fully lit, no shadow); covered texels
/// hold `white × diffuse × shadow` in RGB with alpha left at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct LightmapBakedData {
    /// Atlas width in texels
    pub width: u32,

    /// Atlas height in texels
    pub height: u32,

    /// Row-major RGBA texels
    pub texels: Vec<[f32; 4]>,
}

impl LightmapBakedData {
    /// The default texel value before ray casting overwrites it
    pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

    /// Create a buffer with every texel set to white
    pub fn new_white(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            texels: vec![Self::WHITE; (width * height) as usize],
        }
    }

    /// Read one texel
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        self.texels[(y * self.width + x) as usize]
    }

    /// Raw byte view for downstream texture packaging
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}

/// A lightmap bake session
pub struct LightmapBaker {
    settings: BakingSettings,
    receivers: Vec<LightReceiver>,
    obstacles: Vec<NodeId>,
    lights: Vec<NodeId>,
    lightmaps: Vec<LightmapDesc>,
    raytracer: Option<RaytracerScene>,
    max_ray_length: f32,
    device: SoftwareDevice,
    render_path: RenderPath,
}

impl LightmapBaker {
    /// Create a bake session
    ///
    /// Validates the settings, resolves the named baking resources,
    /// allocates a lightmap region for every receiver with a renderable
    /// component and builds the per-atlas baking scenes. Nothing is
    /// allocated if validation fails.
    pub fn new(
        settings: BakingSettings,
        scene: &Scene,
        receivers: &[NodeId],
        obstacles: Vec<NodeId>,
        lights: Vec<NodeId>,
        cache: &ResourceCache,
    ) -> Result<Self, BakeError> {
        settings.validate()?;

        let render_path = cache.render_path(&settings.baking_render_path)?;
        for output in REQUIRED_GBUFFER_OUTPUTS {
            if !render_path.has_output(output) {
                return Err(BakeError::RenderPathOutputMissing {
                    render_path: render_path.name.clone(),
                    output: output.to_string(),
                });
            }
        }
        let baking_material = cache.material(&settings.baking_material)?;

        let mut lightmaps = Vec::new();
        let receivers = allocate_regions(&settings, scene, receivers, &mut lightmaps);

        let mut receiver_bounds = AABB::empty();
        for receiver in &receivers {
            if receiver.region.is_none() {
                continue;
            }
            if let Some(bounds) = scene
                .node(receiver.node)
                .and_then(|node| node.world_bounding_box())
            {
                receiver_bounds.merge(&bounds);
            }
        }
        let max_ray_length = if receiver_bounds.is_empty() {
            0.0
        } else {
            receiver_bounds.size().magnitude()
        };

        if !lightmaps.is_empty() {
            let camera = Camera::fit_bounding_box(&receiver_bounds);
            for desc in &mut lightmaps {
                desc.baking_scene = Some(BakingScene {
                    camera: camera.clone(),
                    instances: Vec::new(),
                });
            }

            for receiver in &receivers {
                let Some(region) = &receiver.region else {
                    continue;
                };
                let Some(node) = scene.node(receiver.node) else {
                    continue;
                };
                let Some(mesh) = node.static_mesh() else {
                    continue;
                };

                let mut material = baking_material.clone();
                material.set_shader_parameter(LIGHTMAP_OFFSET_PARAM, region.scale_offset());

                let desc = &mut lightmaps[region.lightmap_index as usize];
                if let Some(baking_scene) = desc.baking_scene.as_mut() {
                    baking_scene.instances.push(BakingInstance {
                        model: Arc::clone(&mesh.model),
                        world: node.world_matrix(),
                        material,
                    });
                }
            }
        }

        info!(
            "bake session: {} receivers across {} lightmaps, {} obstacles",
            receivers.len(),
            lightmaps.len(),
            obstacles.len()
        );

        Ok(Self {
            settings,
            receivers,
            obstacles,
            lights,
            lightmaps,
            raytracer: None,
            max_ray_length,
            device: SoftwareDevice::new(),
            render_path,
        })
    }

    /// Number of atlases allocated for this bake
    pub fn num_lightmaps(&self) -> u32 {
        self.lightmaps.len() as u32
    }

    /// Dimensions of one atlas
    pub fn lightmap_size(&self, index: u32) -> Option<(u32, u32)> {
        self.lightmaps
            .get(index as usize)
            .map(|desc| (desc.width(), desc.height()))
    }

    /// The receivers and their allocated regions
    pub fn receivers(&self) -> &[LightReceiver] {
        &self.receivers
    }

    /// The committed occlusion scene, if cooked
    pub fn raytracer(&self) -> Option<&RaytracerScene> {
        self.raytracer.as_ref()
    }

    /// The resolved baking render configuration
    pub fn render_path(&self) -> &RenderPath {
        &self.render_path
    }

    /// Mutable access to the graphics device (diagnostics and tests)
    pub fn graphics_mut(&mut self) -> &mut SoftwareDevice {
        &mut self.device
    }

    /// Build the occlusion scene from the obstacle nodes
    ///
    /// Obstacle models are imported once per distinct asset and their
    /// world-space batches created one parallel task per node; the commit at
    /// the end is the single serialization point.
    pub fn cook_raytracing_scene(&mut self, scene: &Scene) {
        let mut distinct: HashMap<String, Arc<Model>> = HashMap::new();
        let mut obstacle_geometry = Vec::new();

        for &node_id in &self.obstacles {
            let Some(node) = scene.node(node_id) else {
                continue;
            };
            let Some(mesh) = node.static_mesh() else {
                continue;
            };
            distinct
                .entry(mesh.model.name.clone())
                .or_insert_with(|| Arc::clone(&mesh.model));
            obstacle_geometry.push((node_id, mesh.model.name.clone(), node.world_matrix()));
        }

        let models: Vec<Arc<Model>> = distinct.into_values().collect();
        let import_cache = build_import_cache(&models);

        let records: Vec<GeometryRecord> = obstacle_geometry
            .par_iter()
            .flat_map_iter(|(node_id, model_name, world)| {
                create_geometry_records(&import_cache[model_name], world, *node_id, 0)
            })
            .collect();

        let mut builder = RaytracerSceneBuilder::new();
        for record in &records {
            builder.attach_geometry(record);
        }

        let raytracer = builder.commit();
        info!(
            "raytracing scene cooked: {} triangles",
            raytracer.triangle_count()
        );
        self.raytracer = Some(raytracer);
    }

    /// Capture the G-buffer for one atlas
    ///
    /// On success the atlas's transient baking scene is discarded and the
    /// owned [`GBuffer`] returned. If the device cannot begin a frame the
    /// scene is kept so the caller may retry or abort.
    pub fn render_gbuffer(&mut self, index: u32) -> Result<GBuffer, BakeError> {
        let desc = self
            .lightmaps
            .get_mut(index as usize)
            .ok_or(BakeError::UnknownLightmap(index))?;
        let baking_scene = desc
            .baking_scene
            .as_ref()
            .ok_or(BakeError::BakingSceneConsumed(index))?;

        let width = desc.packer.width();
        let height = desc.packer.height();
        let gbuffer =
            gbuffer::render_gbuffer(&mut self.device, baking_scene, index, width, height)?;

        desc.baking_scene = None;
        Ok(gbuffer)
    }

    /// Cast shadow rays over a captured G-buffer and return the baked atlas
    ///
    /// Requires a cooked raytracing scene. The atlas height is partitioned
    /// into `num_parallel_chunks` bands (the last band absorbs any
    /// remainder); bands write disjoint row ranges and the call blocks until
    /// every band finishes. Scenes without a directional light produce zero
    /// diffuse everywhere and no rays are cast.
    pub fn bake_lightmap(
        &self,
        scene: &Scene,
        gbuffer: &GBuffer,
    ) -> Result<LightmapBakedData, BakeError> {
        let raytracer = self
            .raytracer
            .as_ref()
            .ok_or(BakeError::RaytracingSceneNotCooked)?;

        let width = gbuffer.width as usize;
        let height = gbuffer.height as usize;
        let mut data = LightmapBakedData::new_white(gbuffer.width, gbuffer.height);

        // First directional light wins; further lights are ignored.
        let mut light_direction = None;
        for &light_id in &self.lights {
            if let Some(component) = scene.node(light_id).and_then(|node| node.light()) {
                if component.light.light_type == LightType::Directional {
                    light_direction = Some(component.light.direction);
                    break;
                }
            }
        }
        let ray_direction = light_direction.map(|direction| -direction.normalize());

        let num_chunks = self.settings.num_parallel_chunks as usize;
        let chunk_rows = (height / num_chunks).max(1);

        let mut bands: Vec<(usize, &mut [[f32; 4]])> = Vec::new();
        let mut rest: &mut [[f32; 4]] = &mut data.texels;
        let mut row = 0usize;
        for chunk in 0..num_chunks {
            if row >= height {
                break;
            }
            let end = if chunk + 1 == num_chunks {
                height
            } else {
                (row + chunk_rows).min(height)
            };
            let (band, tail) = rest.split_at_mut((end - row) * width);
            bands.push((row, band));
            rest = tail;
            row = end;
        }

        bands.into_par_iter().for_each(|(start_row, rows)| {
            self.bake_band(raytracer, gbuffer, ray_direction, start_row, rows);
        });

        debug!(
            "baked lightmap {}: {}x{}",
            gbuffer.lightmap_index, gbuffer.width, gbuffer.height
        );
        Ok(data)
    }

    fn bake_band(
        &self,
        raytracer: &RaytracerScene,
        gbuffer: &GBuffer,
        ray_direction: Option<Vec3>,
        start_row: usize,
        rows: &mut [[f32; 4]],
    ) {
        let width = gbuffer.width as usize;
        let num_packets = width / RAY_PACKET_SIZE;
        let band_height = rows.len() / width;
        let direction = ray_direction.unwrap_or_else(Vec3::zeros);

        for local_y in 0..band_height {
            let y = start_row + local_y;
            for packet_index in 0..num_packets {
                let from_x = packet_index * RAY_PACKET_SIZE;
                let base = y * width + from_x;

                let mut diffuse = [0.0f32; RAY_PACKET_SIZE];
                let mut packet = RayPacket::empty(direction);

                for lane in 0..RAY_PACKET_SIZE {
                    let index = base + lane;
                    let position = gbuffer.positions[index];

                    // Marker zero: background texel, lane stays invalid with
                    // the sentinel no-hit distance.
                    if position.w == 0.0 {
                        continue;
                    }

                    let normal = gbuffer.smooth_normals[index];
                    let smooth_normal = Vec3::new(normal.x, normal.y, normal.z);
                    diffuse[lane] = smooth_normal.dot(&direction).max(0.0);

                    let origin =
                        Vec3::new(position.x, position.y, position.z) + direction * RAY_BIAS;
                    packet.set_ray(lane, origin, self.max_ray_length);
                }

                if packet.valid_count() == 0 {
                    continue;
                }

                let occluded = if ray_direction.is_some() {
                    raytracer.occluded_packet(&packet)
                } else {
                    [false; RAY_PACKET_SIZE]
                };

                for lane in 0..RAY_PACKET_SIZE {
                    if !packet.valid[lane] {
                        continue;
                    }
                    let shadow = if occluded[lane] { 0.0 } else { 1.0 };
                    let value = diffuse[lane] * shadow;
                    rows[local_y * width + from_x + lane] = [value, value, value, 1.0];
                }
            }
        }
    }

    /// Bind baked regions back onto the receivers
    ///
    /// Receivers without a region (nodes that never had a renderable
    /// component) are skipped silently.
    pub fn apply_lightmaps(&self, scene: &mut Scene, base_lightmap_index: u32) {
        for receiver in &self.receivers {
            let Some(region) = &receiver.region else {
                continue;
            };
            let Some(node) = scene.node_mut(receiver.node) else {
                continue;
            };
            let Some(mesh) = node.static_mesh_mut() else {
                continue;
            };

            mesh.lightmap_enabled = true;
            mesh.lightmap_index = base_lightmap_index + region.lightmap_index;
            mesh.lightmap_scale_offset = region.scale_offset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LightmapMeta;
    use crate::foundation::math::Transform;
    use crate::render::GraphicsDevice;
    use crate::render::Material;
    use crate::scene::SceneNode;

    fn cache_with_bake_assets() -> ResourceCache {
        let mut cache = ResourceCache::new();
        let settings = BakingSettings::default();
        cache.insert_material(&settings.baking_material, Material::new(&settings.baking_material));
        cache.insert_render_path(RenderPath::lightmap_gbuffer(&settings.baking_render_path));
        cache
    }

    #[test]
    fn test_invalid_settings_allocate_nothing() {
        let cache = cache_with_bake_assets();
        let mut scene = Scene::new();
        let model = quad_model();
        let receiver = scene.add_node(
            SceneNode::new("r", Transform::identity()).with_static_mesh(model),
        );

        let settings = BakingSettings {
            lightmap_size: 100,
            num_parallel_chunks: 3,
            ..Default::default()
        };

        let result = LightmapBaker::new(settings, &scene, &[receiver], vec![], vec![], &cache);
        assert!(matches!(result, Err(BakeError::InvalidChunkCount { .. })));
    }

    fn quad_model() -> Arc<Model> {
        Arc::new(Model::from_quad("quad", 2.0, LightmapMeta::new((16, 16), 16)))
    }

    #[test]
    fn test_missing_material_fails_initialization() {
        let mut cache = ResourceCache::new();
        let settings = BakingSettings::default();
        cache.insert_render_path(RenderPath::lightmap_gbuffer(&settings.baking_render_path));

        let scene = Scene::new();
        let result = LightmapBaker::new(settings, &scene, &[], vec![], vec![], &cache);
        assert!(matches!(result, Err(BakeError::Resource(_))));
    }

    #[test]
    fn test_render_path_must_declare_gbuffer_outputs() {
        let mut cache = ResourceCache::new();
        let settings = BakingSettings::default();
        cache.insert_material(&settings.baking_material, Material::new(&settings.baking_material));
        cache.insert_render_path(RenderPath::new(
            &settings.baking_render_path,
            vec!["position".to_string()],
        ));

        let scene = Scene::new();
        let result = LightmapBaker::new(settings, &scene, &[], vec![], vec![], &cache);
        assert!(matches!(result, Err(BakeError::RenderPathOutputMissing { .. })));
    }

    #[test]
    fn test_receiver_without_mesh_gets_no_region() {
        let cache = cache_with_bake_assets();
        let mut scene = Scene::new();
        let bare = scene.add_node(SceneNode::new("bare", Transform::identity()));

        let baker = LightmapBaker::new(
            BakingSettings::default(),
            &scene,
            &[bare],
            vec![],
            vec![],
            &cache,
        )
        .expect("valid settings");

        assert_eq!(baker.num_lightmaps(), 0);
        assert!(baker.receivers()[0].region.is_none());
    }

    #[test]
    fn test_bake_requires_cooked_raytracing_scene() {
        let cache = cache_with_bake_assets();
        let mut scene = Scene::new();
        let model = quad_model();
        let receiver = scene.add_node(
            SceneNode::new("r", Transform::identity()).with_static_mesh(model),
        );

        let mut baker = LightmapBaker::new(
            BakingSettings::default(),
            &scene,
            &[receiver],
            vec![],
            vec![],
            &cache,
        )
        .expect("valid settings");

        let gbuffer = baker.render_gbuffer(0).expect("render succeeds");
        let result = baker.bake_lightmap(&scene, &gbuffer);
        assert!(matches!(result, Err(BakeError::RaytracingSceneNotCooked)));
    }

    #[test]
    fn test_baking_scene_is_discarded_after_capture() {
        let cache = cache_with_bake_assets();
        let mut scene = Scene::new();
        let model = quad_model();
        let receiver = scene.add_node(
            SceneNode::new("r", Transform::identity()).with_static_mesh(model),
        );

        let mut baker = LightmapBaker::new(
            BakingSettings::default(),
            &scene,
            &[receiver],
            vec![],
            vec![],
            &cache,
        )
        .expect("valid settings");

        let _gbuffer = baker.render_gbuffer(0).expect("first capture succeeds");
        assert!(matches!(
            baker.render_gbuffer(0),
            Err(BakeError::BakingSceneConsumed(0))
        ));
    }

    #[test]
    fn test_unknown_lightmap_index_is_rejected() {
        let cache = cache_with_bake_assets();
        let scene = Scene::new();
        let mut baker = LightmapBaker::new(
            BakingSettings::default(),
            &scene,
            &[],
            vec![],
            vec![],
            &cache,
        )
        .expect("valid settings");

        assert!(matches!(
            baker.render_gbuffer(5),
            Err(BakeError::UnknownLightmap(5))
        ));
    }

    #[test]
    fn test_device_failure_aborts_capture_and_keeps_scene() {
        let cache = cache_with_bake_assets();
        let mut scene = Scene::new();
        let model = quad_model();
        let receiver = scene.add_node(
            SceneNode::new("r", Transform::identity()).with_static_mesh(model),
        );

        let mut baker = LightmapBaker::new(
            BakingSettings::default(),
            &scene,
            &[receiver],
            vec![],
            vec![],
            &cache,
        )
        .expect("valid settings");

        // Simulate a device that cannot begin a frame
        assert!(baker.graphics_mut().begin_frame().is_ok());
        assert!(matches!(
            baker.render_gbuffer(0),
            Err(BakeError::Render(_))
        ));

        // The baking scene was not consumed; after recovery the capture works
        baker.graphics_mut().end_frame();
        assert!(baker.render_gbuffer(0).is_ok());
    }
}
