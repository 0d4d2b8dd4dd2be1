//! End-to-end baking pipeline tests
//!
//! Small hand-built scenes run through every stage: region allocation,
//! raytracing-scene cook, G-buffer capture, ray casting, and result binding.

use crate::assets::{LightmapMeta, Model, ResourceCache};
use crate::baking::{BakingSettings, LightmapBakedData, LightmapBaker};
use crate::foundation::math::{Transform, Vec3};
use crate::render::{Material, RenderPath};
use crate::scene::{Light, NodeId, Scene, SceneNode};
use std::sync::Arc;

/// Settings for the single-atlas scenario: one 256-texel atlas, no padding,
/// one ray-casting band
fn single_chunk_settings() -> BakingSettings {
    BakingSettings {
        lightmap_size: 256,
        texel_density: 16,
        min_lightmap_scale: 1.0,
        lightmap_padding: 0,
        num_parallel_chunks: 1,
        ..Default::default()
    }
}

fn bake_cache(settings: &BakingSettings) -> ResourceCache {
    let mut cache = ResourceCache::new();
    cache.insert_material(
        &settings.baking_material,
        Material::new(&settings.baking_material),
    );
    cache.insert_render_path(RenderPath::lightmap_gbuffer(&settings.baking_render_path));
    cache
}

/// Quad whose chart fills a whole 256-atlas at the configured density
fn full_atlas_quad() -> Arc<Model> {
    Arc::new(Model::from_quad(
        "receiver_quad",
        2.0,
        LightmapMeta::new((256, 256), 16),
    ))
}

struct TestWorld {
    scene: Scene,
    receiver: NodeId,
    obstacles: Vec<NodeId>,
    lights: Vec<NodeId>,
}

/// Flat quad at the origin; optional overhead light; optional occluding wall
/// one unit below it on the baking axis
fn build_world(with_light: bool, with_wall: bool) -> TestWorld {
    let mut scene = Scene::new();

    let receiver = scene.add_node(
        SceneNode::new("receiver", Transform::identity()).with_static_mesh(full_atlas_quad()),
    );

    let mut obstacles = Vec::new();
    if with_wall {
        let wall = Arc::new(Model::from_quad(
            "wall",
            10.0,
            LightmapMeta::new((16, 16), 16),
        ));
        obstacles.push(scene.add_node(
            SceneNode::new("wall", Transform::from_position(Vec3::new(0.0, 0.0, -1.0)))
                .with_static_mesh(wall),
        ));
    }

    let mut lights = Vec::new();
    if with_light {
        // Light travels along +Z, perpendicular to the quad's -Z facing
        lights.push(scene.add_node(
            SceneNode::new("sun", Transform::identity())
                .with_light(Light::directional(Vec3::new(0.0, 0.0, 1.0))),
        ));
    }

    TestWorld {
        scene,
        receiver,
        obstacles,
        lights,
    }
}

fn run_bake(world: &TestWorld, settings: BakingSettings) -> Vec<LightmapBakedData> {
    let cache = bake_cache(&settings);
    let mut baker = LightmapBaker::new(
        settings,
        &world.scene,
        &[world.receiver],
        world.obstacles.clone(),
        world.lights.clone(),
        &cache,
    )
    .expect("settings are valid");

    baker.cook_raytracing_scene(&world.scene);

    (0..baker.num_lightmaps())
        .map(|index| {
            let gbuffer = baker.render_gbuffer(index).expect("gbuffer capture succeeds");
            baker
                .bake_lightmap(&world.scene, &gbuffer)
                .expect("bake succeeds")
        })
        .collect()
}

#[test]
fn test_unoccluded_quad_bakes_uniform_white() {
    let world = build_world(true, false);
    let baked = run_bake(&world, single_chunk_settings());

    assert_eq!(baked.len(), 1);
    let data = &baked[0];
    assert_eq!((data.width, data.height), (256, 256));

    // Perpendicular light, no obstacles: diffuse = 1 and shadow = 1 on every
    // occupied texel, default white everywhere else. Uniformly white.
    assert!(data
        .texels
        .iter()
        .all(|texel| *texel == LightmapBakedData::WHITE));
}

#[test]
fn test_wall_shadows_every_receiver_texel() {
    let world = build_world(true, true);
    let baked = run_bake(&world, single_chunk_settings());

    let data = &baked[0];
    // The quad's chart fills the atlas, so interior texels are all occupied
    // and all behind the wall.
    for y in [1, 64, 128, 200, 254] {
        for x in [1, 64, 128, 200, 254] {
            assert_eq!(data.texel(x, y), [0.0, 0.0, 0.0, 1.0], "texel {x},{y}");
        }
    }
}

#[test]
fn test_scene_without_directional_light_bakes_black() {
    let world = build_world(false, false);
    let baked = run_bake(&world, single_chunk_settings());

    // Zero diffuse everywhere geometry is present; background stays white.
    let data = &baked[0];
    assert_eq!(data.texel(128, 128), [0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_bake_is_bit_identical_across_runs() {
    let world = build_world(true, true);

    let first = run_bake(&world, single_chunk_settings());
    let second = run_bake(&world, single_chunk_settings());

    assert_eq!(first, second);
}

#[test]
fn test_remainder_rows_are_processed_with_uneven_bands() {
    // Oversized receiver: dedicated 272x260 atlas whose height does not
    // divide by the chunk count; the last band must absorb the remainder.
    let settings = BakingSettings {
        lightmap_size: 128,
        texel_density: 16,
        min_lightmap_scale: 1.0,
        lightmap_padding: 0,
        num_parallel_chunks: 8,
        ..Default::default()
    };

    let mut scene = Scene::new();
    let model = Arc::new(Model::from_quad(
        "big_quad",
        2.0,
        LightmapMeta::new((260, 260), 16),
    ));
    let receiver =
        scene.add_node(SceneNode::new("receiver", Transform::identity()).with_static_mesh(model));
    let light = scene.add_node(
        SceneNode::new("sun", Transform::identity())
            .with_light(Light::directional(Vec3::new(0.0, 0.0, 1.0))),
    );

    let world = TestWorld {
        scene,
        receiver,
        obstacles: vec![],
        lights: vec![light],
    };
    let baked = run_bake(&world, settings);

    let data = &baked[0];
    assert_eq!((data.width, data.height), (272, 260));

    // 260 / 8 = 32 rows per band; rows 256..260 are the remainder. The
    // chart spans x in 0..260, so occupied texels in the last rows must have
    // been overwritten with lit values, not left at the default.
    assert_eq!(data.texel(10, 258), [1.0, 1.0, 1.0, 1.0]);
    // The rounded-up dedicated width leaves background columns past x = 260
    assert_eq!(data.texel(266, 258), LightmapBakedData::WHITE);
}

#[test]
fn test_two_receivers_share_one_atlas() {
    let settings = BakingSettings {
        lightmap_size: 256,
        texel_density: 16,
        min_lightmap_scale: 1.0,
        lightmap_padding: 0,
        num_parallel_chunks: 4,
        ..Default::default()
    };

    let mut scene = Scene::new();
    let model = Arc::new(Model::from_quad(
        "small_quad",
        2.0,
        LightmapMeta::new((64, 64), 16),
    ));

    let receiver_a = scene.add_node(
        SceneNode::new("a", Transform::from_position(Vec3::new(-2.0, 0.0, 0.0)))
            .with_static_mesh(Arc::clone(&model)),
    );
    let receiver_b = scene.add_node(
        SceneNode::new("b", Transform::from_position(Vec3::new(2.0, 0.0, 0.0)))
            .with_static_mesh(model),
    );
    // Angled light: occupied texels bake to cos(45°), background stays 1.0
    let light = scene.add_node(
        SceneNode::new("sun", Transform::identity())
            .with_light(Light::directional(Vec3::new(0.0, 1.0, 1.0))),
    );

    let cache = bake_cache(&settings);
    let mut baker = LightmapBaker::new(
        settings,
        &scene,
        &[receiver_a, receiver_b],
        vec![],
        vec![light],
        &cache,
    )
    .expect("settings are valid");

    assert_eq!(baker.num_lightmaps(), 1);
    let regions: Vec<_> = baker
        .receivers()
        .iter()
        .map(|receiver| receiver.region.clone().expect("both receivers have regions"))
        .collect();
    assert_eq!(regions[0].texel_rect.x, 0);
    assert_eq!(regions[1].texel_rect.x, 64);

    baker.cook_raytracing_scene(&scene);
    let gbuffer = baker.render_gbuffer(0).expect("capture succeeds");
    let data = baker.bake_lightmap(&scene, &gbuffer).expect("bake succeeds");

    let expected = 0.5f32.sqrt();
    for (x, y) in [(32, 32), (96, 32)] {
        let texel = data.texel(x, y);
        assert!(
            (texel[0] - expected).abs() < 1.0e-3,
            "occupied texel {x},{y} = {texel:?}"
        );
    }
    // Outside both regions nothing was rasterized
    assert_eq!(data.texel(32, 200), LightmapBakedData::WHITE);
    assert_eq!(data.texel(200, 32), LightmapBakedData::WHITE);
}

#[test]
fn test_binder_writes_exact_scale_offset() {
    let world = build_world(true, false);
    let settings = single_chunk_settings();
    let cache = bake_cache(&settings);

    let mut scene = world.scene;
    let bare = scene.add_node(SceneNode::new("bare", Transform::identity()));

    let baker = LightmapBaker::new(
        settings,
        &scene,
        &[world.receiver, bare],
        vec![],
        world.lights.clone(),
        &cache,
    )
    .expect("settings are valid");

    baker.apply_lightmaps(&mut scene, 7);

    let receiver_region = baker.receivers()[0]
        .region
        .clone()
        .expect("receiver has a region");
    let mesh = scene
        .node(world.receiver)
        .unwrap()
        .static_mesh()
        .expect("receiver keeps its mesh");

    assert!(mesh.lightmap_enabled);
    assert_eq!(mesh.lightmap_index, 7 + receiver_region.lightmap_index);
    assert_eq!(mesh.lightmap_scale_offset, receiver_region.scale_offset());

    // The bare node has no mesh to bind to; nothing observable changes
    assert!(scene.node(bare).unwrap().static_mesh().is_none());
}
