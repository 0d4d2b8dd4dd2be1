//! Lightmap region allocation
//!
//! Computes per-receiver texel sizes from the model's UV-density metadata
//! and packs them into atlases, creating new atlases on demand. Objects too
//! large for the configured atlas get a private atlas sized to their own
//! bounds with the width rounded up to the ray-packet multiple.

use crate::baking::gbuffer::BakingScene;
use crate::baking::rect_packer::{Rect, RectPacker};
use crate::baking::{BakingSettings, RAY_PACKET_SIZE};
use crate::foundation::math::{utils, Vec2, Vec4};
use crate::scene::{NodeId, Scene};

/// A receiver's allocated rectangle within an atlas
///
/// The texel rectangle excludes the allocator padding; the UV rectangle is
/// the same region normalized by the owning atlas's actual dimensions, so
/// dedicated oversized atlases still produce UVs inside [0, 1].
#[derive(Debug, Clone)]
pub struct LightmapRegion {
    /// Index of the atlas this region lives in
    pub lightmap_index: u32,

    /// Region rectangle in texels, padding excluded
    pub texel_rect: Rect,

    /// Normalized UV minimum corner
    pub uv_min: Vec2,

    /// Normalized UV maximum corner
    pub uv_max: Vec2,
}

impl LightmapRegion {
    /// Build a region from its texel placement and the owning atlas size
    pub fn new(
        lightmap_index: u32,
        position: (u32, u32),
        size: (u32, u32),
        atlas_size: (u32, u32),
    ) -> Self {
        let texel_rect = Rect::new(position.0, position.1, size.0, size.1);
        let atlas_w = atlas_size.0 as f32;
        let atlas_h = atlas_size.1 as f32;

        Self {
            lightmap_index,
            texel_rect,
            uv_min: Vec2::new(texel_rect.x as f32 / atlas_w, texel_rect.y as f32 / atlas_h),
            uv_max: Vec2::new(
                texel_rect.right() as f32 / atlas_w,
                texel_rect.bottom() as f32 / atlas_h,
            ),
        }
    }

    /// UV scale/offset `(size.x, size.y, offset.x, offset.y)` mapping the
    /// model's [0, 1] lightmap UVs into this region
    pub fn scale_offset(&self) -> Vec4 {
        let size = self.uv_max - self.uv_min;
        Vec4::new(size.x, size.y, self.uv_min.x, self.uv_min.y)
    }
}

/// Pairs a scene node with its allocated region
///
/// Nodes without a static mesh never receive a region; the rest of the
/// pipeline skips them.
#[derive(Debug, Clone)]
pub struct LightReceiver {
    /// The receiver node
    pub node: NodeId,

    /// Allocated region, if the node had a renderable component
    pub region: Option<LightmapRegion>,
}

/// One output atlas: packer state plus its transient baking scene
pub struct LightmapDesc {
    /// Rectangle allocator for this atlas
    pub packer: RectPacker,

    /// Per-atlas baking scene; built after region allocation, discarded once
    /// the atlas's G-buffer has been captured
    pub baking_scene: Option<BakingScene>,
}

impl LightmapDesc {
    fn new(packer: RectPacker) -> Self {
        Self {
            packer,
            baking_scene: None,
        }
    }

    /// Atlas width in texels
    pub fn width(&self) -> u32 {
        self.packer.width()
    }

    /// Atlas height in texels
    pub fn height(&self) -> u32 {
        self.packer.height()
    }
}

/// Texel size a model needs at the configured density
///
/// Scales the unwrapper's chart layout by the ratio of the requested texel
/// density to the authored density, adjusted for the node's world scale and
/// clamped below by `min_lightmap_scale`.
pub fn compute_model_lightmap_size(
    settings: &BakingSettings,
    uv_size: (u32, u32),
    model_density: u32,
    world_scale_factor: f32,
) -> (u32, u32) {
    let rescale = world_scale_factor * settings.texel_density as f32 / model_density as f32;
    let clamped = rescale.max(settings.min_lightmap_scale);

    (
        (uv_size.0 as f32 * clamped).ceil() as u32,
        (uv_size.1 as f32 * clamped).ceil() as u32,
    )
}

/// Allocate one region, extending `lightmaps` with a new atlas on demand
pub fn allocate_region(
    settings: &BakingSettings,
    lightmaps: &mut Vec<LightmapDesc>,
    size: (u32, u32),
) -> LightmapRegion {
    let padding = settings.lightmap_padding;
    let padded = (size.0 + 2 * padding, size.1 + 2 * padding);

    // Try existing atlases in creation order
    for (index, desc) in lightmaps.iter_mut().enumerate() {
        if let Some((x, y)) = desc.packer.allocate(padded.0, padded.1) {
            return LightmapRegion::new(
                index as u32,
                (x + padding, y + padding),
                size,
                (desc.packer.width(), desc.packer.height()),
            );
        }
    }

    let index = lightmaps.len() as u32;

    // Dedicated atlas for a region the configured atlas cannot hold
    if padded.0 > settings.lightmap_size || padded.1 > settings.lightmap_size {
        let width = utils::round_up_to_multiple(size.0, RAY_PACKET_SIZE as u32);
        let height = size.1;

        let mut packer = RectPacker::new(width, height);
        let position = packer
            .allocate(width, height)
            .expect("fresh dedicated atlas always fits itself");
        debug_assert_eq!(position, (0, 0));

        lightmaps.push(LightmapDesc::new(packer));
        return LightmapRegion::new(index, (0, 0), size, (width, height));
    }

    // Fresh full-size atlas; the first padded allocation lands at the origin
    let mut packer = RectPacker::new(settings.lightmap_size, settings.lightmap_size);
    let (x, y) = packer
        .allocate(padded.0, padded.1)
        .expect("padded size was checked against the atlas size");
    debug_assert_eq!((x, y), (0, 0));

    lightmaps.push(LightmapDesc::new(packer));
    LightmapRegion::new(
        index,
        (x + padding, y + padding),
        size,
        (settings.lightmap_size, settings.lightmap_size),
    )
}

/// Allocate regions for every receiver node with a renderable component
pub fn allocate_regions(
    settings: &BakingSettings,
    scene: &Scene,
    receivers: &[NodeId],
    lightmaps: &mut Vec<LightmapDesc>,
) -> Vec<LightReceiver> {
    receivers
        .iter()
        .map(|&node_id| {
            let region = scene.node(node_id).and_then(|node| {
                let mesh = node.static_mesh()?;
                let meta = mesh.model.lightmap_meta;
                let size = compute_model_lightmap_size(
                    settings,
                    meta.uv_size,
                    meta.density,
                    node.transform.uniform_scale_factor(),
                );
                Some(allocate_region(settings, lightmaps, size))
            });

            LightReceiver {
                node: node_id,
                region,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small_settings() -> BakingSettings {
        BakingSettings {
            lightmap_size: 128,
            texel_density: 16,
            min_lightmap_scale: 1.0,
            lightmap_padding: 2,
            num_parallel_chunks: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_model_size_scales_with_density_ratio() {
        let settings = small_settings();
        // Authored at 8 texels/unit, requested 16: charts double
        assert_eq!(
            compute_model_lightmap_size(&settings, (32, 16), 8, 1.0),
            (64, 32)
        );
    }

    #[test]
    fn test_model_size_respects_min_scale() {
        let settings = BakingSettings {
            min_lightmap_scale: 1.0,
            texel_density: 4,
            ..small_settings()
        };
        // Rescale factor would be 0.25; the clamp keeps the authored size
        assert_eq!(
            compute_model_lightmap_size(&settings, (32, 32), 16, 1.0),
            (32, 32)
        );
    }

    #[test]
    fn test_first_region_excludes_padding() {
        let settings = small_settings();
        let mut lightmaps = Vec::new();

        let region = allocate_region(&settings, &mut lightmaps, (32, 32));
        assert_eq!(lightmaps.len(), 1);
        assert_eq!(region.lightmap_index, 0);
        assert_eq!(region.texel_rect, Rect::new(2, 2, 32, 32));
    }

    #[test]
    fn test_exhausted_atlas_spills_into_new_one() {
        let settings = BakingSettings {
            lightmap_padding: 0,
            ..small_settings()
        };
        let mut lightmaps = Vec::new();

        let first = allocate_region(&settings, &mut lightmaps, (128, 128));
        let second = allocate_region(&settings, &mut lightmaps, (128, 128));

        assert_eq!(first.lightmap_index, 0);
        assert_eq!(second.lightmap_index, 1);
        assert_eq!(lightmaps.len(), 2);
    }

    #[test]
    fn test_oversized_region_gets_dedicated_atlas() {
        let settings = small_settings();
        let mut lightmaps = Vec::new();

        let region = allocate_region(&settings, &mut lightmaps, (200, 150));

        // Width rounded up to the ray-packet multiple, height as requested
        assert_eq!(lightmaps[0].width(), 208);
        assert_eq!(lightmaps[0].height(), 150);
        assert_eq!(region.texel_rect, Rect::new(0, 0, 200, 150));

        // UVs stay normalized to the dedicated atlas
        assert!(region.uv_min.x >= 0.0 && region.uv_min.y >= 0.0);
        assert!(region.uv_max.x <= 1.0 && region.uv_max.y <= 1.0);
        assert_relative_eq!(region.uv_max.y, 1.0);
    }

    #[test]
    fn test_scale_offset_matches_uv_rect() {
        let region = LightmapRegion::new(0, (32, 64), (64, 32), (128, 128));
        let scale_offset = region.scale_offset();

        assert_relative_eq!(scale_offset.x, 0.5); // 64 / 128
        assert_relative_eq!(scale_offset.y, 0.25); // 32 / 128
        assert_relative_eq!(scale_offset.z, 0.25); // 32 / 128
        assert_relative_eq!(scale_offset.w, 0.5); // 64 / 128
    }
}
