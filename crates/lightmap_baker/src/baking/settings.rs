//! Baking configuration

use crate::baking::{BakeError, RAY_PACKET_SIZE};
use serde::{Deserialize, Serialize};

/// Immutable settings supplied once per bake
///
/// `lightmap_size` must be divisible by both `num_parallel_chunks` and the
/// ray packet width; violating settings fail [`validate`](Self::validate) and
/// the baker refuses to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BakingSettings {
    /// Atlas edge length in texels (power of two recommended)
    pub lightmap_size: u32,

    /// Target texel density in texels per world unit
    pub texel_density: u32,

    /// Lower bound on the per-model rescale factor
    pub min_lightmap_scale: f32,

    /// Padding in texels around each packed region, kept out of the usable
    /// rect; exists only to stop bilinear bleed between neighbors
    pub lightmap_padding: u32,

    /// Number of horizontal bands the ray caster processes in parallel
    pub num_parallel_chunks: u32,

    /// Name of the baking render configuration
    pub baking_render_path: String,

    /// Name of the baking material
    pub baking_material: String,
}

impl Default for BakingSettings {
    fn default() -> Self {
        Self {
            lightmap_size: 512,
            texel_density: 16,
            min_lightmap_scale: 1.0,
            lightmap_padding: 2,
            num_parallel_chunks: 4,
            baking_render_path: "renderpaths/lightmap_gbuffer".to_string(),
            baking_material: "materials/lightmap_bake".to_string(),
        }
    }
}

impl BakingSettings {
    /// Check the size invariants
    pub fn validate(&self) -> Result<(), BakeError> {
        if self.num_parallel_chunks == 0
            || self.lightmap_size % self.num_parallel_chunks != 0
        {
            return Err(BakeError::InvalidChunkCount {
                size: self.lightmap_size,
                chunks: self.num_parallel_chunks,
            });
        }
        if self.lightmap_size % RAY_PACKET_SIZE as u32 != 0 {
            return Err(BakeError::InvalidPacketAlignment {
                size: self.lightmap_size,
                packet: RAY_PACKET_SIZE as u32,
            });
        }
        Ok(())
    }

    /// Parse settings from TOML, falling back to defaults for absent fields
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
