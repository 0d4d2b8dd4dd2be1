//! Light sources

use crate::foundation::math::Vec3;

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Directional light (like sunlight)
    Directional,
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
}

/// Light source
///
/// The baker consumes only directional lights for shadow rays; point and
/// spot lights are carried through the scene model untouched so a scene
/// authored for runtime lighting can be baked without stripping them first.
#[derive(Debug, Clone)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// Light position (for point/spot lights)
    pub position: Vec3,
    /// Light direction (for directional/spot lights)
    pub direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Light range (for point/spot lights)
    pub range: f32,
}

impl Light {
    /// Create a directional light
    pub fn directional(direction: Vec3) -> Self {
        Self {
            light_type: LightType::Directional,
            position: Vec3::zeros(),
            direction: direction.normalize(),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            range: 0.0,
        }
    }

    /// Create a point light
    pub fn point(position: Vec3, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            position,
            direction: Vec3::zeros(),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            range,
        }
    }

    /// Set the light color
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Set the light intensity
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }
}

/// Light component attached to a scene node
#[derive(Debug, Clone)]
pub struct LightComponent {
    /// The light carried by the owning node
    pub light: Light,
}

impl LightComponent {
    /// Create a component wrapping a light
    pub fn new(light: Light) -> Self {
        Self { light }
    }
}
