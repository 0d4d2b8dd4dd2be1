//! Rendering primitives for the baking pipeline
//!
//! This is the off-screen half of a renderer: cameras, materials with named
//! shader parameters, float render targets, and a graphics-device seam whose
//! frame acquisition can fail. The only consumer is the G-buffer render
//! stage; there is no swapchain, no window, and no real-time path.

mod camera;
mod device;
mod material;
mod render_path;
mod target;

pub use camera::Camera;
pub use device::{GraphicsDevice, RenderError, SoftwareDevice};
pub use material::Material;
pub use render_path::RenderPath;
pub use target::RenderTexture;
