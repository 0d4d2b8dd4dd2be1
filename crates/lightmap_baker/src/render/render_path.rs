//! Render path configuration

/// Named render configuration listing the auxiliary outputs a pass produces
///
/// The baking render path declares the G-buffer attachments the render stage
/// is expected to fill; the stage validates the required attachments are
/// present before rendering, mirroring how a data-driven renderer would bind
/// them from configuration.
#[derive(Debug, Clone)]
pub struct RenderPath {
    /// Render path name (the identifier it is registered under)
    pub name: String,

    /// Names of the auxiliary render targets this path produces
    pub outputs: Vec<String>,
}

impl RenderPath {
    /// Create a render path with explicit outputs
    pub fn new(name: impl Into<String>, outputs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            outputs,
        }
    }

    /// The standard lightmap G-buffer path with its four outputs
    pub fn lightmap_gbuffer(name: impl Into<String>) -> Self {
        Self::new(
            name,
            vec![
                "position".to_string(),
                "smoothposition".to_string(),
                "facenormal".to_string(),
                "smoothnormal".to_string(),
            ],
        )
    }

    /// Whether this path declares the given output
    pub fn has_output(&self, output: &str) -> bool {
        self.outputs.iter().any(|name| name == output)
    }
}
