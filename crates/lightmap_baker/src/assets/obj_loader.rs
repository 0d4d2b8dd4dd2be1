//! OBJ file loader for baking models
//!
//! Loads a Wavefront OBJ into a single-geometry [`Model`]. The `vt` channel
//! is interpreted as the lightmap UV layout (unwrapping happens in external
//! tooling before baking), so OBJ files fed to the baker are expected to
//! carry a non-overlapping chart layout.

use crate::assets::{GeometryLod, LightmapMeta, Model, ModelVertex};
use crate::assets::model::Geometry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Errors produced while loading an OBJ file
#[derive(Error, Debug)]
pub enum ObjError {
    /// Underlying IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A numeric field failed to parse
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Structurally invalid content
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Wavefront OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file and return a model
    pub fn load_obj<P: AsRef<Path>>(path: P, meta: LightmapMeta) -> Result<Model, ObjError> {
        let name = path
            .as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        let file = File::open(path)?;
        Self::parse(BufReader::new(file), name, meta)
    }

    /// Parse OBJ content from any buffered reader
    pub fn parse<R: BufRead>(
        reader: R,
        name: impl Into<String>,
        meta: LightmapMeta,
    ) -> Result<Model, ObjError> {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut tex_coords = Vec::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            match parts[0] {
                "v" => {
                    // Vertex position
                    if parts.len() >= 4 {
                        let x: f32 = parts[1].parse().map_err(|_| ObjError::ParseError("Invalid vertex x".to_string()))?;
                        let y: f32 = parts[2].parse().map_err(|_| ObjError::ParseError("Invalid vertex y".to_string()))?;
                        let z: f32 = parts[3].parse().map_err(|_| ObjError::ParseError("Invalid vertex z".to_string()))?;
                        positions.push([x, y, z]);
                    }
                }
                "vn" => {
                    // Vertex normal
                    if parts.len() >= 4 {
                        let x: f32 = parts[1].parse().map_err(|_| ObjError::ParseError("Invalid normal x".to_string()))?;
                        let y: f32 = parts[2].parse().map_err(|_| ObjError::ParseError("Invalid normal y".to_string()))?;
                        let z: f32 = parts[3].parse().map_err(|_| ObjError::ParseError("Invalid normal z".to_string()))?;
                        normals.push([x, y, z]);
                    }
                }
                "vt" => {
                    // Lightmap texture coordinate
                    if parts.len() >= 3 {
                        let u: f32 = parts[1].parse().map_err(|_| ObjError::ParseError("Invalid tex coord u".to_string()))?;
                        let v: f32 = parts[2].parse().map_err(|_| ObjError::ParseError("Invalid tex coord v".to_string()))?;
                        tex_coords.push([u, v]);
                    }
                }
                "f" => {
                    // Face
                    if parts.len() >= 4 {
                        let mut face_indices = Vec::new();

                        for part in &parts[1..] {
                            let indices_parts: Vec<&str> = part.split('/').collect();

                            if indices_parts.is_empty() {
                                continue;
                            }

                            // Indices are 1-based in OBJ
                            let pos_idx: usize = indices_parts[0].parse()
                                .map_err(|_| ObjError::ParseError("Invalid position index".to_string()))?;
                            let pos_idx = pos_idx - 1;

                            let tex_idx = if indices_parts.len() > 1 && !indices_parts[1].is_empty() {
                                indices_parts[1].parse::<usize>().map(|i| i - 1).ok()
                            } else {
                                None
                            };

                            let normal_idx = if indices_parts.len() > 2 && !indices_parts[2].is_empty() {
                                indices_parts[2].parse::<usize>().map(|i| i - 1).ok()
                            } else {
                                None
                            };

                            let position = positions.get(pos_idx)
                                .ok_or_else(|| ObjError::InvalidFormat("Position index out of bounds".to_string()))?;

                            let tex_coord = tex_idx
                                .and_then(|idx| tex_coords.get(idx))
                                .unwrap_or(&[0.0, 0.0]);

                            let normal = normal_idx
                                .and_then(|idx| normals.get(idx))
                                .unwrap_or(&[0.0, 1.0, 0.0]);

                            vertices.push(ModelVertex::new(*position, *normal, *tex_coord));
                            face_indices.push(vertices.len() - 1);
                        }

                        // Triangulate face (simple fan triangulation)
                        for i in 1..(face_indices.len() - 1) {
                            indices.push(face_indices[0] as u32);
                            indices.push(face_indices[i] as u32);
                            indices.push(face_indices[i + 1] as u32);
                        }
                    }
                }
                _ => {
                    // Ignore other commands
                }
            }
        }

        if vertices.is_empty() {
            return Err(ObjError::InvalidFormat("No vertices found in OBJ file".to_string()));
        }

        Ok(Model::new(
            name,
            vec![Geometry::single_lod(GeometryLod::new(vertices, indices))],
            meta,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TRIANGLE_OBJ: &str = "\
# simple triangle
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn test_parse_triangle() {
        let model = ObjLoader::parse(
            Cursor::new(TRIANGLE_OBJ),
            "tri",
            LightmapMeta::new((8, 8), 4),
        )
        .expect("triangle parses");

        let lod = &model.geometries[0].lods[0];
        assert_eq!(lod.triangle_count(), 1);
        assert_eq!(lod.vertices[1].lightmap_uv, [1.0, 0.0]);
        assert_eq!(lod.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_quad_is_fan_triangulated() {
        let obj = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";
        let model = ObjLoader::parse(Cursor::new(obj), "quad", LightmapMeta::new((8, 8), 4))
            .expect("quad parses");
        assert_eq!(model.geometries[0].lods[0].triangle_count(), 2);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let result = ObjLoader::parse(Cursor::new("# nothing\n"), "x", LightmapMeta::new((8, 8), 4));
        assert!(matches!(result, Err(ObjError::InvalidFormat(_))));
    }

    #[test]
    fn test_out_of_bounds_index_is_rejected() {
        let obj = "v 0 0 0\nf 1 2 3\n";
        let result = ObjLoader::parse(Cursor::new(obj), "x", LightmapMeta::new((8, 8), 4));
        assert!(matches!(result, Err(ObjError::InvalidFormat(_))));
    }
}
