//! Scene nodes and their components
//!
//! Nodes are stored in a slotmap and addressed by `NodeId`. Component lookup
//! is capability-typed: `static_mesh()` and `light()` return `Option`s, and
//! absence is an ordinary outcome the baking pipeline handles by skipping the
//! node.

use crate::assets::Model;
use crate::foundation::math::{Mat4, Point3, Transform, Vec4};
use crate::scene::{Light, LightComponent, AABB};
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;

new_key_type! {
    /// Stable key identifying a scene node
    pub struct NodeId;
}

/// Static mesh component
///
/// Pairs a node with a renderable model asset and carries the lightmap
/// binding the result binder writes after a bake.
#[derive(Debug, Clone)]
pub struct StaticMeshComponent {
    /// The model asset rendered by this node
    pub model: Arc<Model>,

    /// Whether lightmap sampling is enabled for this mesh
    pub lightmap_enabled: bool,

    /// Resolved global lightmap index
    pub lightmap_index: u32,

    /// UV scale/offset `(size.x, size.y, offset.x, offset.y)` used by the
    /// runtime shader to sample the mesh's sub-rectangle of the atlas
    pub lightmap_scale_offset: Vec4,
}

impl StaticMeshComponent {
    /// Create a component for a model with lightmapping disabled
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            lightmap_enabled: false,
            lightmap_index: 0,
            lightmap_scale_offset: Vec4::new(1.0, 1.0, 0.0, 0.0),
        }
    }
}

/// A scene node with a world transform and optional components
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Human-readable node name (for diagnostics)
    pub name: String,

    /// World transform of the node
    pub transform: Transform,

    static_mesh: Option<StaticMeshComponent>,
    light: Option<LightComponent>,
}

impl SceneNode {
    /// Create an empty node
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            static_mesh: None,
            light: None,
        }
    }

    /// Attach a static mesh component
    pub fn with_static_mesh(mut self, model: Arc<Model>) -> Self {
        self.static_mesh = Some(StaticMeshComponent::new(model));
        self
    }

    /// Attach a light component
    pub fn with_light(mut self, light: Light) -> Self {
        self.light = Some(LightComponent::new(light));
        self
    }

    /// The node's static mesh component, if any
    pub fn static_mesh(&self) -> Option<&StaticMeshComponent> {
        self.static_mesh.as_ref()
    }

    /// Mutable access to the static mesh component, if any
    pub fn static_mesh_mut(&mut self) -> Option<&mut StaticMeshComponent> {
        self.static_mesh.as_mut()
    }

    /// The node's light component, if any
    pub fn light(&self) -> Option<&LightComponent> {
        self.light.as_ref()
    }

    /// World transform matrix
    pub fn world_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    /// World-space bounding box of the node's model, if it has one
    ///
    /// Transforms the eight corners of the model-space box; exact for the
    /// box, conservative for the mesh inside it.
    pub fn world_bounding_box(&self) -> Option<AABB> {
        let mesh = self.static_mesh.as_ref()?;
        let local = mesh.model.bounding_box;
        let matrix = self.world_matrix();

        let mut world = AABB::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 != 0 { local.max.x } else { local.min.x },
                if i & 2 != 0 { local.max.y } else { local.min.y },
                if i & 4 != 0 { local.max.z } else { local.min.z },
            );
            let transformed = matrix.transform_point(&corner);
            world.merge_point(transformed.coords);
        }
        Some(world)
    }
}

/// Flat scene container
#[derive(Default)]
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id
    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(node)
    }

    /// Look up a node by id
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Mutable lookup of a node by id
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Iterate over all nodes
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    /// Number of nodes in the scene
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the scene has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{LightmapMeta, Model};
    use crate::foundation::math::Vec3;

    fn test_model() -> Arc<Model> {
        Arc::new(Model::from_quad(
            "quad",
            2.0,
            LightmapMeta::new((32, 32), 16),
        ))
    }

    #[test]
    fn test_component_lookup_is_optional() {
        let node = SceneNode::new("empty", Transform::identity());
        assert!(node.static_mesh().is_none());
        assert!(node.light().is_none());
    }

    #[test]
    fn test_world_bounding_box_applies_transform() {
        let node = SceneNode::new(
            "quad",
            Transform::from_position(Vec3::new(10.0, 0.0, 0.0)),
        )
        .with_static_mesh(test_model());

        let bounds = node.world_bounding_box().expect("mesh node has bounds");
        assert!(bounds.contains_point(Vec3::new(10.0, 0.0, 0.0)));
        assert!(!bounds.contains_point(Vec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_scene_node_round_trip() {
        let mut scene = Scene::new();
        let id = scene.add_node(SceneNode::new("a", Transform::identity()));
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.node(id).unwrap().name, "a");
    }
}
