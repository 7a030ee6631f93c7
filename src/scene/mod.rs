//! Minimal scene graph used by the cursor system
//!
//! Nodes live in an arena owned by [`SceneGraph`] and are addressed by
//! [`NodeId`]. Each node carries a local transform, an optional local-space
//! bounding box and the flags the cursor system cares about (enabled,
//! collidable, selectable-group root). Rendering is out of scope; the graph
//! only answers the spatial questions picking needs.

use std::sync::atomic::{AtomicU64, Ordering};

use bevy::math::bounding::Aabb3d;
use bevy::math::{Mat4, Quat, Vec3, Vec3A};

pub mod picking;

pub use picking::{PickHit, Ray};

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a node in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Translation / rotation / scale of a node relative to its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    transform: NodeTransform,
    bounds: Option<Aabb3d>,
    enabled: bool,
    collidable: bool,
    group_root: bool,
}

impl Node {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transform: NodeTransform::default(),
            bounds: None,
            enabled: true,
            collidable: false,
            group_root: false,
        }
    }
}

/// Arena-backed scene graph
#[derive(Debug, Clone)]
pub struct SceneGraph {
    id: u64,
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            nodes: vec![Node::new("root")],
            root: NodeId(0),
        }
    }

    /// Unique id of this graph, used to detect stale node handles
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Create a node under the root
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let root = self.root;
        self.add_child_node(root, name)
    }

    /// Create a node under `parent`
    pub fn add_child_node(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = self.create_node(name);
        self.set_parent(id, Some(parent));
        id
    }

    /// Create a node that is not linked into the graph yet
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(name));
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        if let Some(node) = self.node_mut(id) {
            node.name = name.into();
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId(i as u32))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// True when `node` is `ancestor` or lies below it
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// True when the node is reachable from the root
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(node) && self.is_descendant_of(node, self.root)
    }

    /// Link `child` under `parent`, or unlink it when `parent` is `None`.
    ///
    /// Returns false when the move would create a cycle or a handle is invalid.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> bool {
        if !self.contains(child) || child == self.root {
            return false;
        }
        if let Some(p) = parent {
            if !self.contains(p) || self.is_descendant_of(p, child) {
                return false;
            }
        }

        if let Some(old) = self.parent(child) {
            if let Some(old_node) = self.node_mut(old) {
                old_node.children.retain(|c| *c != child);
            }
        }
        if let Some(p) = parent {
            if let Some(parent_node) = self.node_mut(p) {
                parent_node.children.push(child);
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = parent;
        }
        true
    }

    /// Re-parent `child` so that its world transform does not change
    pub fn reparent_keep_world(&mut self, child: NodeId, parent: Option<NodeId>) -> bool {
        let world = self.world_matrix(child);
        if !self.set_parent(child, parent) {
            return false;
        }
        let parent_world = parent.map(|p| self.world_matrix(p)).unwrap_or(Mat4::IDENTITY);
        let local = parent_world.inverse() * world;
        self.set_transform(child, NodeTransform::from_matrix(local));
        true
    }

    pub fn transform(&self, id: NodeId) -> NodeTransform {
        self.node(id).map(|n| n.transform).unwrap_or_default()
    }

    pub fn set_transform(&mut self, id: NodeId, transform: NodeTransform) {
        if let Some(node) = self.node_mut(id) {
            node.transform = transform;
        }
    }

    pub fn set_translation(&mut self, id: NodeId, translation: Vec3) {
        if let Some(node) = self.node_mut(id) {
            node.transform.translation = translation;
        }
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) {
        if let Some(node) = self.node_mut(id) {
            node.transform.rotation = rotation;
        }
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) {
        if let Some(node) = self.node_mut(id) {
            node.transform.scale = scale;
        }
    }

    /// Model matrix of the node in world space
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.node(node_id) else {
                break;
            };
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }

    pub fn world_rotation(&self, id: NodeId) -> Quat {
        let (_, rotation, _) = self.world_matrix(id).to_scale_rotation_translation();
        rotation
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(node) = self.node_mut(id) {
            node.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.enabled).unwrap_or(false)
    }

    /// Enabled and every ancestor enabled
    pub fn is_effectively_enabled(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.node(node_id) {
                Some(node) if node.enabled => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn set_collidable(&mut self, id: NodeId, collidable: bool) {
        if let Some(node) = self.node_mut(id) {
            node.collidable = collidable;
        }
    }

    pub fn is_collidable(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.collidable).unwrap_or(false)
    }

    /// Set the local-space bounding box of a node
    pub fn set_bounds(&mut self, id: NodeId, bounds: Option<Aabb3d>) {
        if let Some(node) = self.node_mut(id) {
            node.bounds = bounds;
        }
    }

    /// Convenience for a box of `half_size` centred on the node origin
    pub fn set_box_bounds(&mut self, id: NodeId, half_size: Vec3) {
        self.set_bounds(id, Some(Aabb3d::new(Vec3A::ZERO, half_size)));
    }

    pub fn bounds(&self, id: NodeId) -> Option<Aabb3d> {
        self.node(id).and_then(|n| n.bounds)
    }

    /// Axis-aligned box enclosing the node's bounds in world space
    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb3d> {
        let local = self.bounds(id)?;
        let matrix = self.world_matrix(id);
        let (min, max) = (Vec3::from(local.min), Vec3::from(local.max));

        let mut world_min = Vec3::splat(f32::INFINITY);
        let mut world_max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            let p = matrix.transform_point3(corner);
            world_min = world_min.min(p);
            world_max = world_max.max(p);
        }
        Some(Aabb3d {
            min: world_min.into(),
            max: world_max.into(),
        })
    }

    /// Mark a node as the root of a selectable group: hits on any of its
    /// descendants are reported against the group root.
    pub fn set_group_root(&mut self, id: NodeId, group_root: bool) {
        if let Some(node) = self.node_mut(id) {
            node.group_root = group_root;
        }
    }

    pub fn is_group_root(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.group_root).unwrap_or(false)
    }

    /// Nearest selectable-group root at or above `id`, else `id` itself
    pub fn selectable_root(&self, id: NodeId) -> NodeId {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if self.is_group_root(node_id) {
                return node_id;
            }
            current = self.parent(node_id);
        }
        id
    }

    /// Depth-first walk from the root, parents before children
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }
}
