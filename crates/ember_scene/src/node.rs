//! Scene node: hierarchy, local transform and owned components
//! (`SPEC_FULL.md` §3 "SceneNode").
//!
//! Only hierarchy and transform are kept hot on the node, matching the
//! reference engine's `scene::Node` design principle of keeping nodes
//! small and cache-friendly; components live in the node's own `Vec`
//! since, unlike the reference engine's dense/sparse `SecondaryMap` split
//! (which optimises for many distinct component *kinds* per node type),
//! this crate only ever has a handful of renderable-component kinds per
//! node.

use ember_core::Transform;
use glam::Affine3A;
use slotmap::new_key_type;

use crate::component::ComponentHandle;

new_key_type! {
    /// Strongly-typed handle for scene nodes.
    pub struct NodeHandle;
}

pub struct SceneNode {
    name: String,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
    components: Vec<ComponentHandle>,

    pub local: Transform,
    world: Affine3A,
    /// Set on any local-transform mutation or re-parenting; propagated to
    /// children during `update_dirty_transform`. `SPEC_FULL.md` §3: "A
    /// dirty flag propagates down on mutation."
    world_dirty: bool,
}

impl SceneNode {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
            local: Transform::new(),
            world: Affine3A::IDENTITY,
            world_dirty: true,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[must_use]
    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }

    pub(crate) fn push_component(&mut self, component: ComponentHandle) {
        self.components.push(component);
    }

    pub(crate) fn remove_component(&mut self, component: ComponentHandle) {
        self.components.retain(|&c| c != component);
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeHandle>) {
        self.parent = parent;
        self.mark_dirty();
    }

    pub(crate) fn push_child(&mut self, child: NodeHandle) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: NodeHandle) {
        self.children.retain(|&c| c != child);
    }

    pub fn mark_dirty(&mut self) {
        self.world_dirty = true;
        self.local.mark_dirty();
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.world_dirty || self.local.is_dirty()
    }

    #[must_use]
    pub fn world_matrix(&self) -> Affine3A {
        self.world
    }

    pub(crate) fn set_world_matrix(&mut self, world: Affine3A) {
        self.world = world;
        self.world_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_starts_dirty() {
        let node = SceneNode::new("root");
        assert!(node.is_dirty());
    }

    #[test]
    fn mutating_local_transform_marks_dirty() {
        let mut node = SceneNode::new("n");
        node.set_world_matrix(Affine3A::IDENTITY);
        assert!(!node.is_dirty());
        node.local.position.x += 1.0;
        assert!(node.is_dirty());
    }
}
