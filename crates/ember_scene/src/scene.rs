//! The game-thread scene graph (`SPEC_FULL.md` §3 "SceneNode", §5
//! "MainThread — owns the scene tree").
//!
//! Mirrors the reference engine's ECS-flavoured `Scene`
//! (`SlotMap`-backed nodes plus pooled resources) but scoped to what
//! `SPEC_FULL.md` actually needs: no skinning/morph pools (Non-goal), and
//! a primitive array that is the *exact* shape the render-thread mirror
//! replays, so `SceneRenderProxy`'s primitive indices and `Scene`'s own
//! are the same numbers.

use std::collections::BTreeSet;

use glam::Affine3A;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::component::{Component, ComponentHandle, ComponentKind};
use crate::journal::{ChangeRecord, Journal};
use crate::material::{Material, MaterialEntry, MaterialHandle, MaterialResource, MaterialVariant};
use crate::mesh::{Mesh, MeshHandle};
use crate::node::{NodeHandle, SceneNode};
use crate::error::{Result, SceneError};

pub struct Scene {
    nodes: SlotMap<NodeHandle, SceneNode>,
    root_nodes: Vec<NodeHandle>,
    components: SlotMap<ComponentHandle, Component>,
    materials: SlotMap<MaterialHandle, MaterialEntry>,
    meshes: SlotMap<MeshHandle, Mesh>,

    /// Dense; removal is swap-with-last (`SPEC_FULL.md` §3 invariant).
    primitives: Vec<ComponentHandle>,
    primitive_index: FxHashMap<ComponentHandle, u32>,
    primitive_journal: Journal,

    /// Holds stable ids with reused holes, smallest-first
    /// (`SPEC_FULL.md` §2.1/§3).
    material_slots: Vec<Option<MaterialHandle>>,
    free_material_ids: BTreeSet<u32>,
    material_index: FxHashMap<MaterialHandle, u32>,
    material_journal: Journal,

    pub active_camera: Option<NodeHandle>,
    pub active_directional_light: Option<NodeHandle>,
    pub active_sky_light: Option<NodeHandle>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),
            components: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            meshes: SlotMap::with_key(),
            primitives: Vec::new(),
            primitive_index: FxHashMap::default(),
            primitive_journal: Journal::new(),
            material_slots: Vec::new(),
            free_material_ids: BTreeSet::new(),
            material_index: FxHashMap::default(),
            material_journal: Journal::new(),
            active_camera: None,
            active_directional_light: None,
            active_sky_light: None,
        }
    }

    // --- Node hierarchy -----------------------------------------------

    pub fn create_node(&mut self, name: impl Into<String>) -> NodeHandle {
        let handle = self.nodes.insert(SceneNode::new(name));
        self.root_nodes.push(handle);
        handle
    }

    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) -> Result<()> {
        if child == parent {
            return Err(SceneError::SelfAttach);
        }
        if !self.nodes.contains_key(parent) {
            log::warn!("attach: parent handle is stale, leaving child attached where it was");
            return Err(SceneError::NoParent);
        }
        self.detach_from_current_parent(child);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.push_child(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.set_parent(Some(parent));
        }
        Ok(())
    }

    /// Detaches `node` back to the root set.
    pub fn detach(&mut self, node: NodeHandle) {
        self.detach_from_current_parent(node);
        if let Some(n) = self.nodes.get_mut(node) {
            n.set_parent(None);
        }
        if !self.root_nodes.contains(&node) {
            self.root_nodes.push(node);
        }
    }

    fn detach_from_current_parent(&mut self, node: NodeHandle) {
        let parent = self.nodes.get(node).and_then(SceneNode::parent);
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.remove_child(node);
            }
        } else {
            self.root_nodes.retain(|&h| h != node);
        }
    }

    /// Removes `node` and its entire subtree: detaches every component
    /// (releasing materials, removing primitives) before dropping nodes.
    pub fn remove_node(&mut self, node: NodeHandle) {
        let mut subtree = Vec::new();
        self.collect_subtree(node, &mut subtree);

        self.detach_from_current_parent(node);
        self.root_nodes.retain(|&h| h != node);

        for handle in subtree {
            let owned_components: Vec<ComponentHandle> =
                self.nodes.get(handle).map(|n| n.components().to_vec()).unwrap_or_default();
            for component in owned_components {
                self.remove_component(handle, component);
            }
            self.nodes.remove(handle);
        }
    }

    fn collect_subtree(&self, node: NodeHandle, out: &mut Vec<NodeHandle>) {
        out.push(node);
        if let Some(n) = self.nodes.get(node) {
            for &child in n.children() {
                self.collect_subtree(child, out);
            }
        }
    }

    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&SceneNode> {
        self.nodes.get(handle)
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut SceneNode> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn root_nodes(&self) -> &[NodeHandle] {
        &self.root_nodes
    }

    // --- Components ------------------------------------------------------

    /// Attaches a new component to `node`. If the component is a
    /// primitive (mesh/sphere), it is appended to the dense primitive
    /// array and a `{New}` record is published; its material's usage
    /// count is incremented, publishing the material's own `{New}`
    /// record on first use.
    pub fn add_component(&mut self, node: NodeHandle, kind: ComponentKind) -> ComponentHandle {
        if let Some(material) = kind.material() {
            self.acquire_material(material);
        }

        let is_primitive = kind.is_primitive();
        let handle = self.components.insert(Component {
            owner: node,
            kind,
            render_id: None,
        });
        if let Some(n) = self.nodes.get_mut(node) {
            n.push_component(handle);
        }

        if is_primitive {
            let slot = self.primitives.len() as u32;
            self.primitives.push(handle);
            self.primitive_index.insert(handle, slot);
            self.primitive_journal.push(ChangeRecord::new(slot));
        }
        handle
    }

    /// Detaches `component` from `node`: removes it from the dense
    /// primitive array via swap-with-last (publishing `{Remove}` and, if
    /// a swap occurred, `{Move}`), and releases its material.
    pub fn remove_component(&mut self, node: NodeHandle, component: ComponentHandle) {
        let Some(removed) = self.components.remove(component) else {
            return;
        };
        if let Some(n) = self.nodes.get_mut(node) {
            n.remove_component(component);
        }
        if let Some(material) = removed.kind.material() {
            self.release_material(material);
        }

        if let Some(&slot) = self.primitive_index.get(&component) {
            self.primitive_index.remove(&component);
            let last = self.primitives.len() as u32 - 1;
            self.primitives.swap_remove(slot as usize);
            self.primitive_journal.push(ChangeRecord::remove(slot));
            if slot != last {
                let moved = self.primitives[slot as usize];
                self.primitive_index.insert(moved, slot);
                self.primitive_journal.push(ChangeRecord::moved(last, slot));
            }
        }
    }

    #[must_use]
    pub fn component(&self, handle: ComponentHandle) -> Option<&Component> {
        self.components.get(handle)
    }

    /// Records the render-thread mirror's proxy index for `component`.
    /// Called by the render-thread mirror after it processes a `{New}`
    /// journal record; never set from the scene side itself.
    pub fn set_component_render_id(&mut self, handle: ComponentHandle, render_id: Option<u32>) {
        if let Some(component) = self.components.get_mut(handle) {
            component.set_render_id(render_id);
        }
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    #[must_use]
    pub fn primitive_at(&self, slot: u32) -> Option<ComponentHandle> {
        self.primitives.get(slot as usize).copied()
    }

    #[must_use]
    pub fn primitive_slot_of(&self, component: ComponentHandle) -> Option<u32> {
        self.primitive_index.get(&component).copied()
    }

    // --- Materials ---------------------------------------------------

    /// Creates a material with zero usage; it has no stable id and is
    /// invisible to the render side until first acquired by a primitive.
    pub fn create_material(&mut self, resource: MaterialResource, variant: MaterialVariant) -> MaterialHandle {
        self.materials.insert(MaterialEntry {
            material: Material { resource, variant },
            ref_count: 0,
            dirty: false,
        })
    }

    fn acquire_material(&mut self, handle: MaterialHandle) {
        let Some(entry) = self.materials.get_mut(handle) else {
            return;
        };
        entry.ref_count += 1;
        if entry.ref_count == 1 {
            let id = self.free_material_ids.iter().next().copied();
            let id = if let Some(id) = id {
                self.free_material_ids.remove(&id);
                self.material_slots[id as usize] = Some(handle);
                id
            } else {
                let id = self.material_slots.len() as u32;
                self.material_slots.push(Some(handle));
                id
            };
            self.material_index.insert(handle, id);
            self.material_journal.push(ChangeRecord::new(id));
        }
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        let Some(entry) = self.materials.get_mut(handle) else {
            return;
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 {
            if let Some(id) = self.material_index.remove(&handle) {
                self.material_slots[id as usize] = None;
                self.free_material_ids.insert(id);
                self.material_journal.push(ChangeRecord::remove(id));
            }
        }
    }

    /// Marks a still-referenced material's resource as changed, which
    /// publishes an `{Update}` record at its current stable id.
    pub fn mark_material_dirty(&mut self, handle: MaterialHandle) {
        if let Some(&id) = self.material_index.get(&handle) {
            if let Some(entry) = self.materials.get_mut(handle) {
                entry.dirty = true;
            }
            self.material_journal.push(ChangeRecord::update(id));
        }
    }

    #[must_use]
    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle).map(|e| &e.material)
    }

    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle).map(|e| &mut e.material)
    }

    #[must_use]
    pub fn material_id(&self, handle: MaterialHandle) -> Option<u32> {
        self.material_index.get(&handle).copied()
    }

    #[must_use]
    pub fn material_at(&self, id: u32) -> Option<MaterialHandle> {
        self.material_slots.get(id as usize).copied().flatten()
    }

    #[must_use]
    pub fn material_slot_count(&self) -> usize {
        self.material_slots.len()
    }

    // --- Meshes -----------------------------------------------------

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshHandle {
        self.meshes.insert(mesh)
    }

    #[must_use]
    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    // --- Journals -----------------------------------------------------

    #[must_use]
    pub fn primitive_journal(&self) -> &[ChangeRecord] {
        self.primitive_journal.records()
    }

    #[must_use]
    pub fn material_journal(&self) -> &[ChangeRecord] {
        self.material_journal.records()
    }

    /// Clears both journals; called once the render-thread mirror has
    /// consumed a full frame's worth (`SPEC_FULL.md` §5).
    pub fn clear_journals(&mut self) {
        self.primitive_journal.clear();
        self.material_journal.clear();
    }

    // --- Transform propagation -----------------------------------------

    /// Recomputes world matrices for every dirty node and its descendants
    /// (`SPEC_FULL.md` §3 "UpdateDirtyTransform"). Iterative, matching the
    /// reference engine's stack-based traversal to avoid recursion depth
    /// limits on deep hierarchies.
    pub fn update_dirty_transform(&mut self) {
        let mut stack: Vec<(NodeHandle, Affine3A, bool)> = self
            .root_nodes
            .iter()
            .rev()
            .map(|&h| (h, Affine3A::IDENTITY, false))
            .collect();

        while let Some((handle, parent_world, parent_changed)) = stack.pop() {
            let (world, changed, children) = {
                let Some(node) = self.nodes.get_mut(handle) else {
                    continue;
                };
                let local_changed = node.local.update_if_dirty();
                let changed = local_changed || parent_changed;
                if changed {
                    let new_world = parent_world * node.local.matrix();
                    node.set_world_matrix(new_world);
                }
                (node.world_matrix(), changed, node.children().to_vec())
            };
            for &child in children.iter().rev() {
                stack.push((child, world, changed));
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;
    use glam::Vec3;

    #[test]
    fn child_inherits_parent_world_position() {
        let mut scene = Scene::new();
        let parent = scene.create_node("parent");
        let child = scene.create_node("child");
        scene.node_mut(parent).unwrap().local.position = Vec3::new(1.0, 0.0, 0.0);
        scene.node_mut(child).unwrap().local.position = Vec3::new(0.0, 1.0, 0.0);
        scene.attach(child, parent).unwrap();

        scene.update_dirty_transform();

        let world = scene.node(child).unwrap().world_matrix();
        let pos = world.transform_point3(Vec3::ZERO);
        assert!((pos - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn removing_a_primitive_swaps_with_last_and_journals_the_move() {
        let mut scene = Scene::new();
        let node = scene.create_node("n");
        let material = scene.create_material(MaterialResource::new("m"), MaterialVariant::Pbr);
        let a = scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material });
        let b = scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material });
        let _c = scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material });
        assert_eq!(scene.primitive_count(), 3);

        scene.remove_component(node, a);
        assert_eq!(scene.primitive_count(), 2);
        // `c` (originally at slot 2) should now be at slot 0 (swapped in for `a`).
        assert_eq!(scene.primitive_slot_of(b), Some(1));

        let records = scene.primitive_journal();
        assert!(records.iter().any(|r| r.kind == crate::journal::ChangeKind::Remove && r.from_id == 0));
        assert!(records.iter().any(|r| r.kind == crate::journal::ChangeKind::Move));
    }

    #[test]
    fn material_ids_reuse_the_smallest_freed_slot() {
        let mut scene = Scene::new();
        let node = scene.create_node("n");
        let m0 = scene.create_material(MaterialResource::new("m0"), MaterialVariant::Pbr);
        let m1 = scene.create_material(MaterialResource::new("m1"), MaterialVariant::Pbr);
        let m2 = scene.create_material(MaterialResource::new("m2"), MaterialVariant::Pbr);

        let c0 = scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material: m0 });
        let c1 = scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material: m1 });
        let _c2 = scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material: m2 });
        assert_eq!(scene.material_id(m0), Some(0));
        assert_eq!(scene.material_id(m1), Some(1));
        assert_eq!(scene.material_id(m2), Some(2));

        scene.remove_component(node, c0);
        scene.remove_component(node, c1);

        let m3 = scene.create_material(MaterialResource::new("m3"), MaterialVariant::Pbr);
        scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material: m3 });
        assert_eq!(scene.material_id(m3), Some(0), "must reuse the smallest freed id");
    }
}
