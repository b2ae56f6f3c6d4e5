//! Bindless resource table (`SPEC_FULL.md` §3 "Bindless table", §4.B),
//! modeled on `original_source/libraries/include/renderer/BindlessManager.{h,cpp}`.
//!
//! Four growable arrays (texture, index-buffer, vertex-buffer,
//! vertex-attribute-buffer) plus two parameter buffers (material params,
//! material-id), all addressed by small stable integer ids. Texture ids
//! are reference counted and reused min-first; primitive-buffer slots
//! track `primitive_index` 1:1 and simply follow the primitive array's
//! `{New, Move}` records.

use std::collections::BTreeSet;

use bytemuck::{Pod, Zeroable};
use ember_rhi::resource::{Buffer, BufferDesc, ResourceArray};
use ember_rhi::arena::ResourceId;
use ember_rhi::flags::{BufferUsage, MemoryProperties};
use ember_rhi::software::RhiContext;
use ember_rhi::tracked::Handle;
use ember_scene::{ChangeKind, ChangeRecord, TextureSlot};
use rustc_hash::FxHashMap;

const BASE_CAPACITY: u32 = 1024;

/// 16-byte-aligned GPU record for one material (`SPEC_FULL.md` §3
/// "Material parameter buffer").
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct MaterialRenderData {
    pub base_color: [f32; 3],
    pub variant: u32,
    pub emissive: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub eta: f32,
    pub texture_ids: [u32; 4],
    pub _pad: [u32; 2],
}

/// The three per-primitive GPU buffers a mesh contributes to the
/// bindless table, at `slot = primitive_index`.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveBuffers {
    pub index_buffer: ResourceId<Buffer>,
    pub vertex_buffer: ResourceId<Buffer>,
    pub attribute_buffer: ResourceId<Buffer>,
}

fn resize_buffer_if_needed(
    rhi: &mut RhiContext,
    buffer: &mut Handle<Buffer>,
    element_size: usize,
    requested_element_count: usize,
) -> bool {
    let current_size = rhi.buffer(buffer).desc.size;
    if requested_element_count * element_size <= current_size {
        return false;
    }
    let desc = rhi.buffer(buffer).desc.clone();
    let mut new_size = desc.size.max(1);
    while requested_element_count * element_size > new_size {
        new_size *= 2;
    }
    *buffer = rhi
        .create_buffer(BufferDesc { size: new_size, ..desc })
        .expect("growing a bindless parameter buffer must always succeed");
    true
}

pub struct BindlessTable {
    texture_array: Handle<ResourceArray>,
    index_buffer_array: Handle<ResourceArray>,
    vertex_buffer_array: Handle<ResourceArray>,
    vertex_attribute_buffer_array: Handle<ResourceArray>,

    material_param_buffer: Handle<Buffer>,
    material_id_buffer: Handle<Buffer>,

    texture_ref_count: FxHashMap<TextureSlot, u32>,
    texture_bindless_id: FxHashMap<TextureSlot, u32>,
    free_texture_ids: BTreeSet<u32>,
    registered_texture_count: u32,
    new_textures_this_frame: Vec<u32>,
    removed_textures_this_frame: Vec<u32>,

    primitive_buffers: Vec<Option<PrimitiveBuffers>>,
}

impl BindlessTable {
    #[must_use]
    pub fn new(rhi: &mut RhiContext) -> Self {
        let material_param_buffer = rhi
            .create_buffer(BufferDesc {
                size: std::mem::size_of::<MaterialRenderData>() * BASE_CAPACITY as usize,
                usage: BufferUsage::STORAGE,
                memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
                is_dynamic: false,
            })
            .expect("bindless material parameter buffer creation must succeed at init");
        let material_id_buffer = rhi
            .create_buffer(BufferDesc {
                size: std::mem::size_of::<u32>() * BASE_CAPACITY as usize,
                usage: BufferUsage::STORAGE,
                memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
                is_dynamic: false,
            })
            .expect("bindless material id buffer creation must succeed at init");

        Self {
            texture_array: rhi.create_resource_array(BASE_CAPACITY),
            index_buffer_array: rhi.create_resource_array(BASE_CAPACITY),
            vertex_buffer_array: rhi.create_resource_array(BASE_CAPACITY),
            vertex_attribute_buffer_array: rhi.create_resource_array(BASE_CAPACITY),
            material_param_buffer,
            material_id_buffer,
            texture_ref_count: FxHashMap::default(),
            texture_bindless_id: FxHashMap::default(),
            free_texture_ids: BTreeSet::new(),
            registered_texture_count: 0,
            new_textures_this_frame: Vec::new(),
            removed_textures_this_frame: Vec::new(),
            primitive_buffers: Vec::new(),
        }
    }

    /// Registers a texture; the same slot may be registered by several
    /// materials, and only the last unregistration frees its id
    /// (`SPEC_FULL.md` §4.B).
    pub fn register_texture(&mut self, slot: TextureSlot) -> u32 {
        if let Some(count) = self.texture_ref_count.get_mut(&slot) {
            *count += 1;
            return self.texture_bindless_id[&slot];
        }
        self.texture_ref_count.insert(slot, 1);

        let id = if let Some(&id) = self.free_texture_ids.iter().next() {
            self.free_texture_ids.remove(&id);
            id
        } else {
            let id = self.registered_texture_count;
            self.registered_texture_count += 1;
            id
        };
        self.texture_bindless_id.insert(slot, id);
        self.new_textures_this_frame.push(id);
        id
    }

    pub fn unregister_texture(&mut self, slot: TextureSlot) {
        let Some(count) = self.texture_ref_count.get_mut(&slot) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.texture_ref_count.remove(&slot);
            if let Some(id) = self.texture_bindless_id.remove(&slot) {
                self.free_texture_ids.insert(id);
                self.removed_textures_this_frame.push(id);
            }
        }
    }

    #[must_use]
    pub fn bindless_id_of(&self, slot: TextureSlot) -> Option<u32> {
        self.texture_bindless_id.get(&slot).copied()
    }

    /// Binds the per-primitive buffers at `primitive_id`, growing the
    /// bookkeeping array if needed. Called for every `{New, Move}`
    /// primitive-journal record whose primitive is a mesh.
    pub fn set_primitive_buffers(&mut self, primitive_id: u32, buffers: PrimitiveBuffers) {
        let idx = primitive_id as usize;
        if idx >= self.primitive_buffers.len() {
            self.primitive_buffers.resize(idx + 1, None);
        }
        self.primitive_buffers[idx] = Some(buffers);
    }

    #[must_use]
    pub fn material_param_buffer(&self) -> ResourceId<Buffer> {
        self.material_param_buffer.id()
    }

    #[must_use]
    pub fn material_id_buffer(&self) -> ResourceId<Buffer> {
        self.material_id_buffer.id()
    }

    #[must_use]
    pub fn texture_capacity(&mut self, rhi: &mut RhiContext) -> u32 {
        rhi_array_mut(rhi, &self.texture_array).capacity()
    }

    #[must_use]
    pub fn primitive_buffers(&self, primitive_id: u32) -> Option<PrimitiveBuffers> {
        self.primitive_buffers.get(primitive_id as usize).copied().flatten()
    }

    /// Drains this frame's newly registered and freed bindless texture
    /// ids. New ids need a real image view bound into the texture array;
    /// freed ids should be pointed at the dummy texture. Call once per
    /// frame, after `update_frame_data`.
    pub fn take_texture_changes(&mut self) -> (Vec<u32>, Vec<u32>) {
        (
            std::mem::take(&mut self.new_textures_this_frame),
            std::mem::take(&mut self.removed_textures_this_frame),
        )
    }

    /// Applies one frame's primitive and material changes (`SPEC_FULL.md`
    /// §4.B): rebinds moved/new primitive slots and their material-id
    /// entry, stages new material parameter records, and points any
    /// freed texture slot at the dummy texture via the removed-id list.
    #[allow(clippy::too_many_arguments)]
    pub fn update_frame_data(
        &mut self,
        rhi: &mut RhiContext,
        primitive_journal: &[ChangeRecord],
        primitive_count: usize,
        material_id_of_primitive: impl Fn(u32) -> u32,
        primitive_buffers_of: impl Fn(u32) -> Option<PrimitiveBuffers>,
        material_journal: &[ChangeRecord],
        material_count: usize,
        material_data_of: impl Fn(u32) -> MaterialRenderData,
    ) -> bool {
        let mut buffer_dirty = false;
        for array in [
            &self.texture_array,
            &self.index_buffer_array,
            &self.vertex_buffer_array,
            &self.vertex_attribute_buffer_array,
        ] {
            if rhi_array_mut(rhi, array).take_dirty() {
                buffer_dirty = true;
            }
        }

        let mut ids_to_update = Vec::new();
        let mut material_ids_to_update = Vec::new();
        for record in primitive_journal {
            if !matches!(record.kind, ChangeKind::New | ChangeKind::Move) {
                continue;
            }
            let to = record.to_id;
            if (to as usize) < primitive_count {
                if let Some(buffers) = primitive_buffers_of(to) {
                    self.set_primitive_buffers(to, buffers);
                }
                ids_to_update.push(to);
                material_ids_to_update.push(material_id_of_primitive(to));
            }
        }

        if resize_buffer_if_needed(rhi, &mut self.material_id_buffer, std::mem::size_of::<u32>(), primitive_count) {
            let full: Vec<u32> = (0..primitive_count as u32).map(&material_id_of_primitive).collect();
            let buf = rhi.buffer_mut(&self.material_id_buffer);
            buf.write(0, bytemuck::cast_slice(&full));
            buffer_dirty = true;
        } else if !ids_to_update.is_empty() {
            let elem = std::mem::size_of::<u32>();
            let buf = rhi.buffer_mut(&self.material_id_buffer);
            for (id, material_id) in ids_to_update.iter().zip(material_ids_to_update.iter()) {
                buf.write(*id as usize * elem, bytemuck::bytes_of(material_id));
            }
        }

        if resize_buffer_if_needed(
            rhi,
            &mut self.material_param_buffer,
            std::mem::size_of::<MaterialRenderData>(),
            material_count,
        ) {
            let full: Vec<MaterialRenderData> = (0..material_count as u32).map(&material_data_of).collect();
            let buf = rhi.buffer_mut(&self.material_param_buffer);
            buf.write(0, bytemuck::cast_slice(&full));
            buffer_dirty = true;
        } else {
            let elem = std::mem::size_of::<MaterialRenderData>();
            let buf = rhi.buffer_mut(&self.material_param_buffer);
            for record in material_journal {
                if record.kind == ChangeKind::New {
                    let data = material_data_of(record.to_id);
                    buf.write(record.to_id as usize * elem, bytemuck::bytes_of(&data));
                }
            }
        }

        buffer_dirty
    }
}

fn rhi_array_mut<'a>(rhi: &'a mut RhiContext, handle: &Handle<ResourceArray>) -> &'a mut ResourceArray {
    rhi.resource_array_mut(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RhiContext {
        let mut rhi = RhiContext::new(2);
        rhi.begin_frame();
        rhi
    }

    #[test]
    fn texture_ids_reuse_the_smallest_freed_id() {
        let mut rhi = ctx();
        let mut table = BindlessTable::new(&mut rhi);

        let t1 = table.register_texture(TextureSlot(1));
        let t2 = table.register_texture(TextureSlot(2));
        let t3 = table.register_texture(TextureSlot(3));
        assert_eq!((t1, t2, t3), (0, 1, 2));

        table.unregister_texture(TextureSlot(2));
        let t4 = table.register_texture(TextureSlot(4));
        assert_eq!(t4, 1, "must reuse the smallest freed id");
    }

    #[test]
    fn shared_texture_is_freed_only_on_last_unregister() {
        let mut rhi = ctx();
        let mut table = BindlessTable::new(&mut rhi);
        let slot = TextureSlot(7);

        table.register_texture(slot);
        table.register_texture(slot);
        table.unregister_texture(slot);
        assert!(table.bindless_id_of(slot).is_some(), "still referenced once");

        table.unregister_texture(slot);
        assert!(table.bindless_id_of(slot).is_none());
    }
}
