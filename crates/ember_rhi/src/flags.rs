//! Bit-field resource usage/memory flags (`SPEC_FULL.md` §9: "Bit-field flag
//! enums" redesign note -- the original's `RegisterEnumAsFlag` macro becomes
//! a `bitflags` derivation).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX       = 1 << 0;
        const INDEX        = 1 << 1;
        const UNIFORM      = 1 << 2;
        const STORAGE      = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
        const INDIRECT     = 1 << 6;
        const DEVICE_ADDRESS = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED        = 1 << 0;
        const STORAGE        = 1 << 1;
        const COLOR_ATTACHMENT = 1 << 2;
        const DEPTH_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC   = 1 << 4;
        const TRANSFER_DST   = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL  = 1 << 0;
        const HOST_VISIBLE  = 1 << 1;
        const HOST_COHERENT = 1 << 2;
    }
}

/// The shape of a texture array: 2D sheets or a cubemap's six faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    D2,
    Cube,
}

/// Keyed by `(view_type, base_mip, mip_count, base_layer, layer_count)`,
/// matching the `ImageView` cache key in `SPEC_FULL.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageViewKey {
    pub view_type: ImageType,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}
