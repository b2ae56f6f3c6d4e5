//! Pixel formats and image transition vocabulary (`SPEC_FULL.md` §6).

/// Pixel formats the RHI surface must be able to describe. Kept as a
/// closed enum (rather than a raw API format code) so `ember_rhi` stays
/// backend-agnostic; a hardware backend maps each variant to its native
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    B8G8R8A8Srgb,
    B8G8R8A8Unorm,
    R8G8B8A8Srgb,
    R8G8B8A8Unorm,
    D32,
    D24S8,
    RgbaFloat,
    RgbaFloat16,
    R10G10B10A2Unorm,
    R32Uint,
    R32Float,
    RgbaUint32,
}

impl PixelFormat {
    /// Bytes per texel. Block-compressed formats are out of scope (the
    /// spec's format list is uncompressed only).
    #[must_use]
    pub fn texel_size(self) -> usize {
        match self {
            PixelFormat::B8G8R8A8Srgb
            | PixelFormat::B8G8R8A8Unorm
            | PixelFormat::R8G8B8A8Srgb
            | PixelFormat::R8G8B8A8Unorm
            | PixelFormat::D32
            | PixelFormat::D24S8
            | PixelFormat::R10G10B10A2Unorm
            | PixelFormat::R32Uint
            | PixelFormat::R32Float => 4,
            PixelFormat::RgbaFloat16 => 8,
            PixelFormat::RgbaFloat | PixelFormat::RgbaUint32 => 16,
        }
    }

    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::D32 | PixelFormat::D24S8)
    }
}

/// Abstract pipeline stages an image-layout transition can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Top,
    VertexInput,
    VertexShader,
    PixelShader,
    EarlyZ,
    LateZ,
    ColorOutput,
    ComputeShader,
    Transfer,
    Bottom,
}

/// Abstract image layouts; implementations map these to the underlying API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    Read,
    StorageWrite,
    ColorOutput,
    DepthStencilOutput,
    TransferSrc,
    TransferDst,
    PreInitialized,
    Present,
}

/// A requested layout transition. A no-op when `target_layout` already
/// equals the image's current layout for every targeted mip (`SPEC_FULL.md`
/// §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub target_layout: ImageLayout,
    pub after_stage: PipelineStage,
    pub before_stage: PipelineStage,
    pub base_mip: u32,
    pub mip_count: u32,
}
