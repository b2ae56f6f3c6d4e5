//! Image-based-lighting cookers (`SPEC_FULL.md` §4.E "IBL passes"), modeled
//! on the progressive-cook + disk-cache shape of
//! `original_source/libraries/include/renderer/renderer/IBLBaker.h` and the
//! compute-pass bookkeeping style of `mesh_pass.rs`.
//!
//! A cache file per environment map is tried first (`SPEC_FULL.md` §6); on a
//! miss the cooker accumulates `sample_batch` samples per dispatch, budgeted
//! adaptively (1-64 steps/frame) so an interactive frame stays responsive,
//! until `target_sample_count` is reached, then persists the result so the
//! next run starts warm.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ember_rhi::flags::{ImageType, ImageUsage, MemoryProperties};
use ember_rhi::resource::{Image, ImageDesc, PipelineState};
use ember_rhi::shader_resource::{BindingDecl, BindingKind, SamplerAttr};
use ember_rhi::tracked::Handle;
use ember_rhi::{ImageLayout, PipelineStage, PixelFormat, RhiContext, Transition};

/// Target sample count a progressive cook accumulates towards before it is
/// considered converged and persisted to disk.
pub const TARGET_SAMPLE_COUNT: u32 = 2048;
/// Roughness slices a specular pre-filter cooks, one per mip level.
pub const MIP_LEVEL_COUNT: u32 = 5;
const MIN_STEPS_PER_FRAME: u32 = 1;
const MAX_STEPS_PER_FRAME: u32 = 64;
const SAMPLE_BATCH: u32 = 32;

/// Progress of one environment map's cook: either still converging (with the
/// samples accumulated so far) or done and safe to persist/read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IblCookState {
    Cooking { accumulated_samples: u32 },
    Converged,
}

impl IblCookState {
    #[must_use]
    pub fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Adaptive per-frame step budget: more steps when the previous frame was
/// comfortably under its time target, fewer as it approaches it, clamped to
/// `[MIN_STEPS_PER_FRAME, MAX_STEPS_PER_FRAME]`.
#[must_use]
pub fn adaptive_step_budget(frame_time_ratio: f32) -> u32 {
    let headroom = (1.0 - frame_time_ratio).clamp(0.0, 1.0);
    let steps = (headroom * MAX_STEPS_PER_FRAME as f32).round() as u32;
    steps.clamp(MIN_STEPS_PER_FRAME, MAX_STEPS_PER_FRAME)
}

fn cache_path(kind: &str, env_name: &str) -> PathBuf {
    if kind == "brdf" {
        Path::new("cached/ibl").join("brdf.ibl")
    } else {
        Path::new("cached/ibl").join(format!("{env_name}_{kind}.ibl"))
    }
}

/// Loads a cache file iff its size exactly matches `expected_bytes`
/// (`SPEC_FULL.md` §6); any size mismatch or IO failure is a cache miss, not
/// a hard error, so the caller falls back to cooking.
fn try_load_cache(path: &Path, expected_bytes: usize) -> Option<Vec<u8>> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut bytes = Vec::with_capacity(expected_bytes);
    file.read_to_end(&mut bytes).ok()?;
    if bytes.len() == expected_bytes {
        Some(bytes)
    } else {
        log::warn!("ibl cache {} has unexpected size {} (wanted {expected_bytes}), re-cooking", path.display(), bytes.len());
        None
    }
}

fn persist_cache(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)
}

/// Splitting-sum BRDF integration LUT, a single full-resolution cook shared
/// by every environment map (`SPEC_FULL.md` §4.E).
pub struct BrdfLutPass {
    lut: Option<Handle<Image>>,
    cooking_target: Option<Handle<Image>>,
    pso: Option<Handle<PipelineState>>,
    state: IblCookState,
    resolution: u32,
}

impl BrdfLutPass {
    #[must_use]
    pub fn new(resolution: u32) -> Self {
        Self {
            lut: None,
            cooking_target: None,
            pso: None,
            state: IblCookState::Cooking { accumulated_samples: 0 },
            resolution,
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext) {
        self.pso = Some(rhi.create_pipeline_state(vec![BindingDecl {
            name: "brdf_lut",
            kind: BindingKind::StorageImage,
            is_bindless: false,
        }]));

        let expected_bytes = (self.resolution as usize) * (self.resolution as usize) * PixelFormat::RgbaFloat16.texel_size();
        if let Some(bytes) = try_load_cache(&cache_path("brdf", ""), expected_bytes) {
            if let Ok(target) = rhi.create_render_target(self.cached_desc()) {
                rhi.image_mut(&target).data_mut().copy_from_slice(&bytes);
                self.lut = Some(target);
                self.state = IblCookState::Converged;
                return;
            }
        }
        self.cooking_target = rhi.create_render_target(self.cooking_desc()).ok();
    }

    fn cached_desc(&self) -> ImageDesc {
        ImageDesc {
            format: PixelFormat::RgbaFloat16,
            width: self.resolution,
            height: self.resolution,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::SAMPLED,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        }
    }

    fn cooking_desc(&self) -> ImageDesc {
        ImageDesc {
            format: PixelFormat::RgbaFloat,
            width: self.resolution,
            height: self.resolution,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::STORAGE,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        }
    }

    #[must_use]
    pub fn state(&self) -> IblCookState {
        self.state
    }

    #[must_use]
    pub fn lut(&self) -> Option<&Handle<Image>> {
        self.lut.as_ref()
    }

    /// Dispatches up to `step_budget` more sample batches; once
    /// `TARGET_SAMPLE_COUNT` is reached the cooking target is promoted to
    /// the cached half-precision LUT and persisted to disk.
    pub fn render(&mut self, rhi: &mut RhiContext, step_budget: u32) {
        let IblCookState::Cooking { accumulated_samples } = self.state else {
            return;
        };
        let Some(pso) = &self.pso else { return };
        let Some(target) = &self.cooking_target else { return };

        rhi.transition_image(
            target,
            Transition {
                target_layout: ImageLayout::StorageWrite,
                after_stage: PipelineStage::Top,
                before_stage: PipelineStage::ComputeShader,
                base_mip: 0,
                mip_count: 1,
            },
        );
        let compute_pass = rhi.create_compute_pass("brdf-lut-cook");
        rhi.begin_compute_pass(compute_pass.id());
        let steps = step_budget.clamp(MIN_STEPS_PER_FRAME, MAX_STEPS_PER_FRAME);
        for _ in 0..steps {
            rhi.dispatch(pso, [self.resolution, self.resolution, 1], [8, 8, 1]);
        }
        rhi.end_compute_pass();

        let new_total = accumulated_samples + steps * SAMPLE_BATCH;
        if new_total >= TARGET_SAMPLE_COUNT {
            self.finish_cook(rhi);
        } else {
            self.state = IblCookState::Cooking { accumulated_samples: new_total };
        }
    }

    fn finish_cook(&mut self, rhi: &mut RhiContext) {
        let Some(cooking) = self.cooking_target.take() else { return };
        if let Ok(cached) = rhi.create_render_target(self.cached_desc()) {
            let cooking_bytes = rhi.image(&cooking).data().to_vec();
            let cached_bytes = downsample_to_half(&cooking_bytes);
            rhi.image_mut(&cached).data_mut().copy_from_slice(&cached_bytes);
            if let Err(error) = persist_cache(&cache_path("brdf", ""), &cached_bytes) {
                log::warn!("failed to persist brdf LUT cache: {error}");
            }
            self.lut = Some(cached);
        }
        self.state = IblCookState::Converged;
    }
}

/// Diffuse-irradiance convolution for one environment map (`SPEC_FULL.md`
/// §4.E).
pub struct DiffuseIblPass {
    env_name: String,
    resolution: u32,
    map: Option<Handle<Image>>,
    cooking_target: Option<Handle<Image>>,
    pso: Option<Handle<PipelineState>>,
    state: IblCookState,
}

impl DiffuseIblPass {
    #[must_use]
    pub fn new(env_name: impl Into<String>, resolution: u32) -> Self {
        Self {
            env_name: env_name.into(),
            resolution,
            map: None,
            cooking_target: None,
            pso: None,
            state: IblCookState::Cooking { accumulated_samples: 0 },
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext) {
        self.pso = Some(rhi.create_pipeline_state(vec![
            BindingDecl { name: "env_map", kind: BindingKind::SampledImage, is_bindless: false },
            BindingDecl { name: "diffuse_irradiance", kind: BindingKind::StorageImage, is_bindless: false },
        ]));

        let cube_faces = 6;
        let expected_bytes =
            (self.resolution as usize) * (self.resolution as usize) * cube_faces * PixelFormat::RgbaFloat16.texel_size();
        if let Some(bytes) = try_load_cache(&cache_path("diffuse", &self.env_name), expected_bytes) {
            if let Ok(target) = rhi.create_render_target(self.desc(PixelFormat::RgbaFloat16, ImageUsage::SAMPLED)) {
                rhi.image_mut(&target).data_mut().copy_from_slice(&bytes);
                self.map = Some(target);
                self.state = IblCookState::Converged;
                return;
            }
        }
        self.cooking_target = rhi.create_render_target(self.desc(PixelFormat::RgbaFloat, ImageUsage::STORAGE)).ok();
    }

    fn desc(&self, format: PixelFormat, usage: ImageUsage) -> ImageDesc {
        ImageDesc {
            format,
            width: self.resolution,
            height: self.resolution,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::Cube,
            usage,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        }
    }

    #[must_use]
    pub fn state(&self) -> IblCookState {
        self.state
    }

    #[must_use]
    pub fn map(&self) -> Option<&Handle<Image>> {
        self.map.as_ref()
    }

    pub fn render(&mut self, rhi: &mut RhiContext, step_budget: u32) {
        let IblCookState::Cooking { accumulated_samples } = self.state else {
            return;
        };
        let Some(pso) = &self.pso else { return };
        let Some(target) = &self.cooking_target else { return };

        rhi.transition_image(
            target,
            Transition {
                target_layout: ImageLayout::StorageWrite,
                after_stage: PipelineStage::Top,
                before_stage: PipelineStage::ComputeShader,
                base_mip: 0,
                mip_count: 1,
            },
        );
        let compute_pass = rhi.create_compute_pass("diffuse-ibl-cook");
        rhi.begin_compute_pass(compute_pass.id());
        let steps = step_budget.clamp(MIN_STEPS_PER_FRAME, MAX_STEPS_PER_FRAME);
        for _ in 0..steps {
            rhi.dispatch(pso, [self.resolution, self.resolution, 6], [8, 8, 1]);
        }
        rhi.end_compute_pass();

        let new_total = accumulated_samples + steps * SAMPLE_BATCH;
        if new_total >= TARGET_SAMPLE_COUNT {
            self.finish_cook(rhi);
        } else {
            self.state = IblCookState::Cooking { accumulated_samples: new_total };
        }
    }

    fn finish_cook(&mut self, rhi: &mut RhiContext) {
        let Some(cooking) = self.cooking_target.take() else { return };
        if let Ok(cached) = rhi.create_render_target(self.desc(PixelFormat::RgbaFloat16, ImageUsage::SAMPLED)) {
            let cooking_bytes = rhi.image(&cooking).data().to_vec();
            let cached_bytes = downsample_to_half(&cooking_bytes);
            rhi.image_mut(&cached).data_mut().copy_from_slice(&cached_bytes);
            if let Err(error) = persist_cache(&cache_path("diffuse", &self.env_name), &cached_bytes) {
                log::warn!("failed to persist diffuse IBL cache for {}: {error}", self.env_name);
            }
            self.map = Some(cached);
        }
        self.state = IblCookState::Converged;
    }
}

/// Specular pre-filter for one environment map: cooks `MIP_LEVEL_COUNT`
/// roughness slices in sequence, one mip at a time, persisting only once the
/// final (sharpest) mip has converged (`SPEC_FULL.md` §4.E).
pub struct SpecularIblPass {
    env_name: String,
    resolution: u32,
    map: Option<Handle<Image>>,
    cooking_target: Option<Handle<Image>>,
    pso: Option<Handle<PipelineState>>,
    current_mip: u32,
    state: IblCookState,
}

impl SpecularIblPass {
    #[must_use]
    pub fn new(env_name: impl Into<String>, resolution: u32) -> Self {
        Self {
            env_name: env_name.into(),
            resolution,
            map: None,
            cooking_target: None,
            pso: None,
            current_mip: 0,
            state: IblCookState::Cooking { accumulated_samples: 0 },
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext) {
        self.pso = Some(rhi.create_pipeline_state(vec![
            BindingDecl { name: "env_map", kind: BindingKind::SampledImage, is_bindless: false },
            BindingDecl { name: "specular_prefilter", kind: BindingKind::StorageImage, is_bindless: false },
        ]));

        let cube_faces = 6;
        let expected_bytes = mip_chain_texel_count(self.resolution, MIP_LEVEL_COUNT) * cube_faces * PixelFormat::RgbaFloat16.texel_size();
        if let Some(bytes) = try_load_cache(&cache_path("specular", &self.env_name), expected_bytes) {
            if let Ok(target) = rhi.create_render_target(self.desc(PixelFormat::RgbaFloat16, ImageUsage::SAMPLED)) {
                rhi.image_mut(&target).data_mut().copy_from_slice(&bytes);
                self.map = Some(target);
                self.state = IblCookState::Converged;
                return;
            }
        }
        self.cooking_target = rhi.create_render_target(self.desc(PixelFormat::RgbaFloat, ImageUsage::STORAGE)).ok();
    }

    fn desc(&self, format: PixelFormat, usage: ImageUsage) -> ImageDesc {
        ImageDesc {
            format,
            width: self.resolution,
            height: self.resolution,
            mip_levels: MIP_LEVEL_COUNT,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::Cube,
            usage,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        }
    }

    #[must_use]
    pub fn state(&self) -> IblCookState {
        self.state
    }

    #[must_use]
    pub fn current_mip(&self) -> u32 {
        self.current_mip
    }

    #[must_use]
    pub fn map(&self) -> Option<&Handle<Image>> {
        self.map.as_ref()
    }

    pub fn render(&mut self, rhi: &mut RhiContext, step_budget: u32) {
        let IblCookState::Cooking { accumulated_samples } = self.state else {
            return;
        };
        let Some(pso) = &self.pso else { return };
        let Some(target) = &self.cooking_target else { return };
        let mip_extent = (self.resolution >> self.current_mip).max(1);

        rhi.transition_image(
            target,
            Transition {
                target_layout: ImageLayout::StorageWrite,
                after_stage: PipelineStage::Top,
                before_stage: PipelineStage::ComputeShader,
                base_mip: self.current_mip,
                mip_count: 1,
            },
        );
        let compute_pass = rhi.create_compute_pass("specular-ibl-cook");
        rhi.begin_compute_pass(compute_pass.id());
        let steps = step_budget.clamp(MIN_STEPS_PER_FRAME, MAX_STEPS_PER_FRAME);
        for _ in 0..steps {
            rhi.dispatch(pso, [mip_extent, mip_extent, 6], [8, 8, 1]);
        }
        rhi.end_compute_pass();

        let new_total = accumulated_samples + steps * SAMPLE_BATCH;
        if new_total < TARGET_SAMPLE_COUNT {
            self.state = IblCookState::Cooking { accumulated_samples: new_total };
            return;
        }

        if self.current_mip + 1 < MIP_LEVEL_COUNT {
            self.current_mip += 1;
            self.state = IblCookState::Cooking { accumulated_samples: 0 };
        } else {
            self.finish_cook(rhi);
        }
    }

    fn finish_cook(&mut self, rhi: &mut RhiContext) {
        let Some(cooking) = self.cooking_target.take() else { return };
        if let Ok(cached) = rhi.create_render_target(self.desc(PixelFormat::RgbaFloat16, ImageUsage::SAMPLED)) {
            let cooking_bytes = rhi.image(&cooking).data().to_vec();
            let cached_bytes = downsample_to_half(&cooking_bytes);
            rhi.image_mut(&cached).data_mut().copy_from_slice(&cached_bytes);
            if let Err(error) = persist_cache(&cache_path("specular", &self.env_name), &cached_bytes) {
                log::warn!("failed to persist specular IBL cache for {}: {error}", self.env_name);
            }
            self.map = Some(cached);
        }
        self.state = IblCookState::Converged;
    }
}

/// Every cooking target is `RgbaFloat` (16 bytes/texel); every cached
/// target is `RgbaFloat16` (8 bytes/texel). Halves each 4-byte float to its
/// bit-identical `half::f16` representation, texel by texel.
fn downsample_to_half(full_precision: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(full_precision.len() / 2);
    for chunk in full_precision.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        out.extend_from_slice(&half::f16::from_f32(value).to_bits().to_le_bytes());
    }
    out
}

fn mip_chain_texel_count(resolution: u32, mip_levels: u32) -> usize {
    let mut total = 0usize;
    for mip in 0..mip_levels {
        let extent = (resolution >> mip).max(1) as usize;
        total += extent * extent;
    }
    total
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
    fn adaptive_budget_grows_with_headroom() {
        assert_eq!(adaptive_step_budget(0.0), MAX_STEPS_PER_FRAME);
        assert_eq!(adaptive_step_budget(1.0), MIN_STEPS_PER_FRAME);
        assert!(adaptive_step_budget(0.5) > MIN_STEPS_PER_FRAME);
    }

    #[test]
    fn brdf_lut_converges_after_enough_steps() {
        let mut rhi = ctx();
        let mut pass = BrdfLutPass::new(8);
        pass.init_render_resources(&mut rhi);
        assert!(!pass.state().is_converged());

        for _ in 0..(TARGET_SAMPLE_COUNT / (SAMPLE_BATCH * MAX_STEPS_PER_FRAME) + 1) {
            pass.render(&mut rhi, MAX_STEPS_PER_FRAME);
        }
        assert!(pass.state().is_converged());
        assert!(pass.lut().is_some());
    }

    #[test]
    fn specular_pass_advances_through_every_mip_before_converging() {
        let mut rhi = ctx();
        let mut pass = SpecularIblPass::new("studio", 8);
        pass.init_render_resources(&mut rhi);

        let mut seen_mips = Vec::new();
        for _ in 0..(MIP_LEVEL_COUNT * (TARGET_SAMPLE_COUNT / (SAMPLE_BATCH * MAX_STEPS_PER_FRAME) + 1)) {
            if pass.state().is_converged() {
                break;
            }
            seen_mips.push(pass.current_mip());
            pass.render(&mut rhi, MAX_STEPS_PER_FRAME);
        }
        assert!(pass.state().is_converged());
        assert!(seen_mips.contains(&(MIP_LEVEL_COUNT - 1)));
    }
}
