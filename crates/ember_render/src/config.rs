//! `RenderConfig`: the enumerated configuration surface the core consumes
//! (`SPEC_FULL.md` §6). Derives `serde::{Serialize, Deserialize}` so an
//! external collaborator (a CLI or editor) can load it from disk; the
//! core never performs that load itself, matching the reference engine's
//! `RenderSettings` being a plain data struct handed in by the app.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pipeline {
    Cpu,
    Gpu,
    Forward,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugMode {
    None,
    Depth,
    WorldNormal,
    Albedo,
    PrimitiveId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsvgfDebugView {
    None,
    Reprojection,
    Moments,
    Variance,
    History,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub pipeline: Pipeline,
    pub image_width: u32,
    pub image_height: u32,

    pub max_bounce: u32,
    pub sample_per_pixel: u32,
    pub max_sample_per_pixel: u32,
    pub use_dynamic_spp: bool,
    pub target_framerate: f32,
    pub gpu_time_budget_ratio: f32,

    pub use_prepass: bool,
    pub use_ssao: bool,
    pub use_diffuse_ibl: bool,
    pub use_specular_ibl: bool,
    pub msaa_samples: u32,
    pub shadow_map_resolution: u32,

    pub debug_mode: DebugMode,
    pub output_image: Option<String>,
    pub render_ui: bool,

    pub asvgf: bool,
    pub asvgf_history_cap: u32,
    pub asvgf_atrous_iterations: u32,
    pub asvgf_freeze_history: bool,
    pub asvgf_force_clear_history: bool,
    pub asvgf_debug_view: AsvgfDebugView,
    pub asvgf_test_stage: Option<u32>,

    pub enable_nee: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pipeline: Pipeline::Forward,
            image_width: 1280,
            image_height: 720,
            max_bounce: 4,
            sample_per_pixel: 4,
            max_sample_per_pixel: 256,
            use_dynamic_spp: true,
            target_framerate: 60.0,
            gpu_time_budget_ratio: 0.8,
            use_prepass: true,
            use_ssao: false,
            use_diffuse_ibl: true,
            use_specular_ibl: true,
            msaa_samples: 1,
            shadow_map_resolution: 2048,
            debug_mode: DebugMode::None,
            output_image: None,
            render_ui: true,
            asvgf: true,
            asvgf_history_cap: 32,
            asvgf_atrous_iterations: 4,
            asvgf_freeze_history: false,
            asvgf_force_clear_history: false,
            asvgf_debug_view: AsvgfDebugView::None,
            asvgf_test_stage: None,
            enable_nee: false,
        }
    }
}
