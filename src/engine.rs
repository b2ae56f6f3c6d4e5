//! [`Engine`]: the umbrella coordinator that wires the shared render
//! substrate together (`SPEC_FULL.md` §5) behind one of the four
//! pipelines named in `RenderConfig::pipeline`.
//!
//! `Engine` is deliberately thin: it owns the `Scene` (MainThread state),
//! the `RhiContext` and the selected renderer (RenderThread state), and
//! the three `TaskQueue`s that let the two sides hand work to each other
//! without reaching across the boundary directly. It does not own a
//! window or an event loop -- those are external collaborators per §1.

use std::time::Instant;

use ember_core::task::{Role, TaskQueue};
use ember_render::{CpuRenderer, DeferredRenderer, ForwardRenderer, GpuRenderer, Pipeline, RenderConfig, ScreenshotRequest};
use ember_rhi::RhiContext;
use ember_scene::Scene;

use crate::errors::Result;

/// Rotating-bucket count for per-frame RHI resources (`SPEC_FULL.md`
/// §4.A "frame slot"). Matches the value every in-crate unit test already
/// drives its own `RhiContext` with.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// The renderer behind whichever `Pipeline` the config selected
/// (`SPEC_FULL.md` §9's tagged-enum replacement for virtual dispatch).
pub enum ActiveRenderer {
    Cpu(CpuRenderer),
    Gpu(GpuRenderer),
    Forward(ForwardRenderer),
    Deferred(DeferredRenderer),
}

impl ActiveRenderer {
    /// Constructs the renderer named by `config.pipeline`. The `gpu`
    /// pipeline additionally needs `supports_hardware_rt`, since §7
    /// requires the GPU renderer to refuse to start on a device without
    /// hardware ray tracing rather than silently falling back.
    fn new(rhi: &mut RhiContext, config: &RenderConfig, supports_hardware_rt: bool) -> Result<Self> {
        Ok(match config.pipeline {
            Pipeline::Cpu => ActiveRenderer::Cpu(CpuRenderer::new(rhi, config)),
            Pipeline::Gpu => ActiveRenderer::Gpu(GpuRenderer::new(rhi, config, supports_hardware_rt)?),
            Pipeline::Forward => ActiveRenderer::Forward(ForwardRenderer::new(rhi, ember_render::pass::ForwardVariant::ClassicPbr)),
            Pipeline::Deferred => ActiveRenderer::Deferred(DeferredRenderer::new(rhi)),
        })
    }

    fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        match self {
            ActiveRenderer::Cpu(r) => r.init_render_resources(rhi, config),
            ActiveRenderer::Gpu(r) => r.init_render_resources(rhi, config),
            ActiveRenderer::Forward(r) => r.init_render_resources(rhi, config),
            ActiveRenderer::Deferred(r) => r.init_render_resources(rhi, config),
        }
    }

    fn tick(&mut self, rhi: &mut RhiContext, scene: &mut Scene, config: &RenderConfig, frame_time_seconds: f32) {
        match self {
            ActiveRenderer::Cpu(r) => r.tick(rhi, scene, config),
            ActiveRenderer::Gpu(r) => r.tick(rhi, scene, config, frame_time_seconds),
            ActiveRenderer::Forward(r) => r.tick(rhi, scene, config, frame_time_seconds),
            ActiveRenderer::Deferred(r) => r.tick(rhi, scene, config),
        }
    }

    /// Queues a screenshot request against whichever renderer is active;
    /// completed through its callback on the next `tick` (§4.F, §7).
    pub fn request_screenshot(&mut self, request: ScreenshotRequest) {
        match self {
            ActiveRenderer::Cpu(r) => r.request_screenshot(request),
            ActiveRenderer::Gpu(r) => r.request_screenshot(request),
            ActiveRenderer::Forward(r) => r.request_screenshot(request),
            ActiveRenderer::Deferred(r) => r.request_screenshot(request),
        }
    }
}

/// The central coordinator: owns the scene, the RHI context, the active
/// renderer and the inter-role task queues (`SPEC_FULL.md` §5).
///
/// `Engine` has no window-management logic of its own, so it can be
/// driven by whatever native-view abstraction the host application uses
/// (`SPEC_FULL.md` §1 treats windowing as an external collaborator).
pub struct Engine {
    scene: Scene,
    rhi: RhiContext,
    renderer: ActiveRenderer,
    config: RenderConfig,

    main_tasks: TaskQueue,
    render_tasks: TaskQueue,
    worker_tasks: TaskQueue,

    last_tick: Option<Instant>,
    frame_count: u64,
}

impl Engine {
    /// Creates a new engine for `config.pipeline`. Fails only when the
    /// `gpu` pipeline is requested on a device that does not advertise
    /// hardware ray tracing (`supports_hardware_rt`); the other three
    /// pipelines never fail to construct.
    pub fn new(config: RenderConfig, supports_hardware_rt: bool) -> Result<Self> {
        let mut rhi = RhiContext::new(FRAMES_IN_FLIGHT);
        let mut renderer = ActiveRenderer::new(&mut rhi, &config, supports_hardware_rt)?;
        renderer.init_render_resources(&mut rhi, &config);

        Ok(Self {
            scene: Scene::new(),
            rhi,
            renderer,
            config,
            main_tasks: TaskQueue::new(Role::Main),
            render_tasks: TaskQueue::new(Role::Render),
            worker_tasks: TaskQueue::new(Role::Worker),
            last_tick: None,
            frame_count: 0,
        })
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn main_tasks(&self) -> &TaskQueue {
        &self.main_tasks
    }

    #[must_use]
    pub fn render_tasks(&self) -> &TaskQueue {
        &self.render_tasks
    }

    #[must_use]
    pub fn worker_tasks(&self) -> &TaskQueue {
        &self.worker_tasks
    }

    pub fn request_screenshot(&mut self, request: ScreenshotRequest) {
        self.renderer.request_screenshot(request);
    }

    /// Runs one full frame: drains each role's inbound queue (preserving
    /// the change journal's insertion-order guarantee, §5), updates the
    /// scene's dirty transforms, then hands off to the active renderer's
    /// `tick`, which itself runs the `update → begin_frame → render →
    /// end_frame` skeleton from §4.F.
    pub fn tick(&mut self) {
        self.main_tasks.drain();
        self.render_tasks.drain();
        self.worker_tasks.drain();

        self.scene.update_dirty_transform();

        let now = Instant::now();
        let frame_time_seconds = self.last_tick.map_or(1.0 / self.config.target_framerate, |prev| (now - prev).as_secs_f32());
        self.last_tick = Some(now);

        self.renderer.tick(&mut self.rhi, &mut self.scene, &self.config, frame_time_seconds);
        self.frame_count += 1;
    }

    /// Blocks until all in-flight GPU work has retired. Per §5, only the
    /// RenderThread may call this; it is meant for shutdown and for the
    /// one-time material-parameter-buffer growth documented in
    /// `ember_render::bindless`.
    pub fn wait_for_device_idle(&mut self) -> Result<()> {
        self.rhi.wait_for_device_idle();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_scene::{CameraState, ComponentKind};

    fn config(pipeline: Pipeline) -> RenderConfig {
        RenderConfig {
            pipeline,
            image_width: 8,
            image_height: 8,
            sample_per_pixel: 1,
            max_bounce: 1,
            ..RenderConfig::default()
        }
    }

    fn add_camera(scene: &mut Scene) {
        let node = scene.create_node("cam");
        scene.add_component(node, ComponentKind::Camera(CameraState::default()));
        scene.active_camera = Some(node);
    }

    #[test]
    fn cpu_pipeline_ticks_and_advances_frame_count() {
        let mut engine = Engine::new(config(Pipeline::Cpu), false).unwrap();
        add_camera(engine.scene_mut());
        engine.tick();
        engine.tick();
        assert_eq!(engine.frame_count(), 2);
    }

    #[test]
    fn forward_pipeline_never_needs_hardware_rt() {
        let mut engine = Engine::new(config(Pipeline::Forward), false).unwrap();
        add_camera(engine.scene_mut());
        engine.tick();
        assert_eq!(engine.frame_count(), 1);
    }

    #[test]
    fn deferred_pipeline_ticks() {
        let mut engine = Engine::new(config(Pipeline::Deferred), false).unwrap();
        add_camera(engine.scene_mut());
        engine.tick();
        assert_eq!(engine.frame_count(), 1);
    }

    #[test]
    fn gpu_pipeline_refuses_without_hardware_rt() {
        let result = Engine::new(config(Pipeline::Gpu), false);
        assert!(result.is_err());
    }

    #[test]
    fn gpu_pipeline_starts_with_hardware_rt() {
        let mut engine = Engine::new(config(Pipeline::Gpu), true).unwrap();
        add_camera(engine.scene_mut());
        engine.tick();
        assert_eq!(engine.frame_count(), 1);
    }

    #[test]
    fn screenshot_round_trips_through_the_active_renderer() {
        let mut engine = Engine::new(config(Pipeline::Cpu), false).unwrap();
        add_camera(engine.scene_mut());

        let got = std::sync::Arc::new(std::sync::Mutex::new(false));
        let got_clone = got.clone();
        engine.request_screenshot(ScreenshotRequest::new(move |result| {
            *got_clone.lock().unwrap() = result.is_ok();
        }));
        engine.tick();
        assert!(*got.lock().unwrap());
    }

    #[test]
    fn tasks_posted_to_main_drain_before_the_scene_update() {
        let mut engine = Engine::new(config(Pipeline::Cpu), false).unwrap();
        add_camera(engine.scene_mut());

        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_clone = ran.clone();
        engine.main_tasks().post(ember_core::task::Task::new(ember_core::task::TaskTarget::Main, move |_ctx| {
            ran_clone.store(true, std::sync::atomic::Ordering::SeqCst);
        }));
        engine.tick();
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
