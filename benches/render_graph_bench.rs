//! Benchmarks the per-frame render-graph cost the core exists to pay:
//! mirroring a scene's change journal into `SceneRenderProxy` and then
//! composing the forward renderer's passes into one frame
//! (`SPEC_FULL.md` §2 "Data flow").

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use ember::pass::ForwardVariant;
use ember::{CameraState, ComponentKind, Engine, ForwardRenderer, MaterialResource, Pipeline, RenderConfig, RhiContext, Scene};
use ember_scene::MaterialVariant;
use glam::Vec3;

fn populate_scene(primitive_count: u32) -> Scene {
    let mut scene = Scene::new();

    let camera_node = scene.create_node("camera");
    scene.add_component(camera_node, ComponentKind::Camera(CameraState::default()));
    scene.active_camera = Some(camera_node);

    let material = scene.create_material(MaterialResource::new("bench"), MaterialVariant::Pbr);

    for i in 0..primitive_count {
        let node = scene.create_node(format!("sphere_{i}"));
        scene.node_mut(node).unwrap().local.position = Vec3::new(i as f32, 0.0, 0.0);
        scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material });
    }

    scene.update_dirty_transform();
    scene
}

/// The headline scenario: a fresh scene's first frame, where every
/// primitive shows up as a `{New}` journal record and the render graph
/// has to build proxies, BLASes and bindless bindings from scratch.
fn bench_first_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_graph/first_frame");
    for &count in &[16u32, 256, 1024] {
        group.bench_function(format!("{count}_spheres"), |b| {
            b.iter_batched(
                || {
                    let scene = populate_scene(count);
                    let config = RenderConfig {
                        pipeline: Pipeline::Forward,
                        image_width: 64,
                        image_height: 64,
                        ..RenderConfig::default()
                    };
                    let mut rhi = RhiContext::new(ember::FRAMES_IN_FLIGHT);
                    let mut renderer = ForwardRenderer::new(&mut rhi, ForwardVariant::ClassicPbr);
                    renderer.init_render_resources(&mut rhi, &config);
                    (scene, rhi, renderer, config)
                },
                |(mut scene, mut rhi, mut renderer, config)| {
                    renderer.tick(&mut rhi, &mut scene, &config, 1.0 / 60.0);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// The steady-state scenario: a scene with no journal activity, where the
/// render graph should pay only its per-frame UBO-upload and pass-record
/// cost, not proxy creation.
fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_graph/steady_state");
    for &count in &[16u32, 256, 1024] {
        let mut scene = populate_scene(count);
        let config = RenderConfig {
            pipeline: Pipeline::Forward,
            image_width: 64,
            image_height: 64,
            ..RenderConfig::default()
        };
        let mut rhi = RhiContext::new(ember::FRAMES_IN_FLIGHT);
        let mut renderer = ForwardRenderer::new(&mut rhi, ForwardVariant::ClassicPbr);
        renderer.init_render_resources(&mut rhi, &config);
        // Prime the proxy so the journal is empty before the timed loop.
        renderer.tick(&mut rhi, &mut scene, &config, 1.0 / 60.0);

        group.bench_function(format!("{count}_spheres"), |b| {
            b.iter(|| {
                renderer.tick(&mut rhi, &mut scene, &config, 1.0 / 60.0);
            });
        });
    }
    group.finish();
}

/// End-to-end cost of driving a whole `Engine` (task-queue drain, dirty
/// transform propagation, and the renderer tick together).
fn bench_engine_tick(c: &mut Criterion) {
    let config = RenderConfig {
        pipeline: Pipeline::Cpu,
        image_width: 32,
        image_height: 32,
        sample_per_pixel: 1,
        max_bounce: 2,
        ..RenderConfig::default()
    };
    let mut engine = Engine::new(config, false).expect("cpu pipeline never needs hardware RT");
    *engine.scene_mut() = populate_scene(64);

    c.bench_function("render_graph/engine_tick_cpu_64_spheres", |b| {
        b.iter(|| {
            engine.tick();
        });
    });
}

criterion_group!(benches, bench_first_frame, bench_steady_state, bench_engine_tick);
criterion_main!(benches);
