use std::time::Duration;

use sandbox_renderer::camera::FixedCamera;
use sandbox_renderer::config::{SandboxConfig, SceneKind};
use sandbox_renderer::context::Primitive;
use sandbox_renderer::device::SoftwareDevice;
use sandbox_renderer::geometry::{self, PointShape};
use sandbox_renderer::mesh::Mesh;
use sandbox_renderer::program::Program;
use sandbox_renderer::renderer::Renderer;
use sandbox_renderer::sandbox::{self, DemoScene, textured_layout, wait_for_textures};
use sandbox_renderer::texture::{SharedTexture, Texture};

fn small_config(scene: SceneKind) -> SandboxConfig {
    let mut config = SandboxConfig {
        width: 32,
        height: 18,
        scene,
        ..SandboxConfig::default()
    };
    config.points.count = 100;
    config.points.shape = PointShape::Box;
    config
}

#[test]
fn laser_scene_draws_floor_then_lasers() {
    let config = small_config(SceneKind::Lasers);
    let mut device = SoftwareDevice::new(config.width, config.height);
    let mut scene = DemoScene::new(&mut device, &config).unwrap();

    scene.tick(0.0);
    device.clear();
    scene.render(&mut device);

    let calls = device.draw_calls();
    assert_eq!(calls.len(), 1 + config.lasers.count);
    assert!(calls.iter().all(|c| c.primitive == Primitive::TriangleStrip && c.count == 4));
    assert_eq!(scene.textures().len(), 1 + config.lasers.count);

    scene.release(&mut device);
    assert_eq!(device.buffer_count(), 0);
}

#[test]
fn point_scene_draws_one_cloud() {
    let config = small_config(SceneKind::Points);
    let mut device = SoftwareDevice::new(config.width, config.height);
    let mut scene = DemoScene::new(&mut device, &config).unwrap();

    scene.tick(1.0);
    device.clear();
    scene.render(&mut device);

    let calls = device.draw_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].primitive, Primitive::Points);
    assert_eq!(calls[0].count, 100);
}

#[test]
fn headless_run_writes_frames() {
    let dir = std::env::temp_dir().join(format!("sandbox-frames-{}", std::process::id()));
    let mut config = small_config(SceneKind::Points);
    config.frames = Some(2);
    config.output_dir = dir.clone();

    sandbox::run(&config).unwrap();

    assert!(dir.join("frame_0000.png").is_file());
    assert!(dir.join("frame_0001.png").is_file());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn textured_strip_samples_bound_texture() {
    let config = SandboxConfig::default();
    let mut device = SoftwareDevice::new(8, 8);
    let layout = textured_layout().unwrap();
    let program = Program::from_files(
        &mut device,
        &config.shaders.vertex,
        &config.shaders.fragment,
        &layout,
    )
    .unwrap();
    let renderer = Renderer::new(program).unwrap();

    let green = SharedTexture::new(Texture::solid([0, 255, 0, 255]));
    let quad = geometry::textured_rect(2.0, 2.0);
    let mesh = Mesh::new(&mut device, layout, Primitive::TriangleStrip, Some(&quad[..]))
        .unwrap()
        .with_texture(green.clone());

    device.clear();
    renderer.render(&mut device, &[&mesh], &FixedCamera::identity());

    assert!(device.bound_texture(0).is_some_and(|t| t.ptr_eq(&green)));
    assert!(device.framebuffer().data.iter().all(|&p| p == 0xFF00FF00));
}

#[test]
fn demo_textures_finish_loading() {
    let config = small_config(SceneKind::Lasers);
    let mut device = SoftwareDevice::new(config.width, config.height);
    let scene = DemoScene::new(&mut device, &config).unwrap();

    assert!(wait_for_textures(&scene.textures(), Duration::from_secs(5)));
}
