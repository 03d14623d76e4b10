//! The demo scenes and the loop that drives them.

use std::f32::consts::PI;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cgmath::{Matrix4 as Mat4, Point3, Quaternion, Rad, Rotation3, Vector3 as Vec3};
use minifb::{Key, Window, WindowOptions};

use crate::camera::PerspectiveCamera;
use crate::config::{SandboxConfig, SceneKind, ShaderConfig};
use crate::context::{Primitive, RenderContext};
use crate::device::SoftwareDevice;
use crate::error::Result;
use crate::geometry::{self, COLOR, POSITION, TEXTURE_COORD};
use crate::mesh::Mesh;
use crate::program::Program;
use crate::renderer::Renderer;
use crate::texture::{LoadState, SharedTexture, load_texture};
use crate::vertex::{AttributeSpec, VertexLayout};

const BACKGROUND: u32 = 0xFF000000;
const FRAME_RATE: usize = 60;
const TEXTURE_WAIT: Duration = Duration::from_secs(2);

/// Position + texture coordinate layout used by the laser scene.
pub fn textured_layout() -> Result<Arc<VertexLayout>> {
    Ok(Arc::new(VertexLayout::define(&[
        AttributeSpec::new(POSITION, 3),
        AttributeSpec::new(TEXTURE_COORD, 2),
    ])?))
}

/// Position + color layout used by the point scene.
pub fn colored_layout() -> Result<Arc<VertexLayout>> {
    Ok(Arc::new(VertexLayout::define(&[
        AttributeSpec::new(POSITION, 3),
        AttributeSpec::new(COLOR, 3),
    ])?))
}

fn load_renderer<C: RenderContext>(
    ctx: &mut C,
    shaders: &ShaderConfig,
    layout: &VertexLayout,
) -> Result<Renderer> {
    let program = Program::from_files(ctx, &shaders.vertex, &shaders.fragment, layout)?;
    Renderer::new(program)
}

/// A thin textured strip standing on the origin, billboarded around Y.
pub fn create_laser<C: RenderContext>(
    ctx: &mut C,
    layout: Arc<VertexLayout>,
    width: f32,
    length: f32,
    texture: SharedTexture,
) -> Result<Mesh> {
    let records = geometry::textured_rect(width, length);
    let mut laser = Mesh::new(ctx, layout, Primitive::TriangleStrip, Some(records.as_slice()))?
        .with_texture(texture);
    laser.position.y = length / 2.0;
    laser.billboard_y = true;
    Ok(laser)
}

/// Fan the lasers out around Z, `spread` apart, keeping their bases near the
/// origin.
pub fn set_laser_spread(lasers: &mut [Mesh], length: f32, spread: Rad<f32>) {
    let half = lasers.len().saturating_sub(1) as f32 / 2.0;
    for (i, laser) in lasers.iter_mut().enumerate() {
        let division = i as f32 - half;
        let angle = spread * division;
        let m = Mat4::from_translation(Vec3::new(-division * 1e-4, 0.0, -division * 1e-3))
            * Mat4::from_angle_z(angle)
            * Mat4::from_translation(Vec3::new(0.0, length / 2.0, 0.0));
        laser.set_matrix(&m);
    }
}

pub struct LaserScene {
    renderer: Renderer,
    floor: Mesh,
    lasers: Vec<Mesh>,
    length: f32,
    camera: PerspectiveCamera,
}

impl LaserScene {
    pub fn new<C: RenderContext>(ctx: &mut C, config: &SandboxConfig) -> Result<Self> {
        let layout = textured_layout()?;
        let renderer = load_renderer(ctx, &config.shaders, &layout)?;

        let floor_records = geometry::textured_rect(-10.0, 10.0);
        let mut floor = Mesh::new(
            ctx,
            layout.clone(),
            Primitive::TriangleStrip,
            Some(floor_records.as_slice()),
        )?
        .with_texture(load_texture(config.lasers.floor_texture.clone()));
        floor.rotation = Quaternion::from_angle_x(Rad(PI / 2.0));

        let laser_texture = load_texture(config.lasers.texture.clone());
        let lasers = (0..config.lasers.count)
            .map(|_| {
                create_laser(
                    ctx,
                    layout.clone(),
                    config.lasers.width,
                    config.lasers.length,
                    laser_texture.clone(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let mut camera = PerspectiveCamera::new(config.aspect(), config.fov);
        camera.set_position(Point3::new(0.0, 0.15, -3.0));
        camera.look_at(Point3::new(0.0, 0.0, 0.0));

        log::info!("laser scene ready with {} lasers", lasers.len());
        Ok(Self {
            renderer,
            floor,
            lasers,
            length: config.lasers.length,
            camera,
        })
    }

    pub fn lasers(&self) -> &[Mesh] {
        &self.lasers
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    fn tick(&mut self, time: f32) {
        let s = time.sin();
        self.camera.orbit_y(Rad(s * PI / 1000.0));
        set_laser_spread(
            &mut self.lasers,
            self.length,
            Rad((5.0 + 5.0 * s) * PI / 180.0),
        );
    }

    fn render<C: RenderContext>(&self, ctx: &mut C) {
        let scene: Vec<&Mesh> = std::iter::once(&self.floor).chain(&self.lasers).collect();
        self.renderer.render(ctx, &scene, &self.camera);
    }

    fn textures(&self) -> Vec<SharedTexture> {
        std::iter::once(&self.floor)
            .chain(&self.lasers)
            .filter_map(|m| m.texture.clone())
            .collect()
    }

    fn release<C: RenderContext>(self, ctx: &mut C) {
        self.floor.release(ctx);
        for laser in self.lasers {
            laser.release(ctx);
        }
        self.renderer.into_program().release(ctx);
    }
}

pub struct PointScene {
    renderer: Renderer,
    cloud: Mesh,
    camera: PerspectiveCamera,
}

impl PointScene {
    pub fn new<C: RenderContext>(ctx: &mut C, config: &SandboxConfig) -> Result<Self> {
        let layout = colored_layout()?;
        let renderer = load_renderer(ctx, &config.points.shaders, &layout)?;

        let mut rng = rand::rng();
        let records: Vec<_> =
            geometry::point_cloud(config.points.shape, config.points.count, &mut rng)
                .into_iter()
                .map(|mut record| {
                    let color: Vec<f32> = record
                        .get(POSITION)
                        .unwrap_or(&[0.0; 3][..])
                        .iter()
                        .map(|c| (c * 0.5 + 0.5).clamp(0.0, 1.0))
                        .collect();
                    record.set(COLOR, color);
                    record
                })
                .collect();
        let cloud = Mesh::new(ctx, layout, Primitive::Points, Some(records.as_slice()))?;

        let mut camera = PerspectiveCamera::new(config.aspect(), config.fov);
        camera.set_position(Point3::new(0.0, 0.0, -3.0));
        camera.look_at(Point3::new(0.0, 0.0, 0.0));

        log::info!(
            "point scene ready with {} {:?} points",
            cloud.vertex_count(),
            config.points.shape
        );
        Ok(Self {
            renderer,
            cloud,
            camera,
        })
    }

    fn tick(&mut self, time: f32) {
        self.cloud.rotation = Quaternion::from_angle_y(Rad(time * 0.5));
    }

    fn render<C: RenderContext>(&self, ctx: &mut C) {
        self.renderer.render(ctx, &[&self.cloud], &self.camera);
    }

    fn release<C: RenderContext>(self, ctx: &mut C) {
        self.cloud.release(ctx);
        self.renderer.into_program().release(ctx);
    }
}

pub enum DemoScene {
    Lasers(LaserScene),
    Points(PointScene),
}

impl DemoScene {
    pub fn new<C: RenderContext>(ctx: &mut C, config: &SandboxConfig) -> Result<Self> {
        Ok(match config.scene {
            SceneKind::Lasers => DemoScene::Lasers(LaserScene::new(ctx, config)?),
            SceneKind::Points => DemoScene::Points(PointScene::new(ctx, config)?),
        })
    }

    /// Advance the animation to `time` seconds.
    pub fn tick(&mut self, time: f32) {
        match self {
            DemoScene::Lasers(scene) => scene.tick(time),
            DemoScene::Points(scene) => scene.tick(time),
        }
    }

    pub fn render<C: RenderContext>(&self, ctx: &mut C) {
        match self {
            DemoScene::Lasers(scene) => scene.render(ctx),
            DemoScene::Points(scene) => scene.render(ctx),
        }
    }

    pub fn textures(&self) -> Vec<SharedTexture> {
        match self {
            DemoScene::Lasers(scene) => scene.textures(),
            DemoScene::Points(_) => Vec::new(),
        }
    }

    pub fn release<C: RenderContext>(self, ctx: &mut C) {
        match self {
            DemoScene::Lasers(scene) => scene.release(ctx),
            DemoScene::Points(scene) => scene.release(ctx),
        }
    }
}

/// Block until no texture is still loading, or `timeout` passes.
pub fn wait_for_textures(textures: &[SharedTexture], timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        if textures.iter().all(|t| t.load_state() != LoadState::Pending) {
            return true;
        }
        if start.elapsed() >= timeout {
            log::warn!("textures still loading after {timeout:?}");
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Build the configured scene and run it in a window or headless.
pub fn run(config: &SandboxConfig) -> Result<()> {
    let mut device = SoftwareDevice::new(config.width, config.height);
    device.set_clear_color(BACKGROUND);
    device.set_point_size(config.points.size);

    let mut scene = DemoScene::new(&mut device, config)?;
    match config.frames {
        Some(frames) => run_headless(&mut device, &mut scene, config, frames)?,
        None => run_window(&mut device, &mut scene, config)?,
    }
    scene.release(&mut device);
    Ok(())
}

fn draw_frame(device: &mut SoftwareDevice, scene: &mut DemoScene, time: f32) {
    scene.tick(time);
    device.clear();
    scene.render(device);
}

fn run_headless(
    device: &mut SoftwareDevice,
    scene: &mut DemoScene,
    config: &SandboxConfig,
    frames: usize,
) -> Result<()> {
    fs::create_dir_all(&config.output_dir)?;
    wait_for_textures(&scene.textures(), TEXTURE_WAIT);

    for i in 0..frames {
        draw_frame(device, scene, i as f32 / FRAME_RATE as f32);
        let path = config.output_dir.join(format!("frame_{i:04}.png"));
        device.framebuffer().save_to_image(&path.to_string_lossy())?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn run_window(
    device: &mut SoftwareDevice,
    scene: &mut DemoScene,
    config: &SandboxConfig,
) -> Result<()> {
    let mut window = Window::new(
        "Sandbox - ESC to exit",
        config.width,
        config.height,
        WindowOptions::default(),
    )?;
    window.set_target_fps(FRAME_RATE);
    log::info!("window opened at {}x{}", config.width, config.height);

    let start = Instant::now();
    while window.is_open() && !window.is_key_down(Key::Escape) {
        draw_frame(device, scene, start.elapsed().as_secs_f32());
        window.update_with_buffer(&device.framebuffer().data, config.width, config.height)?;
    }
    Ok(())
}
