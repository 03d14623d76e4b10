use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::geometry::PointShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    #[default]
    Lasers,
    Points,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/vertex-shader.glsl"),
            fragment: PathBuf::from("shaders/fragment-shader.glsl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LaserConfig {
    pub count: usize,
    pub length: f32,
    pub width: f32,
    pub texture: PathBuf,
    pub floor_texture: PathBuf,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            count: 9,
            length: 1e3,
            width: 0.03,
            texture: PathBuf::from("assets/laser-yellow.png"),
            floor_texture: PathBuf::from("assets/tex.png"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PointConfig {
    pub count: usize,
    pub shape: PointShape,
    pub shaders: ShaderConfig,
    /// Side of the square drawn per point, in pixels.
    pub size: f32,
}

impl Default for PointConfig {
    fn default() -> Self {
        Self {
            count: 20_000,
            shape: PointShape::default(),
            shaders: ShaderConfig {
                vertex: PathBuf::from("shaders/point-vertex.glsl"),
                fragment: PathBuf::from("shaders/point-fragment.glsl"),
            },
            size: 1.0,
        }
    }
}

/// Demo settings, read from JSON. Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub width: usize,
    pub height: usize,
    pub scene: SceneKind,
    pub fov: f32,
    pub shaders: ShaderConfig,
    pub lasers: LaserConfig,
    pub points: PointConfig,
    /// Render this many frames to `output_dir` instead of opening a window.
    pub frames: Option<usize>,
    pub output_dir: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            scene: SceneKind::default(),
            fov: 75.0,
            shaders: ShaderConfig::default(),
            lasers: LaserConfig::default(),
            points: PointConfig::default(),
            frames: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl SandboxConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
