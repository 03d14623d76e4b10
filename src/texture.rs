use cgmath::{Vector2 as Vec2, Vector4 as Vec4};
use parking_lot::{RwLock, RwLockReadGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque blue, shown until an image finishes loading.
pub const PLACEHOLDER_RGBA: [u8; 4] = [0, 0, 255, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
    /// Linear within a level, blended between the two nearest levels.
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerParams {
    pub wrap: Wrap,
    pub min_filter: Filter,
    pub mag_filter: Filter,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            wrap: Wrap::Repeat,
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
        }
    }
}

/// One mip level, pixels packed as 0xRRGGBBAA.
#[derive(Debug, Clone)]
pub struct MipLevel {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct Texture {
    levels: Vec<MipLevel>,
    pub params: SamplerParams,
}

fn pack(rgba: [u8; 4]) -> u32 {
    (rgba[0] as u32) << 24 | (rgba[1] as u32) << 16 | (rgba[2] as u32) << 8 | rgba[3] as u32
}

fn unpack(color: u32) -> Vec4<f32> {
    Vec4::new(
        ((color >> 24) & 0xFF) as f32 / 255.0,
        ((color >> 16) & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        (color & 0xFF) as f32 / 255.0,
    )
}

fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

impl Texture {
    /// Build from tightly packed RGBA8 rows, top row first.
    ///
    /// Power-of-two images get a mip chain and repeat wrapping; any other size
    /// falls back to clamp-to-edge with linear filtering and no mips.
    /// Empty or truncated pixel data gives the placeholder color.
    pub fn new(width: usize, height: usize, rgba: &[u8]) -> Self {
        let needed = width.checked_mul(height).and_then(|n| n.checked_mul(4));
        if width == 0 || height == 0 || needed.is_none_or(|n| rgba.len() < n) {
            log::warn!(
                "texture data for {width}x{height} has {} bytes, using placeholder",
                rgba.len()
            );
            return Self::solid(PLACEHOLDER_RGBA);
        }
        let data: Vec<u32> = rgba
            .chunks_exact(4)
            .take(width * height)
            .map(|p| pack([p[0], p[1], p[2], p[3]]))
            .collect();
        let base = MipLevel {
            width,
            height,
            data,
        };

        if is_power_of_two(width) && is_power_of_two(height) {
            let mut texture = Self {
                levels: vec![base],
                params: SamplerParams {
                    wrap: Wrap::Repeat,
                    min_filter: Filter::LinearMipmapLinear,
                    mag_filter: Filter::Linear,
                },
            };
            texture.generate_mipmaps();
            texture
        } else {
            Self {
                levels: vec![base],
                params: SamplerParams {
                    wrap: Wrap::ClampToEdge,
                    min_filter: Filter::Linear,
                    mag_filter: Filter::Linear,
                },
            }
        }
    }

    /// A 1x1 texture of one color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            levels: vec![MipLevel {
                width: 1,
                height: 1,
                data: vec![pack(rgba)],
            }],
            params: SamplerParams::default(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, image::ImageError> {
        let img = image::open(path)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::new(width as usize, height as usize, img.as_raw()))
    }

    pub fn width(&self) -> usize {
        self.levels[0].width
    }

    pub fn height(&self) -> usize {
        self.levels[0].height
    }

    pub fn levels(&self) -> &[MipLevel] {
        &self.levels
    }

    /// Rebuild levels 1.. by 2x2 box filtering down to 1x1.
    pub fn generate_mipmaps(&mut self) {
        self.levels.truncate(1);
        loop {
            let prev = &self.levels[self.levels.len() - 1];
            if prev.width == 1 && prev.height == 1 {
                break;
            }
            let width = (prev.width / 2).max(1);
            let height = (prev.height / 2).max(1);
            let mut data = Vec::with_capacity(width * height);
            for y in 0..height {
                for x in 0..width {
                    let mut sum = Vec4::new(0.0, 0.0, 0.0, 0.0);
                    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                        let sx = (x * 2 + dx).min(prev.width - 1);
                        let sy = (y * 2 + dy).min(prev.height - 1);
                        sum += unpack(prev.data[sy * prev.width + sx]);
                    }
                    let avg = sum / 4.0;
                    data.push(pack([
                        (avg.x * 255.0).round() as u8,
                        (avg.y * 255.0).round() as u8,
                        (avg.z * 255.0).round() as u8,
                        (avg.w * 255.0).round() as u8,
                    ]));
                }
            }
            self.levels.push(MipLevel {
                width,
                height,
                data,
            });
        }
    }

    fn texel(&self, level: &MipLevel, x: i64, y: i64) -> Vec4<f32> {
        let (w, h) = (level.width as i64, level.height as i64);
        let (x, y) = match self.params.wrap {
            Wrap::Repeat => (x.rem_euclid(w), y.rem_euclid(h)),
            Wrap::ClampToEdge => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        };
        unpack(level.data[(y * w + x) as usize])
    }

    fn sample_level(&self, level: usize, uv: Vec2<f32>, filter: Filter) -> Vec4<f32> {
        let level = &self.levels[level.min(self.levels.len() - 1)];
        // V is flipped so (0, 0) addresses the bottom-left corner.
        let fx = uv.x * level.width as f32;
        let fy = (1.0 - uv.y) * level.height as f32;

        match filter {
            Filter::Nearest => self.texel(level, fx.floor() as i64, fy.floor() as i64),
            Filter::Linear | Filter::LinearMipmapLinear => {
                let (px, py) = (fx - 0.5, fy - 0.5);
                let (x0, y0) = (px.floor(), py.floor());
                let (tx, ty) = (px - x0, py - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let a = self.texel(level, x0, y0);
                let b = self.texel(level, x0 + 1, y0);
                let c = self.texel(level, x0, y0 + 1);
                let d = self.texel(level, x0 + 1, y0 + 1);
                let top = a * (1.0 - tx) + b * tx;
                let bottom = c * (1.0 - tx) + d * tx;
                top * (1.0 - ty) + bottom * ty
            }
        }
    }

    /// Sample RGBA in 0..1. `lod` is log2 of texels per pixel; values <= 0
    /// magnify.
    pub fn sample(&self, uv: Vec2<f32>, lod: f32) -> Vec4<f32> {
        if lod <= 0.0 || self.levels.len() == 1 {
            let filter = if lod <= 0.0 {
                self.params.mag_filter
            } else {
                self.params.min_filter
            };
            return self.sample_level(0, uv, filter);
        }

        match self.params.min_filter {
            Filter::LinearMipmapLinear => {
                let max = (self.levels.len() - 1) as f32;
                let lod = lod.min(max);
                let lower = lod.floor();
                let t = lod - lower;
                let a = self.sample_level(lower as usize, uv, Filter::Linear);
                if t == 0.0 {
                    return a;
                }
                let b = self.sample_level(lower as usize + 1, uv, Filter::Linear);
                a * (1.0 - t) + b * t
            }
            filter => self.sample_level(0, uv, filter),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed,
}

#[derive(Debug)]
pub struct TextureSlot {
    pub texture: Texture,
    pub state: LoadState,
}

/// A texture handle shared by any number of meshes.
///
/// The contents may be swapped from the loader thread; readers always see
/// either the placeholder or the finished image.
#[derive(Debug, Clone)]
pub struct SharedTexture {
    inner: Arc<RwLock<TextureSlot>>,
}

impl SharedTexture {
    pub fn new(texture: Texture) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TextureSlot {
                texture,
                state: LoadState::Loaded,
            })),
        }
    }

    pub fn placeholder() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TextureSlot {
                texture: Texture::solid(PLACEHOLDER_RGBA),
                state: LoadState::Pending,
            })),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, TextureSlot> {
        self.inner.read()
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.read().state
    }

    pub fn replace(&self, texture: Texture) {
        let mut slot = self.inner.write();
        slot.texture = texture;
        slot.state = LoadState::Loaded;
    }

    fn mark_failed(&self) {
        self.inner.write().state = LoadState::Failed;
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Start decoding `path` on the rayon pool and return its placeholder at once.
///
/// A failed load is only logged; the handle keeps the placeholder forever.
pub fn load_texture(path: impl Into<PathBuf>) -> SharedTexture {
    let path = path.into();
    let texture = SharedTexture::placeholder();
    let target = texture.clone();

    rayon::spawn(move || match Texture::from_file(&path) {
        Ok(decoded) => {
            log::debug!(
                "loaded texture {} ({}x{}, {} levels)",
                path.display(),
                decoded.width(),
                decoded.height(),
                decoded.levels().len()
            );
            target.replace(decoded);
        }
        Err(err) => {
            log::warn!("failed to load texture {}: {err}", path.display());
            target.mark_failed();
        }
    });

    texture
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_until_settled(texture: &SharedTexture) -> LoadState {
        let deadline = Instant::now() + Duration::from_secs(10);
        while texture.load_state() == LoadState::Pending && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        texture.load_state()
    }

    fn checker(size: usize) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(size * size * 4);
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        rgba
    }

    #[test]
    fn bad_dimensions_fall_back_to_placeholder() {
        let blue = Vec4::new(0.0, 0.0, 1.0, 1.0);
        for texture in [
            Texture::new(0, 4, &[]),
            Texture::new(4, 0, &[255; 16]),
            Texture::new(4, 4, &checker(2)),
        ] {
            assert_eq!((texture.width(), texture.height()), (1, 1));
            assert_eq!(texture.sample(Vec2::new(0.3, 0.7), 0.0), blue);
        }
    }

    #[test]
    fn placeholder_is_opaque_blue() {
        let texture = SharedTexture::placeholder();
        let slot = texture.read();
        assert_eq!(slot.state, LoadState::Pending);
        assert_eq!(
            slot.texture.sample(Vec2::new(0.3, 0.7), 0.0),
            Vec4::new(0.0, 0.0, 1.0, 1.0)
        );
    }

    #[test]
    fn power_of_two_gets_mip_chain() {
        let texture = Texture::new(4, 2, &checker(4)[..4 * 2 * 4]);
        let sizes: Vec<_> = texture
            .levels()
            .iter()
            .map(|l| (l.width, l.height))
            .collect();

        assert_eq!(sizes, vec![(4, 2), (2, 1), (1, 1)]);
        assert_eq!(texture.params.wrap, Wrap::Repeat);
        assert_eq!(texture.params.min_filter, Filter::LinearMipmapLinear);
    }

    #[test]
    fn non_power_of_two_clamps_without_mips() {
        let texture = Texture::new(3, 3, &checker(3));
        assert_eq!(texture.levels().len(), 1);
        assert_eq!(texture.params.wrap, Wrap::ClampToEdge);
        assert_eq!(texture.params.min_filter, Filter::Linear);
    }

    #[test]
    fn smallest_mip_averages_checker_to_grey() {
        let texture = Texture::new(4, 4, &checker(4));
        let far = texture.sample(Vec2::new(0.5, 0.5), 10.0);
        assert!((far.x - 0.5).abs() < 0.01);
        assert!((far.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn v_axis_points_up() {
        // top row red, bottom row green
        let rgba = [255, 0, 0, 255, 0, 255, 0, 255];
        let mut texture = Texture::new(1, 2, &rgba);
        texture.params.mag_filter = Filter::Nearest;

        assert_eq!(texture.sample(Vec2::new(0.5, 0.9), 0.0).x, 1.0);
        assert_eq!(texture.sample(Vec2::new(0.5, 0.1), 0.0).y, 1.0);
    }

    #[test]
    fn failed_load_keeps_placeholder() {
        let texture = load_texture("definitely/missing/texture.png");

        assert_eq!(wait_until_settled(&texture), LoadState::Failed);
        assert_eq!(texture.read().texture.width(), 1);
    }

    #[test]
    fn load_replaces_placeholder() {
        let path = std::env::temp_dir().join(format!(
            "sandbox-renderer-texture-{}.png",
            std::process::id()
        ));
        image::RgbaImage::from_raw(4, 4, checker(4))
            .unwrap()
            .save(&path)
            .unwrap();

        let texture = load_texture(&path);
        assert_eq!(wait_until_settled(&texture), LoadState::Loaded);
        assert_eq!(texture.read().texture.width(), 4);

        let _ = std::fs::remove_file(path);
    }
}
