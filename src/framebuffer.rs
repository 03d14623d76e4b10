use cgmath::Vector4 as Vec4;

use crate::context::BlendFactor;

/// Depth value of a cleared pixel (far plane in window space).
pub const CLEAR_DEPTH: f32 = 1.0;

#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    /// 0xAARRGGBB, the layout `minifb` presents directly.
    pub data: Vec<u32>,
    pub depth: Vec<f32>,
}

/// Per-fragment output state for one draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteState {
    pub depth_test: bool,
    pub blend: Option<(BlendFactor, BlendFactor)>,
}

pub fn to_argb(color: Vec4<f32>) -> u32 {
    let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    c(color.w) << 24 | c(color.x) << 16 | c(color.y) << 8 | c(color.z)
}

pub fn from_argb(color: u32) -> Vec4<f32> {
    Vec4::new(
        ((color >> 16) & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        (color & 0xFF) as f32 / 255.0,
        ((color >> 24) & 0xFF) as f32 / 255.0,
    )
}

fn factor(f: BlendFactor, src: Vec4<f32>) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcAlpha => src.w,
        BlendFactor::OneMinusSrcAlpha => 1.0 - src.w,
    }
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        FrameBuffer {
            width,
            height,
            data: vec![0; width * height],
            depth: vec![CLEAR_DEPTH; width * height],
        }
    }

    pub fn clear(&mut self, color: u32) {
        self.data.fill(color);
        self.depth.fill(CLEAR_DEPTH);
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.data[y * self.width + x]
    }

    /// Depth-test and blend one fragment. Returns whether it was written.
    pub fn write_fragment(
        &mut self,
        x: usize,
        y: usize,
        color: Vec4<f32>,
        depth: f32,
        state: &WriteState,
    ) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let idx = y * self.width + x;
        if state.depth_test && !(depth < self.depth[idx]) {
            return false;
        }

        let out = match state.blend {
            Some((src, dst)) => {
                let current = from_argb(self.data[idx]);
                color * factor(src, color) + current * factor(dst, color)
            }
            None => color,
        };
        self.data[idx] = to_argb(out);
        if state.depth_test {
            self.depth[idx] = depth;
        }
        true
    }

    pub fn save_to_image(&self, filepath: &str) -> Result<(), image::ImageError> {
        use image::{ImageBuffer, Rgba};

        let mut img = ImageBuffer::new(self.width as u32, self.height as u32);

        for y in 0..self.height {
            for x in 0..self.width {
                let color = self.data[y * self.width + x];
                let a = ((color >> 24) & 0xFF) as u8;
                let r = ((color >> 16) & 0xFF) as u8;
                let g = ((color >> 8) & 0xFF) as u8;
                let b = (color & 0xFF) as u8;

                img.put_pixel(x as u32, y as u32, Rgba([r, g, b, a]));
            }
        }

        img.save(filepath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPAQUE: WriteState = WriteState {
        depth_test: true,
        blend: None,
    };

    #[test]
    fn nearer_fragment_wins_depth_test() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.clear(0xFF000000);

        assert!(fb.write_fragment(1, 1, Vec4::new(1.0, 0.0, 0.0, 1.0), 0.5, &OPAQUE));
        assert!(!fb.write_fragment(1, 1, Vec4::new(0.0, 1.0, 0.0, 1.0), 0.7, &OPAQUE));
        assert_eq!(fb.pixel(1, 1), 0xFFFF0000);
        assert!(fb.write_fragment(1, 1, Vec4::new(0.0, 0.0, 1.0, 1.0), 0.2, &OPAQUE));
        assert_eq!(fb.pixel(1, 1), 0xFF0000FF);
    }

    #[test]
    fn depth_test_off_always_writes() {
        let mut fb = FrameBuffer::new(1, 1);
        let state = WriteState {
            depth_test: false,
            blend: None,
        };
        fb.write_fragment(0, 0, Vec4::new(1.0, 1.0, 1.0, 1.0), 0.9, &state);
        assert!(fb.write_fragment(0, 0, Vec4::new(0.0, 0.0, 0.0, 1.0), 0.95, &state));
        assert_eq!(fb.depth[0], CLEAR_DEPTH);
    }

    #[test]
    fn source_alpha_blending_mixes_colors() {
        let mut fb = FrameBuffer::new(1, 1);
        fb.clear(0xFF0000FF);
        let state = WriteState {
            depth_test: false,
            blend: Some((BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)),
        };

        fb.write_fragment(0, 0, Vec4::new(1.0, 0.0, 0.0, 0.5), 0.5, &state);

        let out = from_argb(fb.pixel(0, 0));
        assert!((out.x - 0.5).abs() < 0.01);
        assert!((out.z - 0.5).abs() < 0.01);
    }

    #[test]
    fn writes_outside_are_ignored() {
        let mut fb = FrameBuffer::new(2, 2);
        assert!(!fb.write_fragment(2, 0, Vec4::new(1.0, 1.0, 1.0, 1.0), 0.0, &OPAQUE));
    }
}
