use cgmath::{ElementWise, Vector2 as Vec2, Vector4 as Vec4};

use crate::texture::Texture;

#[derive(Debug)]
pub struct FragmentData<'a> {
    pub color: Vec4<f32>, // interpolated vertex color
    pub uv: Vec2<f32>,
    /// Texture level of detail for this primitive.
    pub lod: f32,
    pub texture: Option<&'a Texture>,
}

pub trait FragmentShader: Sync {
    /// Final RGBA in 0..1 for one fragment.
    fn shade(&self, data: FragmentData) -> Vec4<f32>;
}

/// Vertex color only.
pub struct VertexColorShader;

impl FragmentShader for VertexColorShader {
    fn shade(&self, data: FragmentData) -> Vec4<f32> {
        data.color
    }
}

/// Texture sample modulated by vertex color. Without a bound texture it
/// degrades to vertex color.
pub struct TexturedShader;

impl FragmentShader for TexturedShader {
    fn shade(&self, data: FragmentData) -> Vec4<f32> {
        match data.texture {
            Some(tex) => tex.sample(data.uv, data.lod).mul_element_wise(data.color),
            None => data.color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_is_tinted_by_vertex_color() {
        let texture = Texture::solid([255, 255, 255, 128]);
        let out = TexturedShader.shade(FragmentData {
            color: Vec4::new(1.0, 0.5, 0.0, 1.0),
            uv: Vec2::new(0.5, 0.5),
            lod: 0.0,
            texture: Some(&texture),
        });

        assert_eq!(out.x, 1.0);
        assert_eq!(out.y, 0.5);
        assert_eq!(out.z, 0.0);
        assert!((out.w - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn untextured_falls_back_to_color() {
        let color = Vec4::new(0.1, 0.2, 0.3, 1.0);
        let data = || FragmentData {
            color,
            uv: Vec2::new(0.0, 0.0),
            lod: 0.0,
            texture: None,
        };
        assert_eq!(TexturedShader.shade(data()), color);
        assert_eq!(VertexColorShader.shade(data()), color);
    }
}
