use cgmath::{Matrix4 as Mat4, Vector2 as Vec2, Vector4 as Vec4};
use rayon::prelude::*;

use crate::vertex::AttributePointer;

/// Output of the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSpaceVertex {
    pub position: Vec4<f32>,
    pub color: Vec4<f32>,
    pub uv: Vec2<f32>,
}

impl ClipSpaceVertex {
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position + (other.position - self.position) * t,
            color: self.color + (other.color - self.color) * t,
            uv: self.uv + (other.uv - self.uv) * t,
        }
    }
}

pub struct VertexShaderUniforms<'a> {
    pub clip_matrix: &'a Mat4<f32>,
}

pub trait VertexShader: Sync {
    /// Shade vertex `index` of an interleaved buffer.
    fn shade_vertex(
        &self,
        data: &[u8],
        index: usize,
        uniforms: &VertexShaderUniforms,
    ) -> ClipSpaceVertex;

    fn shade_vertices(
        &self,
        data: &[u8],
        first: usize,
        count: usize,
        uniforms: &VertexShaderUniforms,
    ) -> Vec<ClipSpaceVertex> {
        (first..first + count)
            .into_par_iter()
            .map(|i| self.shade_vertex(data, i, uniforms))
            .collect()
    }
}

/// Read one attribute of vertex `index`, filling missing components with
/// (0, 0, 0, 1).
pub fn fetch(pointer: &AttributePointer, data: &[u8], index: usize) -> [f32; 4] {
    let mut out = [0.0, 0.0, 0.0, 1.0];
    let size = pointer.component_type.size();
    let start = index * pointer.stride + pointer.byte_offset;
    if start + pointer.component_count * size > data.len() {
        return out;
    }
    for (i, slot) in out.iter_mut().take(pointer.component_count).enumerate() {
        *slot = pointer.component_type.read(&data[start + i * size..]);
    }
    out
}

/// Transforms the position input by the clip matrix and forwards color and
/// texture coordinates unchanged.
pub struct FixedFunctionVertexShader {
    pub position: Option<AttributePointer>,
    pub color: Option<AttributePointer>,
    pub uv: Option<AttributePointer>,
}

impl VertexShader for FixedFunctionVertexShader {
    fn shade_vertex(
        &self,
        data: &[u8],
        index: usize,
        uniforms: &VertexShaderUniforms,
    ) -> ClipSpaceVertex {
        let position = self
            .position
            .as_ref()
            .map_or([0.0, 0.0, 0.0, 1.0], |p| fetch(p, data, index));
        let color = self
            .color
            .as_ref()
            .map_or([1.0, 1.0, 1.0, 1.0], |p| fetch(p, data, index));
        let uv = self
            .uv
            .as_ref()
            .map_or([0.0, 0.0, 0.0, 1.0], |p| fetch(p, data, index));

        ClipSpaceVertex {
            position: *uniforms.clip_matrix * Vec4::from(position),
            color: Vec4::from(color),
            uv: Vec2::new(uv[0], uv[1]),
        }
    }
}
