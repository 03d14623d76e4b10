//! The rendering-context seam.
//!
//! Every operation that touches device state takes an explicit context value
//! implementing [`RenderContext`]. The calls mirror the small subset of a GL
//! style API the sandbox needs; handles are plain ids owned by whichever
//! component created them.

use std::fmt;

use cgmath::Matrix4 as Mat4;

use crate::texture::SharedTexture;
use crate::vertex::AttributePointer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Fragment => write!(f, "fragment"),
        }
    }
}

/// How consecutive vertices are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Declared type of a uniform or shader input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Bool,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
}

impl GlslType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "int" => Self::Int,
            "bool" => Self::Bool,
            "mat2" => Self::Mat2,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            _ => return None,
        })
    }
}

/// One active uniform of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub ty: GlslType,
    pub location: UniformLocation,
}

/// Device operations used by programs, meshes and the renderer.
///
/// Compile and link report failure with the device's info log, unmodified.
pub trait RenderContext {
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String>;

    fn delete_shader(&mut self, shader: ShaderId);

    /// Link two compiled stages. `attribute_bindings` pins attribute names to
    /// indices before linking.
    fn link_program(
        &mut self,
        vertex: ShaderId,
        fragment: ShaderId,
        attribute_bindings: &[(u32, &str)],
    ) -> Result<ProgramId, String>;

    fn delete_program(&mut self, program: ProgramId);

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform>;

    fn use_program(&mut self, program: ProgramId);

    fn enable(&mut self, capability: Capability);

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);

    /// Set an integer (or sampler unit) uniform of the program in use.
    fn uniform_1i(&mut self, location: UniformLocation, value: i32);

    /// Upload a column-major 4x4 matrix to the program in use.
    fn uniform_matrix4(&mut self, location: UniformLocation, value: &Mat4<f32>);

    fn create_buffer(&mut self) -> BufferId;

    /// Replace the whole contents of `buffer`.
    fn buffer_data(&mut self, buffer: BufferId, data: &[u8]);

    fn delete_buffer(&mut self, buffer: BufferId);

    fn bind_texture(&mut self, unit: u32, texture: &SharedTexture);

    /// Bind `buffer` as the vertex source and describe how to read it.
    fn bind_vertex_buffer(&mut self, buffer: BufferId, pointers: &[AttributePointer]);

    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize);
}
