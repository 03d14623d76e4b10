//! CPU implementation of [`RenderContext`].
//!
//! `SoftwareDevice` keeps the GL-style state machine (bound program, enabled
//! capabilities, texture units, bound vertex buffer) and rasterizes draw calls
//! into its own [`FrameBuffer`]. Shaders are compiled to their interface by
//! [`glsl`](crate::glsl); shading itself is fixed-function:
//!
//! - position: the attribute at location 0, multiplied by the first `mat4`
//!   uniform of the vertex stage;
//! - texture coordinates: the first `vec2` attribute after position;
//! - color: the first `vec3`/`vec4` attribute after position (white if none);
//! - fragment: texture unit sample times color when the fragment stage has a
//!   `sampler2D` and texture coordinates exist, else color.

pub mod clip;
pub mod fragment_shader;
pub mod vertex_shader;

use std::collections::HashMap;

use cgmath::{Matrix4 as Mat4, SquareMatrix, Vector2 as Vec2};

use crate::context::{
    ActiveUniform, BlendFactor, BufferId, Capability, GlslType, Primitive, ProgramId,
    RenderContext, ShaderId, ShaderStage, UniformLocation,
};
use crate::framebuffer::{FrameBuffer, WriteState};
use crate::glsl::{self, LinkedInterface, ShaderInterface};
use crate::rasterizer::{self, Fragment, RasterPoint};
use crate::texture::{SharedTexture, Texture};
use crate::vertex::AttributePointer;

use self::clip::{Clipper, NearPlaneClipper};
use self::fragment_shader::{FragmentData, FragmentShader, TexturedShader, VertexColorShader};
use self::vertex_shader::{
    ClipSpaceVertex, FixedFunctionVertexShader, VertexShader, VertexShaderUniforms,
};

/// One recorded `draw_arrays` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub program: Option<ProgramId>,
    pub primitive: Primitive,
    pub first: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Mat4(Mat4<f32>),
}

/// Which linked inputs drive the fixed-function stages.
#[derive(Debug, Clone, Default, PartialEq)]
struct Shading {
    position: Option<u32>,
    color: Option<u32>,
    uv: Option<u32>,
    clip_matrix: Option<UniformLocation>,
    sampler: Option<UniformLocation>,
}

impl Shading {
    fn from_interface(interface: &LinkedInterface) -> Self {
        let position = interface
            .attribute_at(0)
            .map(|_| 0)
            .or_else(|| interface.attributes.first().map(|(l, _)| *l));
        let others = || {
            interface
                .attributes
                .iter()
                .filter(move |(l, _)| Some(*l) != position)
        };
        let uv = others()
            .find(|(_, d)| d.ty == GlslType::Vec2)
            .map(|(l, _)| *l);
        let color = others()
            .find(|(_, d)| matches!(d.ty, GlslType::Vec3 | GlslType::Vec4))
            .map(|(l, _)| *l);
        let clip_matrix = interface
            .uniforms
            .iter()
            .find(|(_, d, stage)| *stage == ShaderStage::Vertex && d.ty == GlslType::Mat4)
            .map(|(l, _, _)| *l);
        let sampler = interface
            .uniforms
            .iter()
            .find(|(_, d, _)| d.ty == GlslType::Sampler2D)
            .map(|(l, _, _)| *l)
            .filter(|_| uv.is_some());

        Self {
            position,
            color,
            uv,
            clip_matrix,
            sampler,
        }
    }
}

struct LinkedProgram {
    interface: LinkedInterface,
    shading: Shading,
    values: HashMap<UniformLocation, UniformValue>,
}

impl LinkedProgram {
    fn uniform_type(&self, location: UniformLocation) -> Option<GlslType> {
        self.interface
            .uniforms
            .iter()
            .find(|(l, _, _)| *l == location)
            .map(|(_, d, _)| d.ty)
    }
}

pub struct SoftwareDevice {
    framebuffer: FrameBuffer,
    clear_color: u32,
    point_size: f32,
    next_id: u32,
    shaders: HashMap<ShaderId, ShaderInterface>,
    programs: HashMap<ProgramId, LinkedProgram>,
    buffers: HashMap<BufferId, Vec<u8>>,
    current_program: Option<ProgramId>,
    depth_test: bool,
    blend: bool,
    blend_func: (BlendFactor, BlendFactor),
    texture_units: HashMap<u32, SharedTexture>,
    vertex_buffer: Option<(BufferId, Vec<AttributePointer>)>,
    draw_log: Vec<DrawCall>,
}

impl SoftwareDevice {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            framebuffer: FrameBuffer::new(width, height),
            clear_color: 0xFF000000,
            point_size: 1.0,
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            current_program: None,
            depth_test: false,
            blend: false,
            blend_func: (BlendFactor::One, BlendFactor::Zero),
            texture_units: HashMap::new(),
            vertex_buffer: None,
            draw_log: Vec::new(),
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn width(&self) -> usize {
        self.framebuffer.width
    }

    pub fn height(&self) -> usize {
        self.framebuffer.height
    }

    pub fn set_clear_color(&mut self, argb: u32) {
        self.clear_color = argb;
    }

    /// Side length in pixels of rasterized points.
    pub fn set_point_size(&mut self, size: f32) {
        self.point_size = size;
    }

    /// Clear color and depth and start a new draw log.
    pub fn clear(&mut self) {
        self.framebuffer.clear(self.clear_color);
        self.draw_log.clear();
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// Draw calls issued since the last [`clear`](Self::clear).
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_log
    }

    pub fn uniform_value(
        &self,
        program: ProgramId,
        location: UniformLocation,
    ) -> Option<&UniformValue> {
        self.programs.get(&program)?.values.get(&location)
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        match capability {
            Capability::DepthTest => self.depth_test,
            Capability::Blend => self.blend,
        }
    }

    pub fn blend_factors(&self) -> (BlendFactor, BlendFactor) {
        self.blend_func
    }

    pub fn bound_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    pub fn bound_texture(&self, unit: u32) -> Option<&SharedTexture> {
        self.texture_units.get(&unit)
    }

    pub fn buffer_len(&self, buffer: BufferId) -> Option<usize> {
        self.buffers.get(&buffer).map(Vec::len)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Location an attribute name was assigned at link time.
    pub fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .interface
            .attributes
            .iter()
            .find(|(_, d)| d.name == name)
            .map(|(l, _)| *l)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program_id) = self.current_program else {
            log::warn!("uniform {location:?} set with no program in use");
            return;
        };
        let Some(program) = self.programs.get_mut(&program_id) else {
            return;
        };
        let accepted = match (program.uniform_type(location), &value) {
            (Some(GlslType::Int | GlslType::Bool | GlslType::Sampler2D), UniformValue::Int(_)) => {
                true
            }
            (Some(GlslType::Mat4), UniformValue::Mat4(_)) => true,
            (None, _) => {
                log::warn!("program {program_id:?} has no uniform at {location:?}");
                false
            }
            (Some(ty), _) => {
                log::warn!("uniform {location:?} of type {ty:?} cannot take {value:?}");
                false
            }
        };
        if accepted {
            program.values.insert(location, value);
        }
    }

    fn to_raster(&self, v: &ClipSpaceVertex) -> RasterPoint {
        let inv_w = 1.0 / v.position.w;
        let ndc = v.position.truncate() * inv_w;
        let (w, h) = (self.framebuffer.width as f32, self.framebuffer.height as f32);

        RasterPoint {
            pos: Vec2::new((ndc.x + 1.0) * 0.5 * w, h - (ndc.y + 1.0) * 0.5 * h),
            z: (ndc.z + 1.0) * 0.5,
            inv_w,
            color: v.color,
            uv: v.uv,
        }
    }
}

/// Mip level for a triangle from its texel-to-pixel area ratio.
fn triangle_lod(points: &[RasterPoint; 3], texture: &Texture) -> f32 {
    let cross = |a: Vec2<f32>, b: Vec2<f32>| (a.x * b.y - a.y * b.x).abs();
    let screen = cross(points[1].pos - points[0].pos, points[2].pos - points[0].pos);
    let tw = texture.width() as f32;
    let th = texture.height() as f32;
    let scale = Vec2::new(tw, th);
    let uv0 = Vec2::new(points[0].uv.x * scale.x, points[0].uv.y * scale.y);
    let uv1 = Vec2::new(points[1].uv.x * scale.x, points[1].uv.y * scale.y);
    let uv2 = Vec2::new(points[2].uv.x * scale.x, points[2].uv.y * scale.y);
    let texels = cross(uv1 - uv0, uv2 - uv0);
    if screen <= f32::EPSILON || texels <= f32::EPSILON {
        return 0.0;
    }
    0.5 * (texels / screen).log2()
}

fn shade_fragments(
    framebuffer: &mut FrameBuffer,
    fragments: Vec<Fragment>,
    shader: &dyn FragmentShader,
    texture: Option<&Texture>,
    lod: f32,
    state: &WriteState,
) {
    for fragment in fragments {
        let color = shader.shade(FragmentData {
            color: fragment.color,
            uv: fragment.uv,
            lod,
            texture,
        });
        framebuffer.write_fragment(fragment.x, fragment.y, color, fragment.z, state);
    }
}

impl RenderContext for SoftwareDevice {
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let interface = glsl::compile(stage, source)?;
        let id = ShaderId(self.next_id());
        log::debug!(
            "compiled {stage} shader {id:?}: {} inputs, {} uniforms",
            interface.inputs.len(),
            interface.uniforms.len()
        );
        self.shaders.insert(id, interface);
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn link_program(
        &mut self,
        vertex: ShaderId,
        fragment: ShaderId,
        attribute_bindings: &[(u32, &str)],
    ) -> Result<ProgramId, String> {
        let (Some(vs), Some(fs)) = (self.shaders.get(&vertex), self.shaders.get(&fragment)) else {
            return Err("ERROR: attached shader handle is not valid".to_string());
        };
        let interface = glsl::link(vs, fs, attribute_bindings)?;
        let shading = Shading::from_interface(&interface);
        let id = ProgramId(self.next_id());
        log::debug!("linked program {id:?} with {shading:?}");

        self.programs.insert(
            id,
            LinkedProgram {
                interface,
                shading,
                values: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform> {
        self.programs
            .get(&program)
            .map(|p| {
                p.interface
                    .uniforms
                    .iter()
                    .map(|(location, d, _)| ActiveUniform {
                        name: d.name.clone(),
                        ty: d.ty,
                        location: *location,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.contains_key(&program) {
            self.current_program = Some(program);
        } else {
            log::warn!("use_program with unknown program {program:?}");
        }
    }

    fn enable(&mut self, capability: Capability) {
        match capability {
            Capability::DepthTest => self.depth_test = true,
            Capability::Blend => self.blend = true,
        }
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend_func = (src, dst);
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        self.set_uniform(location, UniformValue::Int(value));
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, value: &Mat4<f32>) {
        self.set_uniform(location, UniformValue::Mat4(*value));
    }

    fn create_buffer(&mut self) -> BufferId {
        let id = BufferId(self.next_id());
        self.buffers.insert(id, Vec::new());
        id
    }

    fn buffer_data(&mut self, buffer: BufferId, data: &[u8]) {
        match self.buffers.get_mut(&buffer) {
            Some(contents) => {
                contents.clear();
                contents.extend_from_slice(data);
            }
            None => log::warn!("buffer_data on unknown buffer {buffer:?}"),
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        if matches!(&self.vertex_buffer, Some((bound, _)) if *bound == buffer) {
            self.vertex_buffer = None;
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: &SharedTexture) {
        self.texture_units.insert(unit, texture.clone());
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId, pointers: &[AttributePointer]) {
        self.vertex_buffer = Some((buffer, pointers.to_vec()));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize) {
        self.draw_log.push(DrawCall {
            program: self.current_program,
            primitive,
            first,
            count,
        });
        log::trace!("draw_arrays({primitive:?}, {first}, {count})");

        let Some(program) = self.current_program.and_then(|id| self.programs.get(&id)) else {
            log::warn!("draw_arrays with no program in use");
            return;
        };
        let Some((buffer, pointers)) = &self.vertex_buffer else {
            log::warn!("draw_arrays with no vertex buffer bound");
            return;
        };
        let Some(data) = self.buffers.get(buffer) else {
            return;
        };

        let shading = &program.shading;
        let pointer_at = |location: Option<u32>| {
            location.and_then(|l| pointers.iter().find(|p| p.index == l).cloned())
        };
        let vertex_shader = FixedFunctionVertexShader {
            position: pointer_at(shading.position),
            color: pointer_at(shading.color),
            uv: pointer_at(shading.uv),
        };
        let clip_matrix = match shading.clip_matrix.and_then(|l| program.values.get(&l)) {
            Some(UniformValue::Mat4(m)) => *m,
            _ => Mat4::identity(),
        };
        let vertices = vertex_shader.shade_vertices(
            data,
            first,
            count,
            &VertexShaderUniforms {
                clip_matrix: &clip_matrix,
            },
        );

        let texture = shading.sampler.and_then(|location| {
            let unit = match program.values.get(&location) {
                Some(UniformValue::Int(unit)) => *unit as u32,
                _ => 0,
            };
            self.texture_units.get(&unit).cloned()
        });
        let fragment_shader: Box<dyn FragmentShader> = match texture {
            Some(_) => Box::new(TexturedShader),
            None => Box::new(VertexColorShader),
        };
        let state = WriteState {
            depth_test: self.depth_test,
            blend: self.blend.then_some(self.blend_func),
        };

        let guard = texture.as_ref().map(SharedTexture::read);
        let texture = guard.as_ref().map(|slot| &slot.texture);
        let (width, height) = (self.framebuffer.width, self.framebuffer.height);
        let clipper = NearPlaneClipper;

        match primitive {
            Primitive::Points => {
                for v in vertices.iter().filter(|v| clipper.keep_point(v)) {
                    let p = self.to_raster(v);
                    let fragments = rasterizer::point_fragments(&p, self.point_size, width, height);
                    shade_fragments(&mut self.framebuffer, fragments, &*fragment_shader, texture, 0.0, &state);
                }
            }
            Primitive::Lines | Primitive::LineStrip => {
                let segments: Vec<[ClipSpaceVertex; 2]> = if primitive == Primitive::Lines {
                    vertices.chunks_exact(2).map(|c| [c[0], c[1]]).collect()
                } else {
                    vertices.windows(2).map(|w| [w[0], w[1]]).collect()
                };
                for segment in segments {
                    let Some([a, b]) = clipper.clip_line(&segment) else {
                        continue;
                    };
                    let (a, b) = (self.to_raster(&a), self.to_raster(&b));
                    let fragments = rasterizer::line_fragments(&a, &b, width, height);
                    shade_fragments(&mut self.framebuffer, fragments, &*fragment_shader, texture, 0.0, &state);
                }
            }
            Primitive::Triangles | Primitive::TriangleStrip => {
                let triangles: Vec<[ClipSpaceVertex; 3]> = if primitive == Primitive::Triangles {
                    vertices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
                } else {
                    // odd triangles swap their first two vertices to keep winding
                    (0..vertices.len().saturating_sub(2))
                        .map(|i| {
                            if i % 2 == 0 {
                                [vertices[i], vertices[i + 1], vertices[i + 2]]
                            } else {
                                [vertices[i + 1], vertices[i], vertices[i + 2]]
                            }
                        })
                        .collect()
                };
                for triangle in triangles {
                    for clipped in clipper.clip_triangle(&triangle) {
                        let points = clipped.map(|v| self.to_raster(&v));
                        let lod = texture.map_or(0.0, |t| triangle_lod(&points, t));
                        let fragments = rasterizer::triangle_fragments(&points, width, height);
                        shade_fragments(&mut self.framebuffer, fragments, &*fragment_shader, texture, lod, &state);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{AttributeSpec, VertexLayout, VertexRecord, interleave};

    const VERTEX: &str = "attribute vec3 position;\nattribute vec3 color;\nvarying vec3 vColor;\n\
        uniform mat4 mvpMatrix;\n\
        void main() { vColor = color; gl_Position = mvpMatrix * vec4(position, 1); }";
    const FRAGMENT: &str = "precision mediump float;\nvarying vec3 vColor;\n\
        void main() { gl_FragColor = vec4(vColor, 1); }";

    fn device_with_program() -> (SoftwareDevice, ProgramId, VertexLayout) {
        let mut device = SoftwareDevice::new(8, 8);
        let vs = device.create_shader(ShaderStage::Vertex, VERTEX).unwrap();
        let fs = device.create_shader(ShaderStage::Fragment, FRAGMENT).unwrap();
        let program = device
            .link_program(vs, fs, &[(0, "position"), (1, "color")])
            .unwrap();
        let layout = VertexLayout::define(&[
            AttributeSpec::new("position", 3),
            AttributeSpec::new("color", 3),
        ])
        .unwrap();
        (device, program, layout)
    }

    fn triangle(device: &mut SoftwareDevice, layout: &VertexLayout, z: f32, color: [f32; 3]) -> BufferId {
        let records: Vec<_> = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]]
            .iter()
            .map(|[x, y]| {
                VertexRecord::new()
                    .with("position", [*x, *y, z])
                    .with("color", color)
            })
            .collect();
        let buffer = device.create_buffer();
        device.buffer_data(buffer, &interleave(layout, &records).unwrap());
        buffer
    }

    #[test]
    fn full_screen_triangle_fills_framebuffer() {
        let (mut device, program, layout) = device_with_program();
        let buffer = triangle(&mut device, &layout, 0.0, [1.0, 0.0, 0.0]);

        device.clear();
        device.use_program(program);
        device.bind_vertex_buffer(buffer, &layout.attribute_offsets());
        device.draw_arrays(Primitive::Triangles, 0, 3);

        assert!(device.framebuffer().data.iter().all(|&p| p == 0xFFFF0000));
        assert_eq!(
            device.draw_calls(),
            &[DrawCall {
                program: Some(program),
                primitive: Primitive::Triangles,
                first: 0,
                count: 3
            }]
        );
    }

    #[test]
    fn depth_test_keeps_nearest_surface() {
        let (mut device, program, layout) = device_with_program();
        let near = triangle(&mut device, &layout, -0.5, [0.0, 1.0, 0.0]);
        let far = triangle(&mut device, &layout, 0.5, [0.0, 0.0, 1.0]);
        let pointers = layout.attribute_offsets();

        device.clear();
        device.use_program(program);
        device.enable(Capability::DepthTest);
        device.bind_vertex_buffer(near, &pointers);
        device.draw_arrays(Primitive::Triangles, 0, 3);
        device.bind_vertex_buffer(far, &pointers);
        device.draw_arrays(Primitive::Triangles, 0, 3);

        assert_eq!(device.framebuffer().pixel(4, 4), 0xFF00FF00);
        assert_eq!(device.draw_calls().len(), 2);
    }

    #[test]
    fn clip_matrix_uniform_moves_geometry() {
        let (mut device, program, layout) = device_with_program();
        let records: Vec<_> = [[0.0, 0.0], [0.5, 0.0], [0.0, 0.5]]
            .iter()
            .map(|[x, y]| {
                VertexRecord::new()
                    .with("position", [*x, *y, 0.0])
                    .with("color", [1.0, 1.0, 1.0])
            })
            .collect();
        let buffer = device.create_buffer();
        device.buffer_data(buffer, &interleave(&layout, &records).unwrap());
        let mvp = device.active_uniforms(program)[0].location;

        device.clear();
        device.use_program(program);
        device.uniform_matrix4(
            mvp,
            &Mat4::from_translation(cgmath::Vector3::new(-1.0, 0.0, 0.0)),
        );
        device.bind_vertex_buffer(buffer, &layout.attribute_offsets());
        device.draw_arrays(Primitive::Triangles, 0, 3);

        // the triangle now sits in the top-left quadrant
        assert_eq!(device.framebuffer().pixel(0, 3), 0xFFFFFFFF);
        assert_eq!(device.framebuffer().pixel(5, 3), 0xFF000000);
        assert_eq!(
            device.uniform_value(program, mvp),
            Some(&UniformValue::Mat4(Mat4::from_translation(
                cgmath::Vector3::new(-1.0, 0.0, 0.0)
            )))
        );
    }

    #[test]
    fn mistyped_uniform_is_ignored() {
        let (mut device, program, _) = device_with_program();
        let mvp = device.active_uniforms(program)[0].location;
        device.use_program(program);
        device.uniform_1i(mvp, 3);
        assert_eq!(device.uniform_value(program, mvp), None);
    }

    #[test]
    fn compile_failure_returns_log() {
        let mut device = SoftwareDevice::new(1, 1);
        let log = device
            .create_shader(ShaderStage::Vertex, "attribute vec9 p;\nvoid main() {}")
            .unwrap_err();
        assert_eq!(log, "ERROR: 0:1: 'vec9' : syntax error");
    }

    #[test]
    fn draw_without_program_is_logged_but_harmless() {
        let mut device = SoftwareDevice::new(2, 2);
        device.clear();
        device.draw_arrays(Primitive::Points, 0, 1);
        assert_eq!(device.draw_calls().len(), 1);
        assert!(device.framebuffer().data.iter().all(|&p| p == 0xFF000000));
    }

    #[test]
    fn strip_draws_quad() {
        let (mut device, program, layout) = device_with_program();
        let records: Vec<_> = [[-1.0, -1.0], [-1.0, 1.0], [1.0, -1.0], [1.0, 1.0]]
            .iter()
            .map(|[x, y]| {
                VertexRecord::new()
                    .with("position", [*x, *y, 0.0])
                    .with("color", [0.0, 0.0, 1.0])
            })
            .collect();
        let buffer = device.create_buffer();
        device.buffer_data(buffer, &interleave(&layout, &records).unwrap());

        device.clear();
        device.use_program(program);
        device.bind_vertex_buffer(buffer, &layout.attribute_offsets());
        device.draw_arrays(Primitive::TriangleStrip, 0, 4);

        assert!(device.framebuffer().data.iter().all(|&p| p == 0xFF0000FF));
    }
}
