use std::sync::Arc;

use cgmath::{
    InnerSpace, Matrix3 as Mat3, Matrix4 as Mat4, One, Quaternion, Vector3 as Vec3,
};

use crate::context::{BufferId, Primitive, RenderContext};
use crate::error::Result;
use crate::texture::SharedTexture;
use crate::vertex::{VertexLayout, VertexRecord, interleave};

/// T * R * S, column-major.
pub fn compose_transform(
    position: Vec3<f32>,
    rotation: Quaternion<f32>,
    scale: Vec3<f32>,
) -> Mat4<f32> {
    Mat4::from_translation(position)
        * Mat4::from(rotation)
        * Mat4::from_nonuniform_scale(scale.x, scale.y, scale.z)
}

/// Split an affine matrix back into translation, rotation and scale.
///
/// Scale is the length of each basis column; shear is lost.
pub fn decompose_transform(m: &Mat4<f32>) -> (Vec3<f32>, Quaternion<f32>, Vec3<f32>) {
    let position = m.w.truncate();
    let (x, y, z) = (m.x.truncate(), m.y.truncate(), m.z.truncate());
    let scale = Vec3::new(x.magnitude(), y.magnitude(), z.magnitude());

    let rotation = Quaternion::from(rotation_basis([x, y, z], scale)).normalize();

    (position, rotation, scale)
}

/// Orthonormal right-handed basis from scaled columns. Zero-length columns
/// are rebuilt from the remaining ones.
fn rotation_basis(columns: [Vec3<f32>; 3], scale: Vec3<f32>) -> Mat3<f32> {
    let lengths = [scale.x, scale.y, scale.z];
    let live: Vec<usize> = (0..3).filter(|&i| lengths[i] > f32::EPSILON).collect();
    let mut axes = columns;
    for &i in &live {
        axes[i] /= lengths[i];
    }

    match live.as_slice() {
        [_, _, _] => {}
        &[a, b] => {
            let missing = 3 - a - b;
            axes[missing] = axes[(missing + 1) % 3].cross(axes[(missing + 2) % 3]).normalize();
        }
        &[k] => {
            let u = axes[k];
            let helper = if u.x.abs() < 0.9 { Vec3::unit_x() } else { Vec3::unit_y() };
            let p = u.cross(helper).normalize();
            axes[(k + 1) % 3] = p;
            axes[(k + 2) % 3] = u.cross(p);
        }
        _ => return Mat3::one(),
    }
    Mat3::from_cols(axes[0], axes[1], axes[2])
}

/// Vertex buffer plus transform.
#[derive(Debug)]
pub struct Mesh {
    layout: Arc<VertexLayout>,
    buffer: BufferId,
    vertex_count: usize,
    pub primitive: Primitive,
    pub position: Vec3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vec3<f32>,
    pub texture: Option<SharedTexture>,
    pub billboard_y: bool,
}

impl Mesh {
    pub fn new<C: RenderContext>(
        ctx: &mut C,
        layout: Arc<VertexLayout>,
        primitive: Primitive,
        initial: Option<&[VertexRecord]>,
    ) -> Result<Self> {
        // interleave first so a bad record never allocates a buffer
        let data = match initial {
            Some(records) => Some(interleave(&layout, records)?),
            None => None,
        };
        let buffer = ctx.create_buffer();
        let mut mesh = Self {
            layout,
            buffer,
            vertex_count: 0,
            primitive,
            position: Vec3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            texture: None,
            billboard_y: false,
        };
        if let Some(data) = data {
            mesh.upload(ctx, &data);
        }
        log::debug!(
            "mesh {:?} created with {} vertices ({:?})",
            mesh.buffer,
            mesh.vertex_count,
            mesh.primitive
        );
        Ok(mesh)
    }

    fn upload<C: RenderContext>(&mut self, ctx: &mut C, data: &[u8]) {
        ctx.buffer_data(self.buffer, data);
        self.vertex_count = self.layout.vertex_count(data);
    }

    /// Replace the whole vertex buffer. On error nothing changes.
    pub fn update_vertices<C: RenderContext>(
        &mut self,
        ctx: &mut C,
        records: &[VertexRecord],
    ) -> Result<()> {
        let data = interleave(&self.layout, records)?;
        self.upload(ctx, &data);
        Ok(())
    }

    pub fn layout(&self) -> &Arc<VertexLayout> {
        &self.layout
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn with_texture(mut self, texture: SharedTexture) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn matrix(&self) -> Mat4<f32> {
        compose_transform(self.position, self.rotation, self.scale)
    }

    pub fn set_matrix(&mut self, m: &Mat4<f32>) {
        let (position, rotation, scale) = decompose_transform(m);
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
    }

    /// Bind texture unit 0 (when textured) and the vertex buffer, then draw
    /// every vertex.
    pub fn draw<C: RenderContext>(&self, ctx: &mut C) {
        if let Some(texture) = &self.texture {
            ctx.bind_texture(0, texture);
        }
        ctx.bind_vertex_buffer(self.buffer, &self.layout.attribute_offsets());
        ctx.draw_arrays(self.primitive, 0, self.vertex_count);
    }

    pub fn release<C: RenderContext>(self, ctx: &mut C) {
        ctx.delete_buffer(self.buffer);
    }
}
