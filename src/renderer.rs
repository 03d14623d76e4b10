use cgmath::Matrix4 as Mat4;

use crate::camera::Camera;
use crate::context::{BlendFactor, Capability, RenderContext, UniformLocation};
use crate::error::Result;
use crate::mesh::Mesh;
use crate::program::Program;

pub const MVP_UNIFORM: &str = "mvpMatrix";
pub const TEXTURE_UNIFORM: &str = "texture";

/// Make a model-view matrix face the viewer around the Y axis.
///
/// Writes column 0 row 0 and column 2 row 3 and leaves every other cell as is.
pub fn apply_billboard_y(m: &mut Mat4<f32>) {
    m.x.x = 1.0;
    m.z.w = 1.0;
}

/// `view * model` for one mesh, with its billboard flag applied.
pub fn model_view(camera: &dyn Camera, mesh: &Mesh) -> Mat4<f32> {
    let mut m = camera.view_matrix() * mesh.matrix();
    if mesh.billboard_y {
        apply_billboard_y(&mut m);
    }
    m
}

/// Draws a scene of meshes with one program.
#[derive(Debug)]
pub struct Renderer {
    program: Program,
    mvp: UniformLocation,
    sampler: Option<UniformLocation>,
}

impl Renderer {
    pub fn new(program: Program) -> Result<Self> {
        let mvp = program.uniform(MVP_UNIFORM)?;
        let sampler = program.uniform(TEXTURE_UNIFORM).ok();
        if sampler.is_none() {
            log::debug!("program has no `{TEXTURE_UNIFORM}` sampler, drawing untextured");
        }
        Ok(Self {
            program,
            mvp,
            sampler,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Hand the program back, e.g. to release it.
    pub fn into_program(self) -> Program {
        self.program
    }

    /// Draw `scene` in order.
    pub fn render<C: RenderContext>(&self, ctx: &mut C, scene: &[&Mesh], camera: &dyn Camera) {
        ctx.use_program(self.program.handle());
        ctx.enable(Capability::DepthTest);
        ctx.enable(Capability::Blend);
        ctx.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        if let Some(sampler) = self.sampler {
            ctx.uniform_1i(sampler, 0);
        }

        let projection = camera.projection_matrix();
        for mesh in scene {
            let mvp = projection * model_view(camera, mesh);
            ctx.uniform_matrix4(self.mvp, &mvp);
            mesh.draw(ctx);
        }
        log::trace!("rendered {} meshes", scene.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FixedCamera;
    use crate::context::Primitive;
    use crate::device::{SoftwareDevice, UniformValue};
    use crate::error::SandboxError;
    use crate::vertex::{AttributeSpec, VertexLayout, VertexRecord};
    use cgmath::{Rad, SquareMatrix, Vector3 as Vec3};
    use std::sync::Arc;

    const FRAGMENT: &str = "precision mediump float;\nvoid main() { gl_FragColor = vec4(1.0); }";

    fn layout() -> VertexLayout {
        VertexLayout::define(&[AttributeSpec::new("position", 3)]).unwrap()
    }

    #[test]
    fn billboard_overwrites_two_cells() {
        let mut m = Mat4::from_angle_y(Rad(0.7)) * Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let before = m;
        apply_billboard_y(&mut m);

        assert_eq!(m.x.x, 1.0);
        assert_eq!(m.z.w, 1.0);
        for c in 0..4 {
            for r in 0..4 {
                if (c, r) != (0, 0) && (c, r) != (2, 3) {
                    assert_eq!(m[c][r], before[c][r]);
                }
            }
        }
    }

    #[test]
    fn program_without_mvp_is_rejected() {
        let mut device = SoftwareDevice::new(2, 2);
        let program = Program::compile(
            &mut device,
            "attribute vec3 position;\nvoid main() {}",
            FRAGMENT,
            &layout(),
        )
        .unwrap();

        let err = Renderer::new(program).unwrap_err();
        assert!(matches!(err, SandboxError::UnknownUniform(ref n) if n == MVP_UNIFORM));
    }

    #[test]
    fn render_sets_state_and_uploads_mvp_per_mesh() {
        let mut device = SoftwareDevice::new(4, 4);
        let program = Program::compile(
            &mut device,
            "attribute vec3 position;\nuniform mat4 mvpMatrix;\nvoid main() {}",
            FRAGMENT,
            &layout(),
        )
        .unwrap();
        let renderer = Renderer::new(program).unwrap();
        let layout = Arc::new(layout());
        let point = [VertexRecord::new().with("position", [0.0, 0.0, 0.0])];
        let a = Mesh::new(&mut device, layout.clone(), Primitive::Points, Some(&point[..])).unwrap();
        let mut b = Mesh::new(&mut device, layout, Primitive::Points, Some(&point[..])).unwrap();
        b.position = Vec3::new(0.5, 0.0, 0.0);

        device.clear();
        renderer.render(&mut device, &[&a, &b], &FixedCamera::identity());

        assert_eq!(device.draw_calls().len(), 2);
        assert!(device.is_enabled(Capability::DepthTest));
        assert!(device.is_enabled(Capability::Blend));
        assert_eq!(
            device.blend_factors(),
            (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)
        );
        let mvp = renderer.program().uniform(MVP_UNIFORM).unwrap();
        // last upload wins
        assert_eq!(
            device.uniform_value(renderer.program().handle(), mvp),
            Some(&UniformValue::Mat4(b.matrix()))
        );
        assert_ne!(b.matrix(), Mat4::identity());
    }
}
