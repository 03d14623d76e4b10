use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::context::{ProgramId, RenderContext, ShaderId, ShaderStage, UniformLocation};
use crate::error::{Result, SandboxError};
use crate::vertex::VertexLayout;

/// A linked vertex + fragment pair and its uniform locations.
#[derive(Debug)]
pub struct Program {
    vertex: ShaderId,
    fragment: ShaderId,
    handle: ProgramId,
    uniforms: BTreeMap<String, UniformLocation>,
}

fn compile_stage<C: RenderContext>(ctx: &mut C, stage: ShaderStage, source: &str) -> Result<ShaderId> {
    ctx.create_shader(stage, source)
        .map_err(|log| SandboxError::ShaderCompile { stage, log })
}

impl Program {
    /// Compile both stages, bind the layout's attribute indices and link.
    ///
    /// Handles created before a failure are deleted again.
    pub fn compile<C: RenderContext>(
        ctx: &mut C,
        vertex_source: &str,
        fragment_source: &str,
        layout: &VertexLayout,
    ) -> Result<Self> {
        let vertex = compile_stage(ctx, ShaderStage::Vertex, vertex_source)?;
        let fragment = match compile_stage(ctx, ShaderStage::Fragment, fragment_source) {
            Ok(id) => id,
            Err(e) => {
                ctx.delete_shader(vertex);
                return Err(e);
            }
        };

        let bindings: Vec<(u32, &str)> = layout
            .attributes()
            .iter()
            .map(|a| (a.index, a.name.as_str()))
            .collect();
        let handle = match ctx.link_program(vertex, fragment, &bindings) {
            Ok(handle) => handle,
            Err(log) => {
                ctx.delete_shader(vertex);
                ctx.delete_shader(fragment);
                return Err(SandboxError::ProgramLink { log });
            }
        };

        let uniforms = locate_uniforms(ctx, handle);
        log::debug!(
            "program {handle:?} linked with {} attributes and {} uniforms",
            bindings.len(),
            uniforms.len()
        );

        Ok(Self {
            vertex,
            fragment,
            handle,
            uniforms,
        })
    }

    /// Read both sources from disk and [`compile`](Self::compile) them.
    pub fn from_files<C: RenderContext>(
        ctx: &mut C,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        layout: &VertexLayout,
    ) -> Result<Self> {
        let vertex_source = fs::read_to_string(vertex_path)?;
        let fragment_source = fs::read_to_string(fragment_path)?;
        Self::compile(ctx, &vertex_source, &fragment_source, layout)
    }

    pub fn handle(&self) -> ProgramId {
        self.handle
    }

    pub fn uniforms(&self) -> &BTreeMap<String, UniformLocation> {
        &self.uniforms
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    pub fn uniform(&self, name: &str) -> Result<UniformLocation> {
        self.uniforms
            .get(name)
            .copied()
            .ok_or_else(|| SandboxError::UnknownUniform(name.to_string()))
    }

    pub fn release<C: RenderContext>(self, ctx: &mut C) {
        ctx.delete_program(self.handle);
        ctx.delete_shader(self.vertex);
        ctx.delete_shader(self.fragment);
    }
}

/// Every active uniform of `program`, by name.
pub fn locate_uniforms<C: RenderContext>(
    ctx: &C,
    program: ProgramId,
) -> BTreeMap<String, UniformLocation> {
    ctx.active_uniforms(program)
        .into_iter()
        .map(|u| {
            log::debug!("uniform `{}` ({:?}) at {:?}", u.name, u.ty, u.location);
            (u.name, u.location)
        })
        .collect()
}
