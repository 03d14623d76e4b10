//! A small immediate-mode rendering sandbox.
//!
//! Vertex layouts, shader programs, meshes and a perspective camera sit on top
//! of the [`RenderContext`] trait. [`SoftwareDevice`] implements that trait on
//! the CPU, so scenes can be drawn into a window, written to PNG frames or
//! inspected from tests without a GPU.

pub mod camera;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod framebuffer;
pub mod geometry;
pub mod glsl;
pub mod mesh;
pub mod program;
pub mod rasterizer;
pub mod renderer;
pub mod sandbox;
pub mod texture;
pub mod vertex;

pub use camera::{Camera, FixedCamera, PerspectiveCamera};
pub use context::{Primitive, RenderContext, ShaderStage};
pub use device::SoftwareDevice;
pub use error::{Result, SandboxError};
pub use mesh::Mesh;
pub use program::Program;
pub use renderer::Renderer;
pub use texture::{SharedTexture, load_texture};
pub use vertex::{AttributeSpec, ComponentType, VertexLayout, VertexRecord, interleave};
