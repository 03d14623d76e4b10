//! Error types shared by every module of the sandbox.
//!
//! Shader and link failures carry the context's diagnostic text verbatim so a
//! caller can print exactly what the compiler reported.

use thiserror::Error;

use crate::context::ShaderStage;

#[derive(Error, Debug)]
pub enum SandboxError {
    /// A shader stage failed to compile.
    #[error("({stage} shader) {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    /// The compiled stages failed to link into a program.
    #[error("(program link) {log}")]
    ProgramLink { log: String },

    /// A vertex record does not match the layout it is interleaved against.
    #[error(
        "vertex record does not match layout: attribute `{attribute}` expects {expected} components, found {}",
        found_text(.found)
    )]
    SchemaMismatch {
        attribute: String,
        expected: usize,
        found: Option<usize>,
    },

    /// The linked program does not expose a uniform with this name.
    #[error("unknown uniform `{0}`")]
    UnknownUniform(String),

    /// A vertex layout definition is malformed.
    #[error("invalid vertex layout: {0}")]
    InvalidLayout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("window error: {0}")]
    Window(#[from] minifb::Error),
}

fn found_text(found: &Option<usize>) -> String {
    match found {
        Some(n) => n.to_string(),
        None => "none".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
