//! Shader source loading and program building.

mod program;
mod source;

pub use program::{Program, Shader, compile_stage, create_program, link};
pub use source::ShaderSource;
