//! Shader and buffer resources over a handle-based driver.
//!
//! Resource wrappers own exactly one driver handle each and release it on
//! drop. Binding-point state lives in [`GlContext`] instead of the driver.

mod buffer;
mod context;
mod driver;
mod error;
mod handle;

pub mod headless;
pub mod reflect;
pub mod shader;
pub mod wgpu_driver;

pub use buffer::{Buffer, IndexBuffer, VertexBuffer};
pub use context::{BindingPoint, Bindings, GlContext};
pub use driver::{BufferTarget, BuildStatus, DrawCall, Driver, Stage, UniformLocation};
pub use error::{DriverError, GlError};
pub use handle::{BufferHandle, ProgramHandle, ShaderHandle};
pub use headless::HeadlessDriver;
pub use shader::{Program, Shader, ShaderSource, compile_stage, create_program, link};
pub use wgpu_driver::WgpuDriver;
