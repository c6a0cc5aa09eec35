use std::fmt;

use super::error::DriverError;
use super::handle::{BufferHandle, ProgramHandle, ShaderHandle};

/// Pipeline phase a shader object belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        })
    }
}

/// What a buffer's contents are used for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Vertex,
    /// `u32` element indices.
    Index,
}

/// Location of a uniform inside a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation {
    pub group: u32,
    pub binding: u32,
}

/// Outcome of a compile or link request.
///
/// Mirrors a driver's status flag plus info log: failure is a normal result,
/// not an error of the call itself.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BuildStatus {
    Ok,
    Failed { log: String },
}

/// A fully resolved indexed draw, as read from the binding points.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
}

/// Handle-level graphics API.
///
/// All methods take `&self`; implementations keep their object tables behind
/// interior mutability and are shared through `Rc` by the resource wrappers.
/// Binding-point state is deliberately absent: it lives in
/// [`GlContext`](super::GlContext) and reaches the driver only through
/// [`DrawCall`].
pub trait Driver {
    /// Allocates a buffer for `target` and uploads `contents` once.
    fn create_buffer(&self, target: BufferTarget, contents: &[u8]) -> Result<BufferHandle, DriverError>;

    /// Releases a buffer. Unknown handles are reported, never ignored.
    fn delete_buffer(&self, buffer: BufferHandle) -> Result<(), DriverError>;

    fn create_shader(&self, stage: Stage) -> Result<ShaderHandle, DriverError>;

    /// Submits `source` to `shader` and compiles it.
    fn compile_shader(&self, shader: ShaderHandle, source: &str) -> Result<BuildStatus, DriverError>;

    fn delete_shader(&self, shader: ShaderHandle) -> Result<(), DriverError>;

    fn create_program(&self) -> Result<ProgramHandle, DriverError>;

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) -> Result<(), DriverError>;

    /// Links and validates the attached stages.
    ///
    /// A linked program does not depend on its stage objects afterwards.
    fn link_program(&self, program: ProgramHandle) -> Result<BuildStatus, DriverError>;

    fn delete_program(&self, program: ProgramHandle) -> Result<(), DriverError>;

    /// Returns `None` when the program does not use a uniform called `name`.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Result<Option<UniformLocation>, DriverError>;

    /// Writes raw uniform bytes; the length must match the uniform's size.
    fn set_uniform(&self, program: ProgramHandle, location: UniformLocation, bytes: &[u8]) -> Result<(), DriverError>;

    /// Vertex stride expected by a linked program.
    fn vertex_stride(&self, program: ProgramHandle) -> Result<u64, DriverError>;

    /// Records an indexed triangle-list draw.
    fn draw_indexed(&self, draw: DrawCall) -> Result<(), DriverError>;
}
