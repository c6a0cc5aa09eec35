use std::panic::Location;
use std::path::PathBuf;

use super::context::BindingPoint;
use super::driver::{BufferTarget, Stage};
use super::handle::{BufferHandle, ProgramHandle, ShaderHandle};

/// Failures reported by a [`Driver`](super::Driver) call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error("driver ran out of object ids")]
    HandlesExhausted,
    #[error("unknown {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("unknown {0:?}")]
    UnknownShader(ShaderHandle),
    #[error("unknown {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("{handle:?} holds {actual:?} data, expected {expected:?}")]
    WrongBufferTarget {
        handle: BufferHandle,
        expected: BufferTarget,
        actual: BufferTarget,
    },
    #[error("{0:?} is not linked")]
    ProgramNotLinked(ProgramHandle),
    #[error("vertex stride {buffer} does not match the program's vertex layout ({program})")]
    VertexLayoutMismatch { buffer: u64, program: u64 },
    #[error("uniform at group {group} binding {binding} is {size} bytes, wrote {written}")]
    UniformSizeMismatch {
        group: u32,
        binding: u32,
        size: u64,
        written: u64,
    },
    #[error("no uniform at group {group} binding {binding}")]
    UnknownUniform { group: u32, binding: u32 },
    #[error("buffer upload is not a whole number of {unit}-byte elements ({len} bytes)")]
    MisalignedUpload { len: usize, unit: usize },
}

/// Errors surfaced by the resource wrappers and the program builder.
#[derive(Debug, thiserror::Error)]
pub enum GlError {
    #[error("cannot read shader file {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed shader file at line {line}: {text:?}")]
    MalformedShaderFile { line: usize, text: String },

    #[error("failed to compile {stage} shader:\n{log}")]
    ShaderCompileFailed { stage: Stage, log: String },

    #[error("failed to link program:\n{log}")]
    ShaderLinkFailed { log: String },

    #[error("uniform `{name}` is not used by the program")]
    UniformNotFound { name: String },

    #[error("refusing to create an empty {0:?} buffer")]
    EmptyBuffer(BufferTarget),

    #[error("nothing bound to the {0} binding point")]
    MissingBinding(BindingPoint),

    #[error("draw of {requested} indices exceeds the bound index buffer ({available})")]
    IndexRangeExceeded { requested: u32, available: u32 },

    #[error("{op} failed at {location}: {source}")]
    Driver {
        op: &'static str,
        location: &'static Location<'static>,
        #[source]
        source: DriverError,
    },
}

impl GlError {
    /// Attaches the driver operation name and the caller's location.
    #[track_caller]
    pub(crate) fn driver(op: &'static str, source: DriverError) -> Self {
        let location = Location::caller();
        log::error!("[gpu error] {op} at {location}: {source}");
        GlError::Driver { op, location, source }
    }
}

/// Converts a driver result into a [`GlError`] tagged with `op` and the call site.
///
/// Replacement for the usual clear-error / call / check-error wrapper.
#[track_caller]
pub(crate) fn check<T>(op: &'static str, result: Result<T, DriverError>) -> Result<T, GlError> {
    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(GlError::driver(op, e)),
    }
}
