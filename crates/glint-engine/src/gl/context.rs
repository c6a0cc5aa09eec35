use std::fmt;
use std::rc::Rc;

use super::driver::{DrawCall, Driver};
use super::error::{GlError, check};
use super::handle::{BufferHandle, ProgramHandle};

/// Named binding points of a [`GlContext`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BindingPoint {
    VertexBuffer,
    IndexBuffer,
    Program,
}

impl fmt::Display for BindingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindingPoint::VertexBuffer => "vertex buffer",
            BindingPoint::IndexBuffer => "index buffer",
            BindingPoint::Program => "program",
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct BoundVertexBuffer {
    pub handle: BufferHandle,
    pub stride: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct BoundIndexBuffer {
    pub handle: BufferHandle,
    pub count: u32,
}

/// Which objects the next draw will read.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Bindings {
    pub(crate) vertex_buffer: Option<BoundVertexBuffer>,
    pub(crate) index_buffer: Option<BoundIndexBuffer>,
    pub(crate) program: Option<ProgramHandle>,
}

impl Bindings {
    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer.map(|b| b.handle)
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer.map(|b| b.handle)
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_buffer.is_none() && self.index_buffer.is_none() && self.program.is_none()
    }
}

/// A driver plus the binding-point state of the graphics context.
///
/// Every bind and draw goes through `&mut GlContext`, which makes the
/// "bind before draw" ordering explicit at the call site.
pub struct GlContext<D: Driver> {
    driver: Rc<D>,
    bindings: Bindings,
}

impl<D: Driver> GlContext<D> {
    pub fn new(driver: D) -> Self {
        Self::from_shared(Rc::new(driver))
    }

    pub fn from_shared(driver: Rc<D>) -> Self {
        Self {
            driver,
            bindings: Bindings::default(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub(crate) fn shared_driver(&self) -> Rc<D> {
        Rc::clone(&self.driver)
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub(crate) fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    /// Clears every binding point.
    pub fn reset_bindings(&mut self) {
        self.bindings = Bindings::default();
    }

    /// Draws `count` indices from the bound index buffer as a triangle list.
    ///
    /// Requires a bound program, vertex buffer and index buffer; the vertex
    /// buffer's stride must match the program's vertex layout.
    #[track_caller]
    pub fn draw_elements(&mut self, count: u32) -> Result<(), GlError> {
        let program = self
            .bindings
            .program
            .ok_or(GlError::MissingBinding(BindingPoint::Program))?;
        let vertex = self
            .bindings
            .vertex_buffer
            .ok_or(GlError::MissingBinding(BindingPoint::VertexBuffer))?;
        let index = self
            .bindings
            .index_buffer
            .ok_or(GlError::MissingBinding(BindingPoint::IndexBuffer))?;

        if count > index.count {
            return Err(GlError::IndexRangeExceeded {
                requested: count,
                available: index.count,
            });
        }

        let expected = check("vertex_stride", self.driver.vertex_stride(program))?;
        if expected != vertex.stride {
            return Err(GlError::driver(
                "draw_elements",
                super::DriverError::VertexLayoutMismatch {
                    buffer: vertex.stride,
                    program: expected,
                },
            ));
        }

        check(
            "draw_elements",
            self.driver.draw_indexed(DrawCall {
                program,
                vertex_buffer: vertex.handle,
                index_buffer: index.handle,
                index_count: count,
            }),
        )
    }
}
