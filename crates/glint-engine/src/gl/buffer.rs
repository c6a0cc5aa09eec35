use std::rc::Rc;

use bytemuck::Pod;

use super::context::{BoundIndexBuffer, BoundVertexBuffer, GlContext};
use super::driver::{BufferTarget, Driver};
use super::error::{GlError, check};
use super::handle::BufferHandle;

/// Exclusive owner of one driver buffer.
///
/// Contents are uploaded once at construction; the handle is released when
/// the value is dropped. Not `Clone`: a copy would release the handle twice.
pub struct Buffer<D: Driver> {
    driver: Rc<D>,
    handle: BufferHandle,
    target: BufferTarget,
    len: usize,
}

impl<D: Driver> Buffer<D> {
    #[track_caller]
    pub fn new(ctx: &GlContext<D>, target: BufferTarget, contents: &[u8]) -> Result<Self, GlError> {
        if contents.is_empty() {
            return Err(GlError::EmptyBuffer(target));
        }

        let handle = check("create_buffer", ctx.driver().create_buffer(target, contents))?;
        log::trace!("created {handle:?} ({target:?}, {} bytes)", contents.len());

        Ok(Self {
            driver: ctx.shared_driver(),
            handle,
            target,
            len: contents.len(),
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }
}

impl<D: Driver> Drop for Buffer<D> {
    fn drop(&mut self) {
        match self.driver.delete_buffer(self.handle) {
            Ok(()) => log::trace!("released {:?}", self.handle),
            Err(e) => log::warn!("failed to release {:?}: {e}", self.handle),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Buffer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("target", &self.target)
            .field("len", &self.len)
            .finish()
    }
}

/// Per-vertex attribute data.
#[derive(Debug)]
pub struct VertexBuffer<D: Driver> {
    buffer: Buffer<D>,
    stride: u64,
}

impl<D: Driver> VertexBuffer<D> {
    /// Uploads `vertices`; the stride is the size of one `V`.
    #[track_caller]
    pub fn new<V: Pod>(ctx: &GlContext<D>, vertices: &[V]) -> Result<Self, GlError> {
        let buffer = Buffer::new(ctx, BufferTarget::Vertex, bytemuck::cast_slice(vertices))?;
        Ok(Self {
            buffer,
            stride: std::mem::size_of::<V>() as u64,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.buffer.handle()
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn bind(&self, ctx: &mut GlContext<D>) {
        ctx.bindings_mut().vertex_buffer = Some(BoundVertexBuffer {
            handle: self.buffer.handle(),
            stride: self.stride,
        });
    }

    pub fn unbind(&self, ctx: &mut GlContext<D>) {
        ctx.bindings_mut().vertex_buffer = None;
    }
}

/// `u32` element indices plus their count.
#[derive(Debug)]
pub struct IndexBuffer<D: Driver> {
    buffer: Buffer<D>,
    count: u32,
}

impl<D: Driver> IndexBuffer<D> {
    #[track_caller]
    pub fn new(ctx: &GlContext<D>, indices: &[u32]) -> Result<Self, GlError> {
        let buffer = Buffer::new(ctx, BufferTarget::Index, bytemuck::cast_slice(indices))?;
        Ok(Self {
            buffer,
            count: indices.len() as u32,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.buffer.handle()
    }

    /// Number of indices uploaded; always > 0.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn bind(&self, ctx: &mut GlContext<D>) {
        ctx.bindings_mut().index_buffer = Some(BoundIndexBuffer {
            handle: self.buffer.handle(),
            count: self.count,
        });
    }

    pub fn unbind(&self, ctx: &mut GlContext<D>) {
        ctx.bindings_mut().index_buffer = None;
    }
}
