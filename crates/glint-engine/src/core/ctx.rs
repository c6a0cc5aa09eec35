use winit::dpi::PhysicalSize;

use crate::gl::{GlContext, WgpuDriver};

/// Per-frame state handed to [`App::on_frame`](super::App::on_frame).
pub struct FrameCtx<'a> {
    pub gl: &'a mut GlContext<WgpuDriver>,
    /// Counts presented frames, starting at 0.
    pub frame_index: u64,
    /// Drawable size in physical pixels.
    pub size: PhysicalSize<u32>,
    /// Color the frame is cleared to before any draw; may be changed.
    pub clear: wgpu::Color,
}
