use anyhow::Result;
use winit::event::WindowEvent;

use crate::gl::{GlContext, WgpuDriver};

use super::ctx::FrameCtx;

/// Returned by callbacks to keep running or stop the event loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application driven by [`Runtime`](crate::window::Runtime).
///
/// Errors from `setup` and `on_frame` are fatal: the runtime stops and
/// returns them from `Runtime::run`.
pub trait App {
    /// Creates GPU resources once the window and device exist.
    fn setup(&mut self, gl: &mut GlContext<WgpuDriver>) -> Result<()>;

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Records this frame's draws.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl>;

    /// Releases GPU resources before the device goes away.
    fn teardown(&mut self) {}
}
