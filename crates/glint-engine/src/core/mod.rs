//! Contract between the runtime and the application.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
