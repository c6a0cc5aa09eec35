//! glint engine crate.
//!
//! GPU resource wrappers (`gl`) over a handle-based driver, plus the window,
//! device and logging plumbing needed to put them on screen.

pub mod core;
pub mod device;
pub mod gl;
pub mod logging;
pub mod window;
