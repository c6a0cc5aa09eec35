//! wgpu device and window surface.

mod error;
mod gpu;
mod init;
mod surface;

pub use error::SurfaceErrorAction;
pub use gpu::{Gpu, GpuFrame};
pub use init::GpuInit;
