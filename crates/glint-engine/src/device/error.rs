/// What the frame loop should do after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// The surface was configured again; try again next frame.
    Reconfigured,
    /// Drop this frame and carry on.
    SkipFrame,
    /// Unrecoverable (out of memory).
    Fatal,
}
