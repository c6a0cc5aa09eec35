use std::fmt;
use std::num::NonZeroU32;

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wraps a raw driver id. Zero is reserved for "no object".
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "#{}"), self.0)
            }
        }
    };
}

handle_type!(
    /// Driver id of a buffer object.
    BufferHandle,
    "buffer"
);
handle_type!(
    /// Driver id of a single compiled stage.
    ShaderHandle,
    "shader"
);
handle_type!(
    /// Driver id of a linked program.
    ProgramHandle,
    "program"
);

/// Monotonic id source shared by all object kinds of one driver.
///
/// Ids are never reused, so a stale handle can only ever miss.
#[derive(Debug)]
pub(crate) struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next_raw(&mut self) -> Option<u32> {
        let raw = self.next;
        self.next = self.next.checked_add(1)?;
        Some(raw)
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
