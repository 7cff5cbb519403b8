//! Shared media vocabulary used across the rendition workspace.
//!
//! Nothing in here touches the filesystem. Types describe what a file *is*
//! (its format, pixel size, EXIF orientation) so that decision code can stay pure.

mod format;
mod orientation;

pub use format::{INTERMEDIATE_PRIORITY, MediaFormat, same_format, select_intermediate};
pub use orientation::Orientation;

/// Pixel resolution of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check the requested dimensions against this resolution.
    ///
    /// Only the axes that were actually requested are compared; a missing
    /// axis is trusted to have been handled by whoever produced the file.
    pub fn satisfies(&self, width: Option<u32>, height: Option<u32>) -> bool {
        width.is_none_or(|w| w == self.width) && height.is_none_or(|h| h == self.height)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
