//! # Rendition Common
//!
//! Building blocks shared by rendition workers that are independent of any
//! particular transform engine.
//!
//! ## Features
//!
//! - `ActivationContext`: the explicit per-activation context threaded through
//!   every call instead of process-wide "currently processing" state
//! - Settling of detached background tasks at the end of an activation
//! - Filename sanitising and extension lookup
//!
//! ## License
//!
//! MIT License
//!

mod context;
mod run_completion;
mod utils;

pub use context::ActivationContext;
pub use run_completion::{BackgroundTaskError, settle_background_tasks};
pub use utils::{file_extension, sanitize_filename};

#[cfg(test)]
mod test_utils;
