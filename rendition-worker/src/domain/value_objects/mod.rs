//! Domain value objects.
//!
//! Value objects are immutable objects that represent concepts in the domain
//! and are defined by their attributes rather than identity.

mod instructions;
mod target;

pub use instructions::{Crop, Dpi, RenditionInstructions, Watermark};
pub use target::{MultiPartTarget, Target};
