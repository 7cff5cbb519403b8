//! Metadata of generated files: what gets reported for a rendition, and what the
//! post-process decision looks at.

mod extractor;
pub mod jpeg;
mod probe;

pub use extractor::MetadataExtractor;
pub use probe::{IntermediateMetadata, probe};
