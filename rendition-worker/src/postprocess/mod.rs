//! Post-processing: the declarative normalization pass applied when the
//! transform's output does not already satisfy the instructions.

mod decision;
mod raster;

use std::path::Path;

use async_trait::async_trait;

pub use decision::{
    PostProcessReason, QUALITY_TOLERANCE, adjust_for_worker_capability, needs_post_process,
    post_process_reason,
};
pub use raster::ImagePostProcessor;

use crate::Result;
use crate::domain::Rendition;
use crate::metadata::IntermediateMetadata;

/// Produces the final rendition file from an intermediate file.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Read `input` and write `rendition.path()` according to the rendition's
    /// instructions. `input` may be the same file as `rendition.path()`.
    async fn post_process(
        &self,
        input: &Path,
        rendition: &Rendition,
        metadata: &IntermediateMetadata,
    ) -> Result<()>;
}
