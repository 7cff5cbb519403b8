//! Transform strategies: the caller-supplied work that turns the source into
//! renditions.

mod raster;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

pub use raster::{ImageBatchTransform, ImageTransform};

use crate::Result;
use crate::domain::{Rendition, Source};

/// Generates one rendition at a time.
#[async_trait]
pub trait PerRenditionTransform: Send + Sync {
    /// Write `rendition.work_path()` in the format `rendition.work_format()`.
    async fn transform(&self, source: &Source, rendition: &Rendition) -> Result<()>;

    /// Output formats this transform can emit. `None` means anything.
    fn supported_formats(&self) -> Option<Vec<String>> {
        None
    }
}

/// Generates every rendition in one call.
#[async_trait]
pub trait BatchTransform: Send + Sync {
    /// Write each rendition's `path()`; all of them live in `out_dir`.
    async fn transform(&self, source: &Source, renditions: &[Rendition], out_dir: &Path)
    -> Result<()>;
}

/// The strategy an orchestrator runs with, fixed at construction.
#[derive(Clone)]
pub enum TransformStrategy {
    PerRendition(Arc<dyn PerRenditionTransform>),
    Batch(Arc<dyn BatchTransform>),
}

impl TransformStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PerRendition(_) => "per_rendition",
            Self::Batch(_) => "batch",
        }
    }
}

impl std::fmt::Debug for TransformStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TransformStrategy").field(&self.name()).finish()
    }
}
