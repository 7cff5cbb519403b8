//! Domain layer for the rendition worker.
//!
//! This module contains the request, source, rendition and result types that
//! one activation owns from start to finish.

pub mod value_objects;
mod rendition;
mod request;
mod result;
mod source;

pub use value_objects::*;
pub use rendition::{Rendition, RenditionMetadata, RenditionState, RenditionTimings, TerminalOutcome};
pub use request::{RequestOptions, SourceDescriptor, WorkRequest};
pub use result::{ActivationFailure, ProcessingResult, RenditionSummary, SourceSummary};
pub use source::Source;
