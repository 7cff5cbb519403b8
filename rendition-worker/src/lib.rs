//! rendition-worker library crate.
//!
//! Generates renditions of one source asset per activation. The
//! [`RenditionOrchestrator`] acquires the source, runs a caller-supplied
//! transform per rendition or for all renditions at once, decides whether each
//! output needs post-processing, uploads it and reports exactly one outcome
//! event per rendition.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod imaging;
pub mod logging;
pub mod metadata;
pub mod metrics;
pub mod orchestrator;
pub mod postprocess;
pub mod preparer;
pub mod registry;
pub mod storage;
pub mod transform;
pub mod utils;

pub use config::WorkerConfig;
pub use domain::{ActivationFailure, ProcessingResult, WorkRequest};
pub use error::{Error, Result};
pub use orchestrator::{OrchestratorBuilder, RenditionOrchestrator};
