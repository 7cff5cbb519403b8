//! Utility modules.

pub mod data_uri;
pub mod fs;
pub mod mime;
