//! Source validation and acquisition.

use std::path::Path;

use rendition_common::file_extension;
use tracing::{debug, info};

use crate::domain::{RequestOptions, Source, SourceDescriptor};
use crate::storage::StorageClient;
use crate::utils::{data_uri, mime};
use crate::{Error, Result};

const SOURCE_STEM: &str = "source";

/// Turns the request's source descriptor into a local [`Source`].
pub struct SourcePreparer<'a> {
    storage: &'a dyn StorageClient,
}

impl<'a> SourcePreparer<'a> {
    pub fn new(storage: &'a dyn StorageClient) -> Self {
        Self { storage }
    }

    /// Validate the descriptor, name the source and download it into `in_dir`.
    ///
    /// With downloads disabled the source keeps its URL as path and nothing is
    /// fetched.
    pub async fn prepare(
        &self,
        descriptor: Option<&SourceDescriptor>,
        options: &RequestOptions,
        in_dir: &Path,
    ) -> Result<Source> {
        let source = resolve(descriptor, in_dir, options.disable_source_download)?;
        if !source.downloaded {
            info!(source = %source.display_url(), "Source download disabled, passing url through");
            return Ok(source);
        }

        let path = self
            .storage
            .download(&source)
            .await
            .map_err(|e| e.at("download"))?;
        debug!(path = %path.display(), "Source available locally");
        Ok(Source { path, ..source })
    }
}

/// Build the [`Source`] value without touching the network.
pub fn resolve(
    descriptor: Option<&SourceDescriptor>,
    in_dir: &Path,
    disable_download: bool,
) -> Result<Source> {
    let descriptor = descriptor.ok_or_else(|| Error::validation("no source provided"))?;
    let url = descriptor
        .url()
        .ok_or_else(|| Error::validation("source has no url"))?
        .to_string();

    let data_mime = if data_uri::is_data_uri(&url) {
        Some(data_uri::parse_header(&url)?.mime_type)
    } else {
        None
    };
    let mime_type = descriptor
        .mime_type()
        .map(str::to_string)
        .or(data_mime);

    let name = source_name(descriptor.name(), &url, mime_type.as_deref());
    let mime_type = mime_type.or_else(|| {
        file_extension(&name)
            .and_then(|ext| mime::mime_for_extension(&ext))
            .map(str::to_string)
    });

    let path = if disable_download {
        url.clone().into()
    } else {
        in_dir.join(&name)
    };

    Ok(Source {
        name,
        path,
        mime_type,
        url,
        downloaded: !disable_download,
    })
}

/// `source.<ext>`, the extension taken from the explicit name, then the URL
/// path, then the mime type.
pub fn source_name(explicit: Option<&str>, url: &str, mime_type: Option<&str>) -> String {
    let from_url = || {
        if data_uri::is_data_uri(url) {
            None
        } else {
            let path = url::Url::parse(url)
                .map(|u| u.path().to_string())
                .unwrap_or_else(|_| url.to_string());
            file_extension(&path)
        }
    };
    let from_mime = || mime_type.and_then(mime::extension_for_mime).map(str::to_string);

    let ext = explicit
        .and_then(file_extension)
        .or_else(from_url)
        .or_else(from_mime)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{}.{}", SOURCE_STEM, ext),
        None => SOURCE_STEM.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorReason;

    #[test]
    fn test_name_priority() {
        assert_eq!(
            source_name(Some("photo.TIF"), "https://x/a.png", Some("image/jpeg")),
            "source.tif"
        );
        assert_eq!(
            source_name(Some("noext"), "https://x/a.png?sig=1", Some("image/jpeg")),
            "source.png"
        );
        assert_eq!(source_name(None, "https://x/blob", Some("image/jpeg")), "source.jpg");
        assert_eq!(source_name(None, "https://x/blob", None), "source");
        assert_eq!(source_name(None, "data:image/gif;base64,R0lG", Some("image/gif")), "source.gif");
    }

    #[test]
    fn test_resolve_data_uri() {
        let descriptor = SourceDescriptor::Url("data:image/png;base64,iVBORw0K".into());
        let source = resolve(Some(&descriptor), Path::new("/work/in/"), false).unwrap();
        assert_eq!(source.name, "source.png");
        assert_eq!(source.mime_type.as_deref(), Some("image/png"));
        assert_eq!(source.path, Path::new("/work/in/source.png"));
        assert!(source.downloaded);
    }

    #[test]
    fn test_resolve_pass_through() {
        let descriptor = SourceDescriptor::Url("https://cdn.example.com/a.jpeg".into());
        let source = resolve(Some(&descriptor), Path::new("/work/in"), true).unwrap();
        assert_eq!(source.path, Path::new("https://cdn.example.com/a.jpeg"));
        assert_eq!(source.mime_type.as_deref(), Some("image/jpeg"));
        assert!(!source.downloaded);
    }

    #[test]
    fn test_resolve_rejects_missing_source() {
        let err = resolve(None, Path::new("/in"), false).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::GenericError);
        assert_eq!(err.location(), Some("validation"));

        let empty = SourceDescriptor::Object {
            url: None,
            name: Some("a.png".into()),
            mime_type: None,
        };
        assert!(resolve(Some(&empty), Path::new("/in"), false).is_err());
    }
}
