//! Multi-part upload planning.

use crate::domain::value_objects::MultiPartTarget;
use crate::{Error, Result};

/// One slice of the file and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    pub url: String,
    pub offset: u64,
    pub len: u64,
}

/// Split `size` bytes across the target's urls.
///
/// The part size is `ceil(size / urls)`, raised to `minPartSize`. A part size
/// above `maxPartSize` means the file cannot be uploaded with the given urls.
/// Trailing urls stay unused when fewer parts are needed.
pub fn plan_parts(size: u64, target: &MultiPartTarget) -> Result<Vec<UploadPart>> {
    let urls = target.urls.len() as u64;
    if urls == 0 {
        return Err(Error::validation("multi-part target has no urls"));
    }

    let mut part_size = size.div_ceil(urls);
    if let Some(min) = target.min_part_size {
        part_size = part_size.max(min);
    }
    if let Some(max) = target.max_part_size
        && part_size > max
    {
        return Err(Error::RenditionTooLarge(format!(
            "{} bytes need parts of {} bytes across {} urls, above the maximum part size {}",
            size, part_size, urls, max
        )));
    }

    if size == 0 || part_size == 0 {
        return Ok(vec![UploadPart {
            url: target.urls[0].clone(),
            offset: 0,
            len: 0,
        }]);
    }

    let mut parts = Vec::new();
    let mut offset = 0;
    for url in &target.urls {
        if offset >= size {
            break;
        }
        let len = part_size.min(size - offset);
        parts.push(UploadPart {
            url: url.clone(),
            offset,
            len,
        });
        offset += len;
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorReason;

    fn target(min: Option<u64>, max: Option<u64>, urls: usize) -> MultiPartTarget {
        MultiPartTarget {
            min_part_size: min,
            max_part_size: max,
            urls: (0..urls).map(|i| format!("https://up/{}", i)).collect(),
        }
    }

    #[test]
    fn test_even_split() {
        let parts = plan_parts(10, &target(None, None, 3)).unwrap();
        let lens: Vec<u64> = parts.iter().map(|p| p.len).collect();
        assert_eq!(lens, vec![4, 4, 2]);
        assert_eq!(parts[2].offset, 8);
    }

    #[test]
    fn test_min_part_size_leaves_urls_unused() {
        let parts = plan_parts(10, &target(Some(8), None, 3)).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!((parts[1].offset, parts[1].len), (8, 2));
    }

    #[test]
    fn test_too_large() {
        let err = plan_parts(100, &target(None, Some(10), 3)).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::RenditionTooLarge);
    }

    #[test]
    fn test_empty_file() {
        let parts = plan_parts(0, &target(Some(5), Some(10), 2)).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len, 0);
    }
}
