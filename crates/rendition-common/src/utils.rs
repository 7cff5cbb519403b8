//! Filename and path helpers.

const DEFAULT_FILENAME: &str = "output";

/// Sanitize a string for use as a filename.
///
/// Path separators are replaced as well, so a caller-supplied name can never
/// escape the directory it is joined onto.
pub fn sanitize_filename(input: &str) -> String {
    let invalid_chars = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    let mut result = String::with_capacity(input.len());

    for c in input.chars() {
        if invalid_chars.contains(&c) || c < ' ' {
            result.push('_');
        } else {
            result.push(c);
        }
    }

    // Remove leading and trailing dots and spaces
    let remove_array = ['.', ' '];
    let result = result
        .trim_start_matches(|c| remove_array.contains(&c))
        .trim_end_matches(|c| remove_array.contains(&c))
        .to_string();

    if result.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else if result.chars().count() > 200 {
        result.chars().take(200).collect()
    } else {
        result
    }
}

/// Extension of the last path segment, without the dot, lower-cased.
///
/// Query strings and fragments are ignored so that URL paths can be passed
/// directly. Dot-files (`.hidden`) have no extension.
pub fn file_extension(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("rendition0.png"), "rendition0.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("a:b?c"), "a_b_c");
        assert_eq!(sanitize_filename("  .. "), "output");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(
            file_extension("https://host/path/file.tiff?sig=a.b#frag"),
            Some("tiff".to_string())
        );
        assert_eq!(file_extension("https://host/path/file"), None);
        assert_eq!(file_extension(".hidden"), None);
        assert_eq!(file_extension("archive."), None);
    }
}
