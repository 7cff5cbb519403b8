//! HTTP transfers.

use std::io::SeekFrom;
use std::path::Path;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::{Error, Result};

pub fn is_http(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Stream a GET response into `destination`.
pub async fn download(client: &reqwest::Client, url: &str, destination: &Path) -> Result<u64> {
    let response = client.get(url).send().await?.error_for_status()?;
    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| Error::io_path("creating", destination, e))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::io_path("writing", destination, e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| Error::io_path("flushing", destination, e))?;

    debug!(url = %url, bytes = written, "HTTP download complete");
    Ok(written)
}

/// PUT the whole file.
pub async fn put_file(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let body = tokio::fs::read(path)
        .await
        .map_err(|e| Error::io_path("reading", path, e))?;
    client.put(url).body(body).send().await?.error_for_status()?;
    Ok(())
}

/// PUT `len` bytes of the file starting at `offset`.
pub async fn put_range(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    offset: u64,
    len: u64,
) -> Result<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::io_path("opening", path, e))?;
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|e| Error::io_path("seeking", path, e))?;

    let mut body = Vec::with_capacity(len as usize);
    file.take(len)
        .read_to_end(&mut body)
        .await
        .map_err(|e| Error::io_path("reading", path, e))?;

    client.put(url).body(body).send().await?.error_for_status()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_http() {
        assert!(is_http("https://example.com"));
        assert!(is_http("HTTP://example.com"));
        assert!(!is_http("file:///tmp/x"));
        assert!(!is_http("/tmp/x"));
    }
}
