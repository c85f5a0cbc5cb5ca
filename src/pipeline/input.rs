//! Input loading: turn a user-supplied path or URL into a [`Document`].
//!
//! pdfium renders straight from a byte slice, so both local files and
//! downloads end up as an in-memory buffer; no temp files are involved and
//! nothing is left on disk after a run. PDF validity is *not* checked here:
//! that is the rasteriser's job, so a bad file is reported as a
//! rasterisation failure regardless of where it came from.

use crate::document::{Document, DocumentRole};
use crate::error::VerifyError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a document from a local path or an HTTP/HTTPS URL.
pub async fn load_document(
    role: DocumentRole,
    input: &str,
    timeout_secs: u64,
) -> Result<Document, VerifyError> {
    if is_url(input) {
        download_url(role, input, timeout_secs).await
    } else {
        read_local(role, input).await
    }
}

/// Read a local file, mapping I/O failures to user-facing errors.
async fn read_local(role: DocumentRole, path_str: &str) -> Result<Document, VerifyError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => VerifyError::PermissionDenied {
            role,
            path: path.clone(),
        },
        _ => VerifyError::FileNotFound {
            role,
            path: path.clone(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Loaded {} from {} ({} bytes)", role, path.display(), bytes.len());
    Ok(Document::new(role, name, bytes))
}

/// Download a URL into memory.
async fn download_url(
    role: DocumentRole,
    url: &str,
    timeout_secs: u64,
) -> Result<Document, VerifyError> {
    info!("Downloading {} from: {}", role, url);

    let failed = |reason: String| VerifyError::DownloadFailed {
        role,
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            VerifyError::DownloadTimeout {
                role,
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    info!("Downloaded {} ({} bytes)", role, bytes.len());

    Ok(Document::new(role, filename_from_url(url), bytes.to_vec()))
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
