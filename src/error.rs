//! Error types for the certcheck library.
//!
//! Every failure in a verification run is fatal for that run: there is no
//! per-page partial result and no automatic retry. All variants therefore
//! live in a single [`VerifyError`], returned as `Err` from the top-level
//! `verify*` functions and reported to the [`crate::progress::WorkflowObserver`]
//! together with the workflow state the run failed in.

use crate::document::DocumentRole;
use crate::progress::WorkflowState;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the certcheck library.
#[derive(Debug, Error)]
pub enum VerifyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A document was not supplied when the run was triggered.
    #[error("The {role} document is missing.\nUpload both the invoice and the certificate before running the analysis.")]
    MissingInput { role: DocumentRole },

    /// No credential was available for the completion endpoint.
    #[error("No API credential available.\n{hint}")]
    MissingCredential { hint: String },

    /// Input file was not found at the given path.
    #[error("{role} file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { role: DocumentRole, path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading {role} '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { role: DocumentRole, path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download {role} from '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed {
        role: DocumentRole,
        url: String,
        reason: String,
    },

    /// Download exceeded the configured timeout.
    #[error("Download of {role} timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout {
        role: DocumentRole,
        url: String,
        secs: u64,
    },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The document is not a PDF, is corrupt, or has no renderable pages.
    #[error("Could not rasterise the {role}: {detail}")]
    Rasterization { role: DocumentRole, detail: String },

    /// A rendered page could not be encoded for transport.
    #[error("Could not encode page {page} of the {role}: {detail}")]
    Encoding {
        role: DocumentRole,
        page: usize,
        detail: String,
    },

    /// The remote completion call did not produce a report.
    ///
    /// `message` is the underlying transport or service message, unmodified.
    #[error("Verification request failed: {message}")]
    Verification {
        status: Option<u16>,
        message: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or containing directory).\n\
  • Place libpdfium next to the executable's working directory.\n\
  • Install pdfium system-wide.\n\
Pre-built libraries: https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VerifyError {
    /// The workflow state this error aborts.
    ///
    /// Input and configuration problems are detected before the run leaves
    /// [`WorkflowState::Idle`].
    pub fn failed_in(&self) -> WorkflowState {
        match self {
            VerifyError::Rasterization { .. } | VerifyError::PdfiumBindingFailed(_) => {
                WorkflowState::Rasterizing
            }
            VerifyError::Encoding { .. } => WorkflowState::Encoding,
            VerifyError::Verification { .. } => WorkflowState::Requesting,
            _ => WorkflowState::Idle,
        }
    }

    /// The document this error concerns, if any.
    pub fn role(&self) -> Option<DocumentRole> {
        match self {
            VerifyError::MissingInput { role }
            | VerifyError::FileNotFound { role, .. }
            | VerifyError::PermissionDenied { role, .. }
            | VerifyError::DownloadFailed { role, .. }
            | VerifyError::DownloadTimeout { role, .. }
            | VerifyError::Rasterization { role, .. }
            | VerifyError::Encoding { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// `true` when the remote service rejected the credential (HTTP 401/403).
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            VerifyError::Verification {
                status: Some(401 | 403),
                ..
            }
        )
    }
}
