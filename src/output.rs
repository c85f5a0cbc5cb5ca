//! Output types returned by a verification run.

use crate::config::PromptVersion;
use crate::pipeline::encode::EncodedImage;
use crate::progress::WorkflowState;
use serde::{Deserialize, Serialize};

/// The result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutput {
    /// The model's report, exactly as returned.
    pub report: String,
    /// Always [`WorkflowState::Succeeded`] for a returned output.
    pub state: WorkflowState,
    /// Pages of the invoice that were sent.
    pub invoice_pages: usize,
    /// Pages of the certificate that were sent.
    pub certificate_pages: usize,
    pub prompt_version: PromptVersion,
    pub stats: VerificationStats,
    /// The images that were sent, when `retain_page_images` is on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_images: Vec<EncodedImage>,
}

impl VerificationOutput {
    /// Total number of page images in the request.
    pub fn total_pages(&self) -> usize {
        self.invoice_pages + self.certificate_pages
    }
}

/// Timing and usage figures for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Rasterisation time, both documents.
    pub render_duration_ms: u64,
    /// Time spent waiting on the completion endpoint.
    pub request_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Total base64 length of the images sent.
    pub payload_bytes: usize,
    /// Model reported by the provider, or the configured one.
    pub model: String,
}
