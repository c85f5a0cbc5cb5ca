//! Request assembly: one instruction plus every page image of both documents.
//!
//! All pages go into a single request so the model can cross-reference the
//! invoice and the certificate in one context. Images are ordered invoice
//! first, then certificate, each in page order; the instruction tells the
//! model where the boundary is.

use crate::config::{PromptVersion, VerificationConfig};
use crate::document::DocumentRole;
use crate::error::VerifyError;
use crate::pipeline::encode::EncodedImage;
use crate::prompts::build_instruction;

/// A ready-to-send multimodal request.
///
/// The only constructor is [`VerificationRequest::build`], which refuses to
/// produce a request unless both documents contributed at least one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    instruction: String,
    prompt_version: PromptVersion,
    images: Vec<EncodedImage>,
    invoice_pages: usize,
    certificate_pages: usize,
}

impl VerificationRequest {
    /// Assemble the request for one run.
    ///
    /// # Errors
    /// [`VerifyError::Rasterization`] if either side is empty, and
    /// [`VerifyError::Internal`] if an image is tagged with the wrong role.
    pub fn build(
        invoice: Vec<EncodedImage>,
        certificate: Vec<EncodedImage>,
        config: &VerificationConfig,
    ) -> Result<Self, VerifyError> {
        for (role, images) in [
            (DocumentRole::Invoice, &invoice),
            (DocumentRole::Certificate, &certificate),
        ] {
            if images.is_empty() {
                return Err(VerifyError::Rasterization {
                    role,
                    detail: "no page images to send".into(),
                });
            }
            if let Some(stray) = images.iter().find(|img| img.role != role) {
                return Err(VerifyError::Internal(format!(
                    "{} page {} was passed as part of the {}",
                    stray.role, stray.page, role
                )));
            }
        }

        let invoice_pages = invoice.len();
        let certificate_pages = certificate.len();
        let instruction = build_instruction(
            config.prompt_version,
            invoice_pages,
            certificate_pages,
            config.report_language.as_deref(),
            config.instruction_override.as_deref(),
        );

        let mut images = invoice;
        images.extend(certificate);

        Ok(Self {
            instruction,
            prompt_version: config.prompt_version,
            images,
            invoice_pages,
            certificate_pages,
        })
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn prompt_version(&self) -> PromptVersion {
        self.prompt_version
    }

    /// Every image, invoice pages first.
    pub fn images(&self) -> &[EncodedImage] {
        &self.images
    }

    pub fn invoice_pages(&self) -> usize {
        self.invoice_pages
    }

    pub fn certificate_pages(&self) -> usize {
        self.certificate_pages
    }

    /// Total base64 length of all images.
    pub fn payload_bytes(&self) -> usize {
        self.images.iter().map(|img| img.data.len()).sum()
    }

    /// Consume the request, returning its images (for display retention).
    pub fn into_images(self) -> Vec<EncodedImage> {
        self.images
    }
}
