//! Image encoding: `PageImage` → base64 PNG wrapped in [`EncodedImage`].
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. PNG is the only format used: it is lossless, so the bytes the model
//! sees decode to exactly the pixels pdfium rendered, and the image crate's
//! encoder is deterministic, so the same page always yields the same string.

use crate::document::DocumentRole;
use crate::error::VerifyError;
use crate::pipeline::render::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// MIME type of every encoded page.
pub const PNG_MIME: &str = "image/png";

/// Largest accepted base64 payload per page (20 MiB).
///
/// Matches the per-image upload ceiling of the major providers; anything
/// larger would be rejected remotely after a slow upload.
pub const MAX_ENCODED_LEN: usize = 20 * 1024 * 1024;

/// A rendered page in transport form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub role: DocumentRole,
    /// 1-based page number within its document.
    pub page: usize,
    pub mime_type: String,
    /// Standard (padded) base64 of the PNG bytes.
    pub data: String,
}

impl EncodedImage {
    /// `data:image/png;base64,…` for `image_url` content parts.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// The raw PNG bytes.
    pub fn png_bytes(&self) -> Result<Vec<u8>, VerifyError> {
        STANDARD.decode(&self.data).map_err(|e| VerifyError::Encoding {
            role: self.role,
            page: self.page,
            detail: format!("invalid base64: {}", e),
        })
    }

    /// Decode back into an image.
    pub fn decode(&self) -> Result<DynamicImage, VerifyError> {
        let bytes = self.png_bytes()?;
        image::load_from_memory_with_format(&bytes, image::ImageFormat::Png).map_err(|e| {
            VerifyError::Encoding {
                role: self.role,
                page: self.page,
                detail: format!("invalid PNG: {}", e),
            }
        })
    }

    /// Convert for `edgequake-llm` providers.
    ///
    /// `detail: "high"` lets GPT-4-class models tile the full page instead of
    /// a single 512 px overview, which is what makes EAN digits legible.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type.as_str()).with_detail("high")
    }
}

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(page: &PageImage) -> Result<EncodedImage, VerifyError> {
    encode_page_capped(page, MAX_ENCODED_LEN)
}

fn encode_page_capped(page: &PageImage, max_len: usize) -> Result<EncodedImage, VerifyError> {
    let encoding_error = |detail: String| VerifyError::Encoding {
        role: page.role,
        page: page.page_num(),
        detail,
    };

    let mut buf = Vec::new();
    page.image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| encoding_error(e.to_string()))?;

    let b64 = STANDARD.encode(&buf);
    if b64.len() > max_len {
        return Err(encoding_error(format!(
            "encoded page is {} bytes, above the {} byte limit; lower max_rendered_pixels",
            b64.len(),
            max_len
        )));
    }
    debug!(
        "Encoded {} page {} → {} bytes base64",
        page.role,
        page.page_num(),
        b64.len()
    );

    Ok(EncodedImage {
        role: page.role,
        page: page.page_num(),
        mime_type: PNG_MIME.to_string(),
        data: b64,
    })
}

/// Encode every page of one document, stopping at the first failure.
pub fn encode_document(pages: &[PageImage]) -> Result<Vec<EncodedImage>, VerifyError> {
    pages.iter().map(encode_page).collect()
}
