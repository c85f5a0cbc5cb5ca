//! The two documents under comparison.
//!
//! A [`Document`] is an opaque PDF byte buffer. Nothing in this crate looks
//! inside it except the rasteriser; the only structure we track is which side
//! of the comparison it belongs to ([`DocumentRole`]) and a display name for
//! error messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the comparison a document is on.
///
/// The invoice is always "Document A" and the certificate "Document B":
/// invoice pages are sent before certificate pages in every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentRole {
    Invoice,
    Certificate,
}

impl DocumentRole {
    /// Both roles in request order.
    pub const ORDER: [DocumentRole; 2] = [DocumentRole::Invoice, DocumentRole::Certificate];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentRole::Invoice => "invoice",
            DocumentRole::Certificate => "certificate",
        }
    }
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded PDF, consumed once by the rasteriser.
#[derive(Clone)]
pub struct Document {
    role: DocumentRole,
    name: String,
    bytes: Vec<u8>,
}

impl Document {
    pub fn new(role: DocumentRole, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            role,
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// An invoice named `invoice.pdf`.
    pub fn invoice(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(DocumentRole::Invoice, "invoice.pdf", bytes)
    }

    /// A certificate named `certificate.pdf`.
    pub fn certificate(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(DocumentRole::Certificate, "certificate.pdf", bytes)
    }

    pub fn role(&self) -> DocumentRole {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `true` if a `%PDF-` header appears within the first 1024 bytes.
    ///
    /// pdfium accepts leading junk up to that offset, so a strict
    /// starts-with check would reject files it can actually open.
    pub fn has_pdf_header(&self) -> bool {
        let window = &self.bytes[..self.bytes.len().min(1024)];
        window.windows(5).any(|w| w == b"%PDF-")
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("role", &self.role)
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
