//! PDF rasterisation: render a document's pages to `DynamicImage` via pdfium.
//!
//! ## Why a trait?
//!
//! [`PageRasterizer`] is the seam between the workflow and pdfium. The
//! production implementation binds to a native library at runtime; tests and
//! embedders that already hold page images plug in their own implementation
//! and exercise the rest of the workflow unchanged.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and blocking, CPU-heavy
//! rendering. [`rasterize_document`] moves the work onto Tokio's blocking
//! pool so the runtime's worker threads never stall on it.

use crate::config::{PageLimit, VerificationConfig};
use crate::document::{Document, DocumentRole};
use crate::error::VerifyError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// One rendered page of a document.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub role: DocumentRole,
    /// 0-based position within the document.
    pub index: usize,
    pub image: DynamicImage,
}

impl PageImage {
    /// 1-based page number, as shown to users.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }
}

/// Turns a PDF into an ordered sequence of page images.
///
/// Implementations are blocking; the workflow calls them from
/// `spawn_blocking`. A successful result must be non-empty and in document
/// order — [`rasterize_document`] enforces both.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(
        &self,
        document: &Document,
        limit: PageLimit,
    ) -> Result<Vec<PageImage>, VerifyError>;
}

/// Reject inputs that cannot be a PDF before touching pdfium.
pub fn check_pdf_bytes(document: &Document) -> Result<(), VerifyError> {
    if document.is_empty() {
        return Err(VerifyError::Rasterization {
            role: document.role(),
            detail: format!("'{}' is empty (0 bytes)", document.name()),
        });
    }
    if !document.has_pdf_header() {
        let mut magic = [0u8; 4];
        let n = document.len().min(4);
        magic[..n].copy_from_slice(&document.bytes()[..n]);
        return Err(VerifyError::Rasterization {
            role: document.role(),
            detail: format!(
                "'{}' is not a PDF (first bytes: {:?})",
                document.name(),
                magic
            ),
        });
    }
    Ok(())
}

/// Rasterise one document on the blocking pool and validate the result.
///
/// The document is moved in and dropped once rendering is done.
pub async fn rasterize_document(
    rasterizer: Arc<dyn PageRasterizer>,
    document: Document,
    limit: PageLimit,
) -> Result<Vec<PageImage>, VerifyError> {
    check_pdf_bytes(&document)?;

    let role = document.role();
    let name = document.name().to_string();

    let pages = tokio::task::spawn_blocking(move || rasterizer.rasterize(&document, limit))
        .await
        .map_err(|e| VerifyError::Internal(format!("Render task panicked: {}", e)))??;

    if pages.is_empty() {
        return Err(VerifyError::Rasterization {
            role,
            detail: format!("'{}' has no renderable pages", name),
        });
    }

    let in_order = pages
        .iter()
        .enumerate()
        .all(|(i, p)| p.role == role && (i == 0 || pages[i - 1].index < p.index));
    if !in_order {
        return Err(VerifyError::Rasterization {
            role,
            detail: format!("pages of '{}' came back out of document order", name),
        });
    }

    info!("Rasterised {} page(s) of the {}", pages.len(), role);
    Ok(pages)
}

/// The production rasteriser, backed by pdfium-render.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self {
            max_rendered_pixels,
            password: None,
            library_path: None,
        }
    }

    pub fn from_config(config: &VerificationConfig) -> Self {
        Self {
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            library_path: config.pdfium_library_path.clone(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        document: &Document,
        limit: PageLimit,
    ) -> Result<Vec<PageImage>, VerifyError> {
        let role = document.role();
        let pdfium = bind_pdfium(self.library_path.as_deref())?;

        let pdf = pdfium
            .load_pdf_from_byte_slice(document.bytes(), self.password.as_deref())
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                let detail = if err_str.contains("Password") || err_str.contains("password") {
                    if self.password.is_some() {
                        format!("wrong password for '{}'", document.name())
                    } else {
                        format!("'{}' is encrypted and requires a password", document.name())
                    }
                } else {
                    format!("'{}' is corrupt: {}", document.name(), err_str)
                };
                VerifyError::Rasterization { role, detail }
            })?;

        let pages = pdf.pages();
        let total_pages = pages.len() as usize;
        debug!("{} loaded: {} pages", document.name(), total_pages);

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        let indices = limit.to_indices(total_pages);
        let mut results = Vec::with_capacity(indices.len());

        for idx in indices {
            let page = pages
                .get(idx as u16)
                .map_err(|e| VerifyError::Rasterization {
                    role,
                    detail: format!("page {}: {:?}", idx + 1, e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                VerifyError::Rasterization {
                    role,
                    detail: format!("page {}: {:?}", idx + 1, e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered {} page {} → {}x{} px",
                role,
                idx + 1,
                image.width(),
                image.height()
            );

            results.push(PageImage {
                role,
                index: idx,
                image,
            });
        }

        Ok(results)
    }
}

/// Bind to a pdfium library.
///
/// Resolution order: the explicit `library_path`, then `PDFIUM_LIB_PATH`,
/// then the working directory, then the system library. A path may name the
/// library file itself or the directory that contains it.
pub fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, VerifyError> {
    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let explicit = library_path.map(Path::to_path_buf).or(env_path);

    let bindings = match explicit {
        Some(path) => {
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path.clone()
            };
            Pdfium::bind_to_library(&lib).map_err(|e| {
                VerifyError::PdfiumBindingFailed(format!("{}: {}", lib.display(), e))
            })?
        }
        None => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| VerifyError::PdfiumBindingFailed(e.to_string()))?,
    };

    Ok(Pdfium::new(bindings))
}
