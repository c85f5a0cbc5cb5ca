//! Shared fixtures for the integration tests: a tiny PDF writer and stub
//! collaborators for the rasteriser, the model client and the observer.

#![allow(dead_code)]

use async_trait::async_trait;
use certcheck::{
    Completion, CompletionSettings, Document, DocumentRole, PageImage, PageLimit,
    PageRasterizer, VerificationClient, VerificationRequest, VerifyError, WorkflowObserver,
    WorkflowState,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Route library logs to the test harness; `RUST_LOG` filters them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("certcheck=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ── PDF fixtures ─────────────────────────────────────────────────────────────

/// Build a small but well-formed PDF with one page per entry of `pages`.
///
/// Each entry is the list of text lines drawn on that page in Helvetica.
/// Cross-reference offsets are exact, so pdfium opens the file without
/// falling back to repair mode.
pub fn minimal_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let page_count = pages.len();
    // 1 catalog, 2 page tree, 3 font, then (page, contents) per page.
    let total_objects = 3 + 2 * page_count;
    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();

    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_count
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    for (i, lines) in pages.iter().enumerate() {
        let contents_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            contents_id
        ));

        let mut stream = String::from("BT\n/F1 14 Tf\n16 TL\n72 770 Td\n");
        for line in lines.iter() {
            stream.push_str(&format!("({}) Tj T*\n", escape_pdf_text(line)));
        }
        stream.push_str("ET\n");
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ));
    }

    let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(total_objects);
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total_objects + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            total_objects + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

fn escape_pdf_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Invoice from the reference scenario: ACME Foods, January 2024.
pub fn acme_invoice() -> Document {
    Document::new(
        DocumentRole::Invoice,
        "acme-invoice.pdf",
        minimal_pdf(&[&[
            "INVOICE 2024-0042",
            "Issuer: ACME Foods",
            "Period: 2024-01-01 to 2024-01-31",
            "EAN 3012345678901  Organic oat flakes 500g",
        ]]),
    )
}

/// Certificate from the reference scenario: ACME Foods, valid to mid-2024.
pub fn acme_certificate() -> Document {
    Document::new(
        DocumentRole::Certificate,
        "acme-certificate.pdf",
        minimal_pdf(&[&[
            "ORGANIC CERTIFICATE",
            "Operator: ACME Foods",
            "Valid from 2023-12-01 to 2024-06-30",
            "Products: cereal flakes (processed)",
        ]]),
    )
}

// ── Stub rasteriser ──────────────────────────────────────────────────────────

/// Rasteriser that counts `/Type /Page ` objects instead of rendering.
///
/// Page `i` is a 6×6 image whose first pixel encodes `(role, i)`, so tests
/// can check ordering after the encode round trip.
pub struct CountingRasterizer;

impl CountingRasterizer {
    pub fn count_pages(bytes: &[u8]) -> usize {
        let needle = b"/Type /Page ";
        bytes.windows(needle.len()).filter(|w| *w == &needle[..]).count()
    }

    pub fn marker(role: DocumentRole, index: usize) -> Rgba<u8> {
        let r = match role {
            DocumentRole::Invoice => 10,
            DocumentRole::Certificate => 200,
        };
        Rgba([r, index as u8, 0, 255])
    }
}

impl PageRasterizer for CountingRasterizer {
    fn rasterize(
        &self,
        document: &Document,
        limit: PageLimit,
    ) -> Result<Vec<PageImage>, VerifyError> {
        let total = Self::count_pages(document.bytes());
        Ok(limit
            .to_indices(total)
            .into_iter()
            .map(|index| {
                let mut img = RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 255]));
                img.put_pixel(0, 0, Self::marker(document.role(), index));
                PageImage {
                    role: document.role(),
                    index,
                    image: DynamicImage::ImageRgba8(img),
                }
            })
            .collect())
    }
}

/// Rasteriser that yields 32-bit float pages, which PNG cannot encode.
pub struct FloatRasterizer;

impl PageRasterizer for FloatRasterizer {
    fn rasterize(
        &self,
        document: &Document,
        _limit: PageLimit,
    ) -> Result<Vec<PageImage>, VerifyError> {
        Ok(vec![PageImage {
            role: document.role(),
            index: 0,
            image: DynamicImage::new_rgb32f(6, 6),
        }])
    }
}

/// Rasteriser that returns two pages last-first.
pub struct ReversedRasterizer;

impl PageRasterizer for ReversedRasterizer {
    fn rasterize(
        &self,
        document: &Document,
        _limit: PageLimit,
    ) -> Result<Vec<PageImage>, VerifyError> {
        Ok([1, 0]
            .into_iter()
            .map(|index| PageImage {
                role: document.role(),
                index,
                image: DynamicImage::new_rgba8(6, 6),
            })
            .collect())
    }
}

// ── Stub clients ─────────────────────────────────────────────────────────────

/// What a stub client saw on its last call.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub instruction: String,
    /// `(role, 1-based page)` in request order.
    pub images: Vec<(DocumentRole, usize)>,
    pub decoded_markers: Vec<Rgba<u8>>,
    pub settings: CompletionSettings,
}

/// Client that answers every request with a fixed report.
pub struct StubClient {
    reply: String,
    calls: AtomicUsize,
    seen: Mutex<Option<SeenRequest>>,
}

impl StubClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Option<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationClient for StubClient {
    fn describe(&self) -> String {
        "stub".into()
    }

    async fn complete(
        &self,
        request: &VerificationRequest,
        settings: &CompletionSettings,
    ) -> Result<Completion, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let decoded_markers = request
            .images()
            .iter()
            .map(|img| *img.decode().unwrap().to_rgba8().get_pixel(0, 0))
            .collect();
        *self.seen.lock().unwrap() = Some(SeenRequest {
            instruction: request.instruction().to_string(),
            images: request.images().iter().map(|i| (i.role, i.page)).collect(),
            decoded_markers,
            settings: *settings,
        });
        Ok(Completion {
            content: self.reply.clone(),
            prompt_tokens: 1200,
            completion_tokens: 3,
            model: Some("stub-model".into()),
        })
    }
}

/// Client whose transport always fails with `message`.
pub struct FailingClient {
    message: String,
    calls: AtomicUsize,
}

impl FailingClient {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerificationClient for FailingClient {
    fn describe(&self) -> String {
        "failing".into()
    }

    async fn complete(
        &self,
        _request: &VerificationRequest,
        _settings: &CompletionSettings,
    ) -> Result<Completion, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(VerifyError::Verification {
            status: None,
            message: self.message.clone(),
        })
    }
}

// ── Observer ─────────────────────────────────────────────────────────────────

/// Records every event in arrival order.
#[derive(Default)]
pub struct Recorder {
    pub transitions: Mutex<Vec<(WorkflowState, WorkflowState)>>,
    pub rasterized: Mutex<Vec<(DocumentRole, usize)>>,
    pub failures: Mutex<Vec<(WorkflowState, String)>>,
    pub requests: AtomicUsize,
}

impl Recorder {
    pub fn final_state(&self) -> Option<WorkflowState> {
        self.transitions.lock().unwrap().last().map(|(_, to)| *to)
    }

    pub fn states(&self) -> Vec<WorkflowState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, to)| *to)
            .collect()
    }
}

impl WorkflowObserver for Recorder {
    fn on_state_change(&self, from: WorkflowState, to: WorkflowState) {
        assert!(from.can_transition_to(to), "illegal edge {from} → {to}");
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_document_rasterized(&self, role: DocumentRole, pages: usize) {
        self.rasterized.lock().unwrap().push((role, pages));
    }

    fn on_request_start(&self, _images: usize, _payload_bytes: usize) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, state: WorkflowState, error: &str) {
        self.failures.lock().unwrap().push((state, error.to_string()));
    }
}
