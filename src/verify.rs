//! Verification entry points.
//!
//! A run takes two documents, rasterises and encodes both, sends them in one
//! request and returns the report untouched. It either reaches
//! [`WorkflowState::Succeeded`] with a [`VerificationOutput`] or
//! [`WorkflowState::Failed`] with a [`VerifyError`]; there is no partial
//! result and no retry.
//!
//! [`Verifier`] holds the two side-effecting collaborators (rasteriser and
//! client) as trait objects. The free functions below build the default
//! ones from a [`VerificationConfig`] for the common case.

use crate::config::VerificationConfig;
use crate::credential::CredentialSource;
use crate::document::{Document, DocumentRole};
use crate::error::VerifyError;
use crate::output::{VerificationOutput, VerificationStats};
use crate::pipeline::encode;
use crate::pipeline::input;
use crate::pipeline::llm::{CompletionSettings, OpenAiClient, ProviderClient, VerificationClient};
use crate::pipeline::render::{self, PageRasterizer, PdfiumRasterizer};
use crate::pipeline::request::VerificationRequest;
use crate::progress::{WorkflowObserver, WorkflowState};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives one verification workflow per call.
///
/// A `Verifier` holds no per-run state, so one instance can serve any
/// number of sequential or concurrent runs.
#[derive(Clone)]
pub struct Verifier {
    rasterizer: Arc<dyn PageRasterizer>,
    client: Arc<dyn VerificationClient>,
    config: VerificationConfig,
}

impl Verifier {
    /// A verifier that renders with pdfium and sends through `client`.
    ///
    /// Fails with [`VerifyError::InvalidConfig`] if `config` breaks a
    /// constraint the builder would have rejected.
    pub fn new(
        client: Arc<dyn VerificationClient>,
        config: VerificationConfig,
    ) -> Result<Self, VerifyError> {
        config.validate()?;
        Ok(Self {
            rasterizer: Arc::new(PdfiumRasterizer::from_config(&config)),
            client,
            config,
        })
    }

    /// Replace the rasteriser (tests, alternative renderers).
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Run the workflow on two in-memory documents.
    ///
    /// Either document may be absent, in which case the run fails with
    /// [`VerifyError::MissingInput`] before anything is rendered or sent.
    pub async fn verify(
        &self,
        invoice: Option<Document>,
        certificate: Option<Document>,
    ) -> Result<VerificationOutput, VerifyError> {
        let mut tracker = StateTracker::new(self.config.observer.as_deref());
        let result = self.run(&mut tracker, invoice, certificate).await;
        tracker.finish(result)
    }

    /// Load both documents from paths or URLs, then run the workflow.
    ///
    /// Loading failures are reported to the observer like any other failure.
    pub async fn verify_inputs(
        &self,
        invoice: &str,
        certificate: &str,
    ) -> Result<VerificationOutput, VerifyError> {
        let mut tracker = StateTracker::new(self.config.observer.as_deref());
        let result = self.load_and_run(&mut tracker, invoice, certificate).await;
        tracker.finish(result)
    }

    /// Synchronous wrapper around [`Verifier::verify`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn verify_blocking(
        &self,
        invoice: Document,
        certificate: Document,
    ) -> Result<VerificationOutput, VerifyError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| VerifyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.verify(Some(invoice), Some(certificate)))
    }

    async fn load_and_run(
        &self,
        tracker: &mut StateTracker<'_>,
        invoice: &str,
        certificate: &str,
    ) -> Result<VerificationOutput, VerifyError> {
        let timeout = self.config.download_timeout_secs;
        let invoice = input::load_document(DocumentRole::Invoice, invoice, timeout).await?;
        let certificate =
            input::load_document(DocumentRole::Certificate, certificate, timeout).await?;
        self.run(tracker, Some(invoice), Some(certificate)).await
    }

    async fn run(
        &self,
        tracker: &mut StateTracker<'_>,
        invoice: Option<Document>,
        certificate: Option<Document>,
    ) -> Result<VerificationOutput, VerifyError> {
        let total_start = Instant::now();

        let invoice = invoice.ok_or(VerifyError::MissingInput {
            role: DocumentRole::Invoice,
        })?;
        let certificate = certificate.ok_or(VerifyError::MissingInput {
            role: DocumentRole::Certificate,
        })?;
        info!(
            "Starting verification: {} ({} bytes) against {} ({} bytes) via {}",
            invoice.name(),
            invoice.len(),
            certificate.name(),
            certificate.len(),
            self.client.describe()
        );

        // ── Rasterise ────────────────────────────────────────────────────
        tracker.advance(WorkflowState::Rasterizing)?;
        let render_start = Instant::now();
        let limit = self.config.page_limit;
        let invoice_pages =
            render::rasterize_document(Arc::clone(&self.rasterizer), invoice, limit).await?;
        tracker.rasterized(DocumentRole::Invoice, invoice_pages.len());
        let certificate_pages =
            render::rasterize_document(Arc::clone(&self.rasterizer), certificate, limit).await?;
        tracker.rasterized(DocumentRole::Certificate, certificate_pages.len());
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        // ── Encode and assemble ──────────────────────────────────────────
        tracker.advance(WorkflowState::Encoding)?;
        let invoice_images = encode::encode_document(&invoice_pages)?;
        drop(invoice_pages);
        let certificate_images = encode::encode_document(&certificate_pages)?;
        drop(certificate_pages);
        let request = VerificationRequest::build(invoice_images, certificate_images, &self.config)?;
        let payload_bytes = request.payload_bytes();
        debug!(
            "Request: {} images, {} bytes of base64, instruction {} chars",
            request.images().len(),
            payload_bytes,
            request.instruction().len()
        );

        // ── Request ──────────────────────────────────────────────────────
        tracker.advance(WorkflowState::Requesting)?;
        tracker.request_start(request.images().len(), payload_bytes);
        let request_start = Instant::now();
        let settings = CompletionSettings::from_config(&self.config);
        let completion = self.client.complete(&request, &settings).await?;
        let request_duration_ms = request_start.elapsed().as_millis() as u64;

        let stats = VerificationStats {
            input_tokens: completion.prompt_tokens,
            output_tokens: completion.completion_tokens,
            render_duration_ms,
            request_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            payload_bytes,
            model: completion.model.unwrap_or_else(|| self.config.model.clone()),
        };
        info!(
            "Verification complete: {} + {} pages, {} tokens in / {} out, {}ms total",
            request.invoice_pages(),
            request.certificate_pages(),
            stats.input_tokens,
            stats.output_tokens,
            stats.total_duration_ms
        );

        let invoice_pages = request.invoice_pages();
        let certificate_pages = request.certificate_pages();
        let prompt_version = request.prompt_version();
        let page_images = if self.config.retain_page_images {
            request.into_images()
        } else {
            Vec::new()
        };

        tracker.advance(WorkflowState::Succeeded)?;
        Ok(VerificationOutput {
            report: completion.content,
            state: WorkflowState::Succeeded,
            invoice_pages,
            certificate_pages,
            prompt_version,
            stats,
            page_images,
        })
    }
}

/// Tracks the current state of one run and reports it to the observer.
struct StateTracker<'a> {
    state: WorkflowState,
    observer: Option<&'a dyn WorkflowObserver>,
}

impl<'a> StateTracker<'a> {
    fn new(observer: Option<&'a dyn WorkflowObserver>) -> Self {
        Self {
            state: WorkflowState::Idle,
            observer,
        }
    }

    fn advance(&mut self, next: WorkflowState) -> Result<(), VerifyError> {
        if !self.state.can_transition_to(next) {
            return Err(VerifyError::Internal(format!(
                "illegal workflow transition {} → {}",
                self.state, next
            )));
        }
        debug!("Workflow: {} → {}", self.state, next);
        if let Some(obs) = self.observer {
            obs.on_state_change(self.state, next);
        }
        self.state = next;
        Ok(())
    }

    fn rasterized(&self, role: DocumentRole, pages: usize) {
        if let Some(obs) = self.observer {
            obs.on_document_rasterized(role, pages);
        }
    }

    fn request_start(&self, images: usize, payload_bytes: usize) {
        if let Some(obs) = self.observer {
            obs.on_request_start(images, payload_bytes);
        }
    }

    /// Move to `Failed` on error; pass the result through either way.
    fn finish(
        &mut self,
        result: Result<VerificationOutput, VerifyError>,
    ) -> Result<VerificationOutput, VerifyError> {
        if let Err(ref e) = result {
            warn!("Verification failed while {}: {}", self.state, e);
            if let Some(obs) = self.observer {
                obs.on_failure(self.state, &e.to_string());
            }
            if !self.state.is_terminal() {
                if let Some(obs) = self.observer {
                    obs.on_state_change(self.state, WorkflowState::Failed);
                }
                self.state = WorkflowState::Failed;
            }
        }
        result
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Provider name that auto-detects the `edgequake-llm` provider.
pub const AUTO_PROVIDER: &str = "auto";

/// Build the client a config asks for.
///
/// With `provider_name` set, the named `edgequake-llm` provider is used and
/// reads its own key from the environment; `"auto"` lets `edgequake-llm`
/// pick the provider from whichever key is set. Otherwise the credential is
/// resolved from `credential` and handed to an [`OpenAiClient`].
pub fn build_client(
    config: &VerificationConfig,
    credential: &CredentialSource,
) -> Result<Arc<dyn VerificationClient>, VerifyError> {
    match config.provider_name.as_deref() {
        Some(AUTO_PROVIDER) => Ok(Arc::new(ProviderClient::from_env()?)),
        Some(name) => Ok(Arc::new(ProviderClient::from_name(name, &config.model)?)),
        None => Ok(Arc::new(OpenAiClient::new(credential.resolve()?, config)?)),
    }
}

/// Verify two in-memory documents with the default rasteriser and client.
pub async fn verify_documents(
    invoice: Document,
    certificate: Document,
    credential: &CredentialSource,
    config: &VerificationConfig,
) -> Result<VerificationOutput, VerifyError> {
    let client = build_client(config, credential)?;
    Verifier::new(client, config.clone())?
        .verify(Some(invoice), Some(certificate))
        .await
}

/// Verify two documents given as local paths or HTTP(S) URLs.
pub async fn verify_files(
    invoice: &str,
    certificate: &str,
    credential: &CredentialSource,
    config: &VerificationConfig,
) -> Result<VerificationOutput, VerifyError> {
    let client = build_client(config, credential)?;
    Verifier::new(client, config.clone())?
        .verify_inputs(invoice, certificate)
        .await
}

/// Write a report to disk.
///
/// Uses atomic write (temp file + rename) so a failed write never leaves a
/// truncated report behind.
pub async fn write_report(path: impl AsRef<Path>, report: &str) -> Result<(), VerifyError> {
    let path = path.as_ref();
    let write_failed = |source: std::io::Error| VerifyError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path.file_name().ok_or_else(|| {
        write_failed(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no file name",
        ))
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
    }

    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
    tokio::fs::write(&tmp_path, report).await.map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    debug!("Wrote report to {}", path.display());
    Ok(())
}
