//! # certcheck
//!
//! Compare an invoice against a supplier certificate (organic, quality,
//! origin…) by showing both documents to a Vision Language Model (VLM).
//!
//! ## Why this crate?
//!
//! Certificates and invoices come as scans, exported spreadsheets and
//! designer PDFs; text extraction routinely loses the tables and stamps that
//! matter. Instead this crate rasterises every page of both documents into
//! PNGs and sends them, with a fixed auditing instruction, to a multimodal
//! model in a single request. The model reads them as a human auditor would
//! and writes the comparison report: issuer identity, validity period, and
//! which invoiced products are covered by the certificate.
//!
//! The report is returned exactly as the model wrote it. The crate does no
//! parsing or verdict logic of its own.
//!
//! ## Pipeline Overview
//!
//! ```text
//! invoice.pdf ─┐
//!              ├─ 1. Input    load local file or download from URL
//! cert.pdf ────┤
//!              ├─ 2. Render   rasterise pages via pdfium (spawn_blocking)
//!              ├─ 3. Encode   PNG → base64
//!              ├─ 4. Request  instruction + invoice pages + certificate pages
//!              ├─ 5. VLM      one call to gpt-4o-mini / claude / gemini / …
//!              └─ 6. Output   report text + timing and token stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certcheck::{verify_files, CredentialSource, VerificationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key read from OPENAI_API_KEY
//!     let credential = CredentialSource::default();
//!     let config = VerificationConfig::default();
//!     let output = verify_files("invoice.pdf", "certificate.pdf", &credential, &config).await?;
//!     println!("{}", output.report);
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.input_tokens,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `certcheck` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! certcheck = { version = "0.1", default-features = false }
//! ```
//!
//! ## Prompt Versions
//!
//! | Version | Checks | Verdict |
//! |---------|--------|---------|
//! | `issuer_validity` | issuer, validity period | none |
//! | `product_registry` | + product registry, unmatched EANs | lists gaps (default) |
//! | `strict_acceptance` | same as above | `ACCEPTED` / `REJECTED` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod credential;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod verify;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    PageLimit, PromptVersion, VerificationConfig, VerificationConfigBuilder, DEFAULT_BASE_URL,
    DEFAULT_MODEL,
};
pub use credential::{Credential, CredentialSource, DEFAULT_API_KEY_ENV};
pub use document::{Document, DocumentRole};
pub use error::VerifyError;
pub use output::{VerificationOutput, VerificationStats};
pub use pipeline::encode::EncodedImage;
pub use pipeline::llm::{
    Completion, CompletionSettings, OpenAiClient, ProviderClient, VerificationClient,
};
pub use pipeline::render::{PageImage, PageRasterizer, PdfiumRasterizer};
pub use pipeline::request::VerificationRequest;
pub use progress::{NoopObserver, ObserverHandle, WorkflowObserver, WorkflowState};
pub use verify::{
    build_client, verify_documents, verify_files, write_report, Verifier, AUTO_PROVIDER,
};
