//! Configuration types for invoice/certificate verification.
//!
//! Every knob of a run lives in [`VerificationConfig`], built via its
//! [`VerificationConfigBuilder`]. The historical variations of this tool
//! (first page only vs. all pages, fixed vs. configurable token budget, two
//! checks vs. four) are all values of this one struct rather than separate
//! code paths.
//!
//! The credential is not part of the config: it belongs to the
//! client instance the caller constructs for its own session, so a config can
//! be shared and logged freely.

use crate::error::VerifyError;
use crate::progress::ObserverHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default model, matching the OpenAI vision model the tool was built around.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible endpoint base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for one verification run.
///
/// Built via [`VerificationConfig::builder()`] or using
/// [`VerificationConfig::default()`].
///
/// # Example
/// ```rust
/// use certcheck::{PageLimit, PromptVersion, VerificationConfig};
///
/// let config = VerificationConfig::builder()
///     .max_tokens(800)
///     .page_limit(PageLimit::FirstOnly)
///     .prompt_version(PromptVersion::StrictAcceptance)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct VerificationConfig {
    /// Model identifier, e.g. "gpt-4o-mini", "gpt-4.1". Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Provider name routed through `edgequake-llm` (e.g. "anthropic", "gemini").
    /// If None, the OpenAI-compatible client is used.
    pub provider_name: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Upper bound on the report length, in tokens. Default: 1000.
    ///
    /// Forwarded verbatim to the completion request. A four-check report with
    /// an EAN table rarely fits in the 500 tokens the first versions used.
    pub max_tokens: usize,

    /// Sampling temperature. Default: `Some(0.1)`. `None` omits the field,
    /// which some reasoning models require.
    pub temperature: Option<f32>,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Keeps every encoded page well under provider upload limits regardless
    /// of the physical page size.
    pub max_rendered_pixels: u32,

    /// How many pages of each document are sent. Default: all.
    pub page_limit: PageLimit,

    /// Which instruction template to use. Default: [`PromptVersion::ProductRegistry`].
    pub prompt_version: PromptVersion,

    /// Ask the model to write the report in this language (e.g. "French").
    pub report_language: Option<String>,

    /// Replace the template instruction entirely.
    pub instruction_override: Option<String>,

    /// PDF user password, tried on both documents.
    pub password: Option<String>,

    /// Explicit path to libpdfium (file or directory).
    pub pdfium_library_path: Option<PathBuf>,

    /// Timeout for the completion call in seconds. Default: None (transport default).
    pub api_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Keep the encoded page images in the output for display. Default: false.
    pub retain_page_images: bool,

    /// Optional observer for state transitions.
    pub observer: Option<ObserverHandle>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 1000,
            temperature: Some(0.1),
            max_rendered_pixels: 2000,
            page_limit: PageLimit::default(),
            prompt_version: PromptVersion::default(),
            report_language: None,
            instruction_override: None,
            password: None,
            pdfium_library_path: None,
            api_timeout_secs: None,
            download_timeout_secs: 120,
            retain_page_images: false,
            observer: None,
        }
    }
}

impl fmt::Debug for VerificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("page_limit", &self.page_limit)
            .field("prompt_version", &self.prompt_version)
            .field("report_language", &self.report_language)
            .field("instruction_override", &self.instruction_override.is_some())
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("retain_page_images", &self.retain_page_images)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn WorkflowObserver>"))
            .finish()
    }
}

impl VerificationConfig {
    /// Create a new builder for `VerificationConfig`.
    pub fn builder() -> VerificationConfigBuilder {
        VerificationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints [`VerificationConfigBuilder::build`] enforces.
    ///
    /// Also run by [`Verifier::new`](crate::Verifier::new), which catches
    /// configs assembled field by field.
    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.max_tokens == 0 {
            return Err(VerifyError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(VerifyError::InvalidConfig("model must not be empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(VerifyError::InvalidConfig(format!(
                "base_url must be an HTTP/HTTPS URL, got '{}'",
                self.base_url
            )));
        }
        if let PageLimit::First(0) = self.page_limit {
            return Err(VerifyError::InvalidConfig(
                "page limit must be ≥ 1".into(),
            ));
        }
        if matches!(&self.instruction_override, Some(s) if s.trim().is_empty()) {
            return Err(VerifyError::InvalidConfig(
                "instruction override must not be empty".into(),
            ));
        }
        if self.api_timeout_secs == Some(0) {
            return Err(VerifyError::InvalidConfig(
                "api timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`VerificationConfig`].
#[derive(Debug)]
pub struct VerificationConfigBuilder {
    config: VerificationConfig,
}

impl VerificationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: Option<f32>) -> Self {
        self.config.temperature = t.map(|t| t.clamp(0.0, 2.0));
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn page_limit(mut self, limit: PageLimit) -> Self {
        self.config.page_limit = limit;
        self
    }

    pub fn prompt_version(mut self, version: PromptVersion) -> Self {
        self.config.prompt_version = version;
        self
    }

    pub fn report_language(mut self, language: impl Into<String>) -> Self {
        self.config.report_language = Some(language.into());
        self
    }

    pub fn instruction_override(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction_override = Some(instruction.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn retain_page_images(mut self, v: bool) -> Self {
        self.config.retain_page_images = v;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<VerificationConfig, VerifyError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How many pages of each document go into the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageLimit {
    /// Every page (default).
    #[default]
    All,
    /// Only the first page of each document.
    FirstOnly,
    /// At most the first `n` pages of each document.
    First(usize),
}

impl PageLimit {
    /// Expand the limit into ascending 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let n = match self {
            PageLimit::All => total_pages,
            PageLimit::FirstOnly => total_pages.min(1),
            PageLimit::First(n) => total_pages.min(*n),
        };
        (0..n).collect()
    }
}

/// Instruction template version.
///
/// The wording decides the acceptance policy the model applies, so the
/// version is recorded in every output for traceability.
///
/// | Version | Checks |
/// |---------|--------|
/// | `IssuerValidity` | issuer identity, validity period |
/// | `ProductRegistry` | + product registry matching, unmatched EAN table (default) |
/// | `StrictAcceptance` | as `ProductRegistry`, plus a final ACCEPTED/REJECTED verdict |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptVersion {
    IssuerValidity,
    #[default]
    ProductRegistry,
    StrictAcceptance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = VerificationConfig::default();
        assert_eq!(c.model, "gpt-4o-mini");
        assert_eq!(c.max_tokens, 1000);
        assert_eq!(c.temperature, Some(0.1));
        assert_eq!(c.page_limit, PageLimit::All);
        assert_eq!(c.prompt_version, PromptVersion::ProductRegistry);
        assert!(c.api_timeout_secs.is_none());
    }

    #[test]
    fn builder_clamps_and_trims() {
        let c = VerificationConfig::builder()
            .temperature(Some(5.0))
            .max_rendered_pixels(10)
            .base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(c.temperature, Some(2.0));
        assert_eq!(c.max_rendered_pixels, 100);
        assert_eq!(c.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn validate_catches_hand_built_configs() {
        let mut c = VerificationConfig::default();
        assert!(c.validate().is_ok());

        c.max_tokens = 0;
        assert!(matches!(c.validate(), Err(VerifyError::InvalidConfig(_))));

        let c = VerificationConfig {
            base_url: "ftp://example.com".into(),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn builder_rejects_invalid() {
        assert!(VerificationConfig::builder().max_tokens(0).build().is_err());
        assert!(VerificationConfig::builder().model("  ").build().is_err());
        assert!(VerificationConfig::builder()
            .base_url("ftp://example.com")
            .build()
            .is_err());
        assert!(VerificationConfig::builder()
            .page_limit(PageLimit::First(0))
            .build()
            .is_err());
        assert!(VerificationConfig::builder()
            .api_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn page_limit_indices() {
        assert_eq!(PageLimit::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageLimit::FirstOnly.to_indices(3), vec![0]);
        assert_eq!(PageLimit::FirstOnly.to_indices(0), Vec::<usize>::new());
        assert_eq!(PageLimit::First(2).to_indices(5), vec![0, 1]);
        assert_eq!(PageLimit::First(9).to_indices(2), vec![0, 1]);
    }

    #[test]
    fn debug_redacts_password() {
        let c = VerificationConfig::builder()
            .password("hunter2")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
