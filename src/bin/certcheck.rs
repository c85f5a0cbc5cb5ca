//! CLI binary for certcheck.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `VerificationConfig` and prints the report.

use anyhow::{bail, Context, Result};
use certcheck::{
    build_client, write_report, CredentialSource, DocumentRole, ObserverHandle, PageLimit,
    PromptVersion, VerificationConfig, Verifier, VerifyError, WorkflowObserver, WorkflowState,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a single spinner whose prefix follows the workflow
/// state, plus one log line per rasterised document.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl WorkflowObserver for SpinnerObserver {
    fn on_state_change(&self, _from: WorkflowState, to: WorkflowState) {
        match to {
            WorkflowState::Rasterizing => {
                self.bar.set_prefix("Rendering");
                self.bar.set_message("pdfium");
            }
            WorkflowState::Encoding => {
                self.bar.set_prefix("Encoding");
                self.bar.set_message("PNG → base64");
            }
            WorkflowState::Requesting => self.bar.set_prefix("Analysing"),
            WorkflowState::Succeeded => {
                self.bar.finish_and_clear();
                eprintln!("{} {}", green("✔"), bold("Analysis complete"));
            }
            WorkflowState::Failed => self.bar.finish_and_clear(),
            WorkflowState::Idle => {}
        }
    }

    fn on_document_rasterized(&self, role: DocumentRole, pages: usize) {
        self.bar.println(format!(
            "  {} {:<12} {}",
            green("✓"),
            role,
            dim(&format!("{pages} page(s)"))
        ));
    }

    fn on_request_start(&self, images: usize, payload_bytes: usize) {
        self.bar.set_message(format!(
            "{images} images, {:.1} MB – waiting for the model…",
            payload_bytes as f64 / (1024.0 * 1024.0)
        ));
    }

    fn on_failure(&self, state: WorkflowState, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar
            .println(format!("  {} failed while {}: {}", red("✗"), state, red(first_line)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compare an invoice with a certificate (report on stdout)
  certcheck invoice.pdf certificate.pdf

  # Write the report to a file
  certcheck invoice.pdf certificate.pdf -o report.md

  # Only the first page of each document, strict accept/reject verdict
  certcheck --pages first --prompt strict invoice.pdf certificate.pdf

  # Report in French
  certcheck --language French facture.pdf certificat.pdf

  # Use another provider through edgequake-llm
  certcheck --provider anthropic --model claude-sonnet-4-20250514 invoice.pdf cert.pdf

  # Let edgequake-llm pick the provider from whichever API key is set
  certcheck --provider auto invoice.pdf cert.pdf

  # Certificate from a URL, JSON output, keep the rendered pages
  certcheck --json --save-pages pages/ invoice.pdf https://example.com/cert.pdf

PROMPT VERSIONS:
  issuer-validity    Issuer identity and validity period only
  product-registry   + product registry check, lists unmatched EANs (default)
  strict             Same checks, ends with VERDICT: ACCEPTED / REJECTED

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key for the OpenAI-compatible endpoint
  ANTHROPIC_API_KEY       Read by --provider anthropic
  GEMINI_API_KEY          Read by --provider gemini
  PDFIUM_LIB_PATH         Path to libpdfium (file or containing directory)
  RUST_LOG                Override log filter (e.g. certcheck=debug)
"#;

/// Check an invoice against a supplier certificate using a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "certcheck",
    version,
    about = "Check an invoice against a supplier certificate using a Vision LLM",
    long_about = "Render every page of an invoice and a certificate, send them to a multimodal \
model in a single request, and print the model's comparison report: issuer identity, validity \
period and product coverage. Works with OpenAI and any OpenAI-compatible endpoint, or with \
Anthropic, Gemini and Ollama through --provider.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Invoice: local PDF path or HTTP/HTTPS URL.
    invoice: String,

    /// Certificate: local PDF path or HTTP/HTTPS URL.
    certificate: String,

    /// API key for the OpenAI-compatible endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Route through an edgequake-llm provider: anthropic, gemini, ollama, …
    /// or `auto` to detect one from the environment.
    #[arg(long, env = "CERTCHECK_PROVIDER")]
    provider: Option<String>,

    /// Model ID (e.g. gpt-4o-mini, gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "CERTCHECK_MODEL", default_value = certcheck::DEFAULT_MODEL)]
    model: String,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "CERTCHECK_BASE_URL", default_value = certcheck::DEFAULT_BASE_URL)]
    base_url: String,

    /// Upper bound on the report length, in tokens.
    #[arg(long, env = "CERTCHECK_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0). Omit to use the default of 0.1.
    #[arg(long, env = "CERTCHECK_TEMPERATURE")]
    temperature: Option<f32>,

    /// Pages per document: all, first, or a number N (first N pages).
    #[arg(long, env = "CERTCHECK_PAGES", default_value = "all")]
    pages: String,

    /// Which checks the model is asked to perform.
    #[arg(long, env = "CERTCHECK_PROMPT", value_enum, default_value = "product-registry")]
    prompt: PromptArg,

    /// Path to a text file replacing the built-in checks.
    #[arg(long, env = "CERTCHECK_INSTRUCTION_FILE")]
    instruction_file: Option<PathBuf>,

    /// Language of the report (e.g. French).
    #[arg(long, env = "CERTCHECK_LANGUAGE")]
    language: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "CERTCHECK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Longest edge of a rendered page, in pixels.
    #[arg(long, env = "CERTCHECK_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Timeout for the completion call, in seconds. No timeout when unset.
    #[arg(long, env = "CERTCHECK_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CERTCHECK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Write the report to this file instead of stdout.
    #[arg(short, long, env = "CERTCHECK_OUTPUT")]
    output: Option<PathBuf>,

    /// Save the rendered page images (PNG) into this directory.
    #[arg(long)]
    save_pages: Option<PathBuf>,

    /// Output structured JSON (VerificationOutput) instead of the report.
    #[arg(long, env = "CERTCHECK_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "CERTCHECK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CERTCHECK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CERTCHECK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PromptArg {
    IssuerValidity,
    ProductRegistry,
    Strict,
}

impl From<PromptArg> for PromptVersion {
    fn from(v: PromptArg) -> Self {
        match v {
            PromptArg::IssuerValidity => PromptVersion::IssuerValidity,
            PromptArg::ProductRegistry => PromptVersion::ProductRegistry,
            PromptArg::Strict => PromptVersion::StrictAcceptance,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and client ──────────────────────────────────────────
    let observer: Option<ObserverHandle> = if show_progress {
        Some(SpinnerObserver::new() as Arc<dyn WorkflowObserver>)
    } else {
        None
    };

    let config = build_config(&cli, observer).await?;
    let credential = match cli.api_key {
        Some(ref key) => CredentialSource::Explicit(key.clone()),
        None => CredentialSource::default(),
    };
    let client = build_client(&config, &credential).context("Cannot create the model client")?;

    // ── Run verification ─────────────────────────────────────────────────
    let verifier = Verifier::new(client, config).context("Invalid configuration")?;
    let output = match verifier.verify_inputs(&cli.invoice, &cli.certificate).await {
        Ok(output) => output,
        Err(e) => {
            let context = failure_context(&e);
            return Err(anyhow::Error::new(e).context(context));
        }
    };

    if let Some(ref dir) = cli.save_pages {
        save_pages(dir, &output.page_images).await?;
        if !cli.quiet {
            eprintln!(
                "{} {} page images saved to {}",
                green("✔"),
                output.page_images.len(),
                bold(&dir.display().to_string())
            );
        }
    }

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        output.report.clone()
    };

    if let Some(ref path) = cli.output {
        write_report(path, &rendered)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!(
                "{}  {} + {} pages  {}ms  →  {}",
                green("✔"),
                output.invoice_pages,
                output.certificate_pages,
                output.stats.total_duration_ms,
                bold(&path.display().to_string()),
            );
        }
    } else {
        write_rendered(&mut io::stdout().lock(), &rendered)
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}  {}ms total",
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
            cyan(&output.stats.model),
            output.stats.total_duration_ms,
        );
    }

    Ok(())
}

/// Headline for a failed run; a rejected key gets a pointer to the key flag.
fn failure_context(err: &VerifyError) -> &'static str {
    if err.is_auth_error() {
        "Verification failed: the API rejected the key (check --api-key or OPENAI_API_KEY)"
    } else {
        "Verification failed"
    }
}

/// Write the report, ending it with a newline if it lacks one.
fn write_rendered(out: &mut impl Write, rendered: &str) -> io::Result<()> {
    out.write_all(rendered.as_bytes())?;
    if !rendered.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Map CLI args to `VerificationConfig`.
async fn build_config(cli: &Cli, observer: Option<ObserverHandle>) -> Result<VerificationConfig> {
    let mut builder = VerificationConfig::builder()
        .model(&cli.model)
        .base_url(&cli.base_url)
        .max_tokens(cli.max_tokens)
        .max_rendered_pixels(cli.max_pixels)
        .page_limit(parse_pages(&cli.pages)?)
        .prompt_version(cli.prompt.into())
        .download_timeout_secs(cli.download_timeout)
        .retain_page_images(cli.save_pages.is_some());

    if let Some(t) = cli.temperature {
        builder = builder.temperature(Some(t));
    }
    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref lang) = cli.language {
        builder = builder.report_language(lang);
    }
    if let Some(ref path) = cli.instruction_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction_override(text);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        if !path.is_empty() {
            builder = builder.pdfium_library_path(path);
        }
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages`: `all`, `first`, or a positive page count.
fn parse_pages(s: &str) -> Result<PageLimit> {
    match s.trim().to_ascii_lowercase().as_str() {
        "all" => Ok(PageLimit::All),
        "first" => Ok(PageLimit::FirstOnly),
        n => {
            let count: usize = n
                .parse()
                .with_context(|| format!("Invalid --pages value '{s}': expected all, first or N"))?;
            if count == 0 {
                bail!("Invalid --pages value '{s}': N must be at least 1");
            }
            Ok(PageLimit::First(count))
        }
    }
}

/// Write each retained page as `<role>-page-<n>.png`.
async fn save_pages(dir: &Path, images: &[certcheck::EncodedImage]) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for img in images {
        let path = dir.join(format!("{}-page-{}.png", img.role, img.page));
        let bytes = img.png_bytes()?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rendered_report_gets_one_trailing_newline() {
        let mut out = Vec::new();
        write_rendered(&mut out, "MATCH").unwrap();
        assert_eq!(out, b"MATCH\n");

        let mut out = Vec::new();
        write_rendered(&mut out, "MATCH\n").unwrap();
        assert_eq!(out, b"MATCH\n");
    }

    #[test]
    fn rejected_key_points_at_the_key_flag() {
        let rejected = VerifyError::Verification {
            status: Some(401),
            message: "Incorrect API key provided".into(),
        };
        assert!(failure_context(&rejected).contains("--api-key"));

        let throttled = VerifyError::Verification {
            status: Some(429),
            message: "slow down".into(),
        };
        assert_eq!(failure_context(&throttled), "Verification failed");
    }

    #[test]
    fn stdout_write_errors_propagate() {
        let err = write_rendered(&mut BrokenPipe, "MATCH").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn pages_flag() {
        assert_eq!(parse_pages("all").unwrap(), PageLimit::All);
        assert_eq!(parse_pages("First").unwrap(), PageLimit::FirstOnly);
        assert_eq!(parse_pages("3").unwrap(), PageLimit::First(3));
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("1-3").is_err());
    }

    #[test]
    fn cli_parses_two_inputs() {
        let cli = Cli::try_parse_from([
            "certcheck",
            "--prompt",
            "strict",
            "--max-tokens",
            "500",
            "invoice.pdf",
            "certificate.pdf",
        ])
        .unwrap();
        assert_eq!(cli.invoice, "invoice.pdf");
        assert_eq!(cli.certificate, "certificate.pdf");
        assert_eq!(cli.max_tokens, 500);
        assert_eq!(
            PromptVersion::from(cli.prompt),
            PromptVersion::StrictAcceptance
        );
    }
}
