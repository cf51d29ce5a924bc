//! CLI binary for scan2docx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig`, runs one conversion job, and saves the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scan2docx::{
    download_name, Converter, ConverterConfig, DocumentLanguage, JobProgressCallback,
    JobSnapshot, JobStatus, OutputQuality, ProgressCallback, SourceFile, RETENTION_WINDOW,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
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

/// Shown when the converter cannot be built from flags and environment.
const START_HINT: &str = "Cannot start: pass --base-url or set SCAN2DOCX_API_BASE_URL";

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one percentage bar reused for the upload and
/// the processing phase.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(100);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_status_change(&self, _from: JobStatus, to: JobStatus) {
        match to {
            JobStatus::Uploading => {
                // A previous attempt may have finished the bar.
                self.bar.reset();
                self.bar.enable_steady_tick(Duration::from_millis(80));
                self.bar.set_prefix("Uploading");
                self.bar.set_message("Uploading file...");
            }
            JobStatus::Processing => {
                self.bar.set_prefix("Processing OCR");
                self.bar.set_position(0);
            }
            JobStatus::Ready | JobStatus::Error | JobStatus::Idle => {
                self.bar.finish_and_clear();
            }
        }
    }

    fn on_job_created(&self, job_id: &str) {
        self.bar
            .println(format!("{} {}", cyan("◆"), dim(&format!("job {job_id}"))));
    }

    fn on_upload_progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_processing(&self, stage: &str, percent: u8) {
        self.bar.set_message(stage.to_string());
        self.bar.set_position(u64::from(percent));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a scanned PDF (writes invoice.docx next to it)
  scan2docx --confirm-rights invoice.pdf

  # Choose the output path and the best OCR quality
  scan2docx --confirm-rights --quality best scan.pdf -o out/scan.docx

  # Retry up to three times if the backend fails
  scan2docx --confirm-rights --attempts 3 contract.pdf

  # Check that the backend is reachable
  scan2docx --health

ENVIRONMENT VARIABLES:
  SCAN2DOCX_API_BASE_URL      Conversion backend, e.g. https://ocr.example.com
  SCAN2DOCX_POLL_INTERVAL_MS  Initial status poll interval
  SCAN2DOCX_MAX_WAIT_SECS     Give up waiting for a result after this long
  RUST_LOG                    Override log filtering (e.g. scan2docx=debug)

PRIVACY:
  Uploaded and converted files are deleted by the backend 24 hours after upload.
"#;

/// Convert scanned PDFs to editable DOCX documents with a remote OCR backend.
#[derive(Parser, Debug)]
#[command(
    name = "scan2docx",
    version,
    about = "Convert scanned PDFs to editable DOCX documents with a remote OCR backend",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file to convert.
    #[arg(required_unless_present = "health")]
    input: Option<PathBuf>,

    /// Write the DOCX here instead of next to the input.
    #[arg(short, long, env = "SCAN2DOCX_OUTPUT")]
    output: Option<PathBuf>,

    /// Conversion backend base address.
    #[arg(long, env = "SCAN2DOCX_API_BASE_URL")]
    base_url: Option<String>,

    /// Confirm you have rights to this document and agree to processing.
    #[arg(long)]
    confirm_rights: bool,

    /// Output quality: fast, balanced, best.
    #[arg(long, env = "SCAN2DOCX_QUALITY", value_enum, default_value = "balanced")]
    quality: QualityArg,

    /// Document language hint.
    #[arg(long, env = "SCAN2DOCX_LANGUAGE", value_enum, default_value = "auto")]
    language: LanguageArg,

    /// Do not ask the backend to preserve the original layout.
    #[arg(long)]
    no_preserve_layout: bool,

    /// Total attempts; each failed attempt is reset and resubmitted.
    #[arg(long, default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..=10))]
    attempts: u32,

    /// Initial status poll interval in milliseconds.
    #[arg(long, env = "SCAN2DOCX_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Maximum time to wait for the backend, in seconds.
    #[arg(long = "max-wait", env = "SCAN2DOCX_MAX_WAIT_SECS", default_value_t = 600)]
    max_wait_secs: u64,

    /// Print the final job snapshot as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SCAN2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Probe the backend and exit.
    #[arg(long)]
    health: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCAN2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCAN2DOCX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QualityArg {
    Fast,
    Balanced,
    Best,
}

impl From<QualityArg> for OutputQuality {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Fast => OutputQuality::Fast,
            QualityArg::Balanced => OutputQuality::Balanced,
            QualityArg::Best => OutputQuality::Best,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    Auto,
    En,
    Es,
    Fr,
    De,
    Zh,
}

impl From<LanguageArg> for DocumentLanguage {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::Auto => DocumentLanguage::Auto,
            LanguageArg::En => DocumentLanguage::En,
            LanguageArg::Es => DocumentLanguage::Es,
            LanguageArg::Fr => DocumentLanguage::Fr,
            LanguageArg::De => DocumentLanguage::De,
            LanguageArg::Zh => DocumentLanguage::Zh,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback that matters; keep library
    // INFO logs out of its way unless verbose output was requested.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.health;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn JobProgressCallback>)
    } else {
        None
    };

    // A missing backend address is fatal before anything else happens.
    let config = build_config(&cli, progress_cb)?;
    let converter = Converter::new(config).context(START_HINT)?;

    // ── Health-check mode ────────────────────────────────────────────────
    if cli.health {
        let payload = converter
            .health_check()
            .await
            .context("Backend health check failed")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("Failed to serialise payload")?
        );
        return Ok(ExitCode::SUCCESS);
    }

    let input = cli
        .input
        .as_deref()
        .context("An input PDF is required")?;
    let file = SourceFile::from_path(input)
        .await
        .with_context(|| format!("Cannot read {}", input.display()))?;

    // ── Run conversion ───────────────────────────────────────────────────
    let mut job = JobSnapshot::default();
    for attempt in 1..=cli.attempts {
        if attempt > 1 {
            converter.retry();
            if !cli.quiet {
                eprintln!(
                    "{} attempt {}/{}",
                    cyan("↻"),
                    attempt,
                    cli.attempts
                );
            }
        }
        job = converter
            .submit(file.clone(), cli.confirm_rights)
            .await
            .context("Conversion could not start")?;
        if job.status == JobStatus::Ready {
            break;
        }
        if !cli.quiet {
            eprintln!(
                "{} {}",
                red("✘"),
                job.error_message.as_deref().unwrap_or("Conversion failed")
            );
        }
    }

    if job.status != JobStatus::Ready {
        if cli.json {
            print_json(&job)?;
        }
        return Ok(ExitCode::FAILURE);
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));
    let written = converter
        .download_to(&output)
        .await
        .context("Failed to download the converted document")?;

    if cli.json {
        print_json(&job)?;
    }
    if !cli.quiet {
        eprintln!(
            "{}  {}  {}  →  {}",
            green("✔"),
            job.file_name.as_deref().unwrap_or(""),
            dim(&job.file_size_display().unwrap_or_default()),
            bold(&output.display().to_string()),
        );
        eprintln!(
            "   {} bytes written. {}",
            dim(&written.to_string()),
            dim(&format!(
                "Files are deleted from the backend {}h after upload.",
                RETENTION_WINDOW.as_secs() / 3600
            )),
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .poll_interval_ms(cli.poll_interval_ms)
        .max_wait_secs(cli.max_wait_secs)
        .quality(cli.quality.into())
        .language(cli.language.into())
        .preserve_layout(!cli.no_preserve_layout);

    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `<dir>/<name>.docx` beside the input.
fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(download_name(&name))
}

fn print_json(job: &JobSnapshot) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(job).context("Failed to serialise job")?
    );
    Ok(())
}
