//! Configuration types for remote conversion jobs.
//!
//! All orchestrator behaviour is controlled through [`ConverterConfig`],
//! built via its [`ConverterConfigBuilder`]. The only required value is the
//! backend base address; everything else has a documented default.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable holding the backend base address.
pub const BASE_URL_ENV: &str = "SCAN2DOCX_API_BASE_URL";

/// Label shown between upload completion and the first status poll.
pub const DEFAULT_INITIAL_STAGE: &str = "Analyzing document structure...";

/// Advertised upload limit (50 MB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// How long the backend keeps uploaded and generated files.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for conversion jobs.
///
/// # Example
/// ```rust
/// use scan2docx::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .base_url("https://ocr.example.com/")
///     .poll_interval_ms(500)
///     .max_wait_secs(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url.as_deref(), Some("https://ocr.example.com/"));
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Backend base address, e.g. `https://ocr.example.com`. Required by
    /// [`crate::client::HttpJobClient`].
    pub base_url: Option<String>,

    /// Delay before the first status poll, in milliseconds. Default: 1000.
    ///
    /// Doubles after each non-terminal poll up to `max_poll_interval_ms`.
    pub poll_interval_ms: u64,

    /// Upper bound for the poll backoff, in milliseconds. Default: 5000.
    pub max_poll_interval_ms: u64,

    /// Total time the tracker waits for a terminal status, in seconds.
    /// Default: 600. Exceeding it moves the job to `Error`.
    pub max_wait_secs: u64,

    /// Per-request timeout for JSON calls, in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Timeout for the file upload request, in seconds. Default: 300.
    pub upload_timeout_secs: u64,

    /// Advisory size limit for source files. Default: 50 MB.
    pub max_file_size_bytes: u64,

    /// Stage label used until the backend reports its own. Default:
    /// [`DEFAULT_INITIAL_STAGE`].
    pub initial_stage_label: String,

    /// Conversion settings forwarded with the upload.
    pub options: ConversionOptions,

    /// Receives lifecycle events as they are applied.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            poll_interval_ms: 1000,
            max_poll_interval_ms: 5000,
            max_wait_secs: 600,
            request_timeout_secs: 60,
            upload_timeout_secs: 300,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            initial_stage_label: DEFAULT_INITIAL_STAGE.to_string(),
            options: ConversionOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("base_url", &self.base_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_interval_ms", &self.max_poll_interval_ms)
            .field("max_wait_secs", &self.max_wait_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("max_file_size_bytes", &self.max_file_size_bytes)
            .field("initial_stage_label", &self.initial_stage_label)
            .field("options", &self.options)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overridden by environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SCAN2DOCX_API_BASE_URL` | unset | Backend base address |
    /// | `SCAN2DOCX_POLL_INTERVAL_MS` | `1000` | Initial poll interval |
    /// | `SCAN2DOCX_MAX_WAIT_SECS` | `600` | Polling budget |
    pub fn from_env() -> Result<Self, ConvertError> {
        let mut builder = Self::builder();

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                builder = builder.base_url(url);
            }
        }
        if let Some(ms) = env_u64("SCAN2DOCX_POLL_INTERVAL_MS") {
            builder = builder.poll_interval_ms(ms);
        }
        if let Some(secs) = env_u64("SCAN2DOCX_MAX_WAIT_SECS") {
            builder = builder.max_wait_secs(secs);
        }

        builder.build()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// The base address, or a `Config` error when it is unset.
    pub fn require_base_url(&self) -> Result<&str, ConvertError> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConvertError::Config("no backend base address is set".into()))
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms.max(10);
        self
    }

    pub fn max_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.max_poll_interval_ms = ms.max(10);
        self
    }

    pub fn max_wait_secs(mut self, secs: u64) -> Self {
        self.config.max_wait_secs = secs.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs.max(1);
        self
    }

    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    pub fn initial_stage_label(mut self, label: impl Into<String>) -> Self {
        self.config.initial_stage_label = label.into();
        self
    }

    pub fn options(mut self, options: ConversionOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn quality(mut self, quality: OutputQuality) -> Self {
        self.config.options.quality = quality;
        self
    }

    pub fn language(mut self, language: DocumentLanguage) -> Self {
        self.config.options.language = language;
        self
    }

    pub fn preserve_layout(mut self, v: bool) -> Self {
        self.config.options.preserve_layout = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ConverterConfig, ConvertError> {
        let c = &mut self.config;
        if c.max_poll_interval_ms < c.poll_interval_ms {
            c.max_poll_interval_ms = c.poll_interval_ms;
        }
        if c.initial_stage_label.trim().is_empty() {
            return Err(ConvertError::Config(
                "initial stage label must not be empty".into(),
            ));
        }
        if let Some(url) = &c.base_url {
            if !url.trim().is_empty() {
                crate::client::normalize_base_url(url)?;
            }
        }
        Ok(self.config)
    }
}

// ── Conversion options ───────────────────────────────────────────────────

/// Settings sent to the backend alongside the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub quality: OutputQuality,
    pub language: DocumentLanguage,
    /// Ask the backend to keep the original layout (experimental). Default: true.
    pub preserve_layout: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            quality: OutputQuality::default(),
            language: DocumentLanguage::default(),
            preserve_layout: true,
        }
    }
}

impl ConversionOptions {
    /// `(field, value)` pairs for the upload form.
    pub fn form_fields(&self) -> [(&'static str, &'static str); 3] {
        [
            ("quality", self.quality.as_str()),
            ("language", self.language.as_str()),
            (
                "preserve_layout",
                if self.preserve_layout { "true" } else { "false" },
            ),
        ]
    }
}

/// Accuracy/speed trade-off requested from the OCR backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputQuality {
    /// Lower accuracy, fastest turnaround.
    Fast,
    /// Recommended. (default)
    #[default]
    Balanced,
    /// Slower, most accurate.
    Best,
}

impl OutputQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputQuality::Fast => "fast",
            OutputQuality::Balanced => "balanced",
            OutputQuality::Best => "best",
        }
    }
}

/// Language hint for text recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentLanguage {
    /// Let the backend detect the language. (default)
    #[default]
    Auto,
    En,
    Es,
    Fr,
    De,
    Zh,
}

impl DocumentLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentLanguage::Auto => "auto",
            DocumentLanguage::En => "en",
            DocumentLanguage::Es => "es",
            DocumentLanguage::Fr => "fr",
            DocumentLanguage::De => "de",
            DocumentLanguage::Zh => "zh",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConverterConfig::default();
        assert_eq!(c.base_url, None);
        assert_eq!(c.poll_interval_ms, 1000);
        assert_eq!(c.max_wait_secs, 600);
        assert_eq!(c.max_file_size_bytes, 50 * 1024 * 1024);
        assert_eq!(c.options.quality, OutputQuality::Balanced);
        assert!(c.options.preserve_layout);
    }

    #[test]
    fn builder_clamps_intervals() {
        let c = ConverterConfig::builder()
            .poll_interval_ms(0)
            .max_wait_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.poll_interval_ms, 10);
        assert_eq!(c.max_wait_secs, 1);
    }

    #[test]
    fn backoff_cap_never_below_interval() {
        let c = ConverterConfig::builder()
            .poll_interval_ms(8000)
            .max_poll_interval_ms(100)
            .build()
            .unwrap();
        assert_eq!(c.max_poll_interval_ms, 8000);
    }

    #[test]
    fn missing_base_url_is_config_error() {
        let c = ConverterConfig::default();
        assert!(matches!(c.require_base_url(), Err(ConvertError::Config(_))));
    }

    #[test]
    fn invalid_base_url_rejected_at_build() {
        let err = ConverterConfig::builder()
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn empty_stage_label_rejected() {
        assert!(ConverterConfig::builder()
            .initial_stage_label("  ")
            .build()
            .is_err());
    }

    #[test]
    fn option_form_fields() {
        let opts = ConversionOptions {
            quality: OutputQuality::Best,
            language: DocumentLanguage::Fr,
            preserve_layout: false,
        };
        assert_eq!(
            opts.form_fields(),
            [
                ("quality", "best"),
                ("language", "fr"),
                ("preserve_layout", "false")
            ]
        );
    }
}
