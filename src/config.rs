//! Configuration for image analysis.
//!
//! Everything the analysis pipeline can be tuned with lives in
//! [`AnalysisConfig`], built via [`AnalysisConfigBuilder`]. Normalization has
//! no knobs; these settings only shape the model request and batch
//! behaviour.

use crate::error::MedImgError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when OpenAI is selected without an explicit model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for analyzing medical images with a vision model.
///
/// # Example
/// ```rust
/// use medimg_dx::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gpt-4o")
///     .max_tokens(1500)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// LLM model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, [`DEFAULT_MODEL`] is used for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is detected from the
    /// environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per report. Default: 2048.
    ///
    /// The six-section report usually needs 600–1 200 tokens.
    pub max_tokens: usize,

    /// Custom system message. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Custom instructions sent with the image. If None, uses
    /// [`crate::prompts::DIAGNOSIS_PROMPT`].
    pub instructions: Option<String>,

    /// Image detail hint forwarded to the provider. Default: "high".
    pub image_detail: String,

    /// Uploads analyzed at once by [`crate::stream::analyze_stream`]. Default: 4.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Per-call timeout for the model request. Default: none (wait for the
    /// provider's own timeout).
    pub api_timeout_secs: Option<u64>,

    /// Optional per-upload progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            system_prompt: None,
            instructions: None,
            image_detail: "high".to_string(),
            concurrency: 4,
            download_timeout_secs: 60,
            api_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|s| s.len()))
            .field("instructions", &self.instructions.as_ref().map(|s| s.len()))
            .field("image_detail", &self.image_detail)
            .field("concurrency", &self.concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn instructions(mut self, prompt: impl Into<String>) -> Self {
        self.config.instructions = Some(prompt.into());
        self
    }

    pub fn image_detail(mut self, detail: impl Into<String>) -> Self {
        self.config.image_detail = detail.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, MedImgError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(MedImgError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(MedImgError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if !matches!(c.image_detail.as_str(), "high" | "low" | "auto") {
            return Err(MedImgError::InvalidConfig(format!(
                "image_detail must be high, low or auto, got '{}'",
                c.image_detail
            )));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(MedImgError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
