//! Analysis entry points: upload → normalized PNG → model report.
//!
//! [`Analyzer`] owns the provider handle. Build it once at start-up and reuse
//! it for every upload; nothing else is shared between requests.
//!
//! ```text
//! UploadedFile ──▶ normalize (blocking pool) ──▶ base64 ImageData ──▶ VLM ──▶ AnalysisReport
//! ```

use crate::config::{AnalysisConfig, DEFAULT_MODEL};
use crate::error::MedImgError;
use crate::output::{AnalysisReport, ImageSummary};
use crate::pipeline::input::{self, UploadedFile};
use crate::pipeline::normalize::{self, NormalizedImage};
use crate::pipeline::{encode, llm};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Long-lived handle pairing a vision provider with its configuration.
///
/// # Example
/// ```rust,no_run
/// use medimg_dx::{AnalysisConfig, Analyzer, UploadedFile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
/// let analyzer = Analyzer::new(AnalysisConfig::default())?;
/// let upload = UploadedFile::from_path("chest.dcm")?;
/// let report = analyzer.analyze(upload).await?;
/// println!("{}", report.markdown);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Analyzer {
    provider: Arc<dyn LLMProvider>,
    config: AnalysisConfig,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("config", &self.config)
            .finish()
    }
}

impl Analyzer {
    /// Resolve the provider described by `config` and keep it for reuse.
    pub fn new(config: AnalysisConfig) -> Result<Self, MedImgError> {
        let provider = resolve_provider(&config)?;
        info!(
            "Using provider '{}' with model '{}'",
            provider.name(),
            provider.model()
        );
        Ok(Self { provider, config })
    }

    /// Use an already-constructed provider.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: AnalysisConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Normalize one upload and ask the model for a report.
    ///
    /// The upload is consumed; its bytes are dropped once the PNG exists.
    pub async fn analyze(&self, upload: UploadedFile) -> Result<AnalysisReport, MedImgError> {
        let start = Instant::now();
        let name = upload.name().to_string();
        info!("Analyzing '{}'", name);

        let normalized = normalize_blocking(upload).await?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_file_start(&name);
        }

        let image = encode::image_data(normalized.encoded_bytes(), &self.config.image_detail);
        let report = llm::request_report(&self.provider, &name, image, &self.config).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "'{}' analyzed in {}ms ({} chars of report)",
            name,
            duration_ms,
            report.markdown.len()
        );

        Ok(AnalysisReport {
            name,
            source_kind: normalized.source_kind(),
            width: normalized.width(),
            height: normalized.height(),
            png_bytes: normalized.encoded_bytes().len(),
            markdown: report.markdown,
            input_tokens: report.input_tokens,
            output_tokens: report.output_tokens,
            duration_ms,
        })
    }

    /// Resolve a local path or HTTP(S) URL and analyze it.
    pub async fn analyze_input(
        &self,
        input_str: impl AsRef<str>,
    ) -> Result<AnalysisReport, MedImgError> {
        let upload =
            input::resolve_input(input_str.as_ref(), self.config.download_timeout_secs).await?;
        self.analyze(upload).await
    }
}

/// Synchronous wrapper around [`Analyzer::analyze_input`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, MedImgError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| MedImgError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    let analyzer = Analyzer::new(config.clone())?;
    runtime.block_on(analyzer.analyze_input(input_str))
}

/// Normalize a path or URL without calling the model.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    download_timeout_secs: u64,
) -> Result<ImageSummary, MedImgError> {
    let upload = input::resolve_input(input_str.as_ref(), download_timeout_secs).await?;
    let name = upload.name().to_string();
    let normalized = normalize_blocking(upload).await?;
    Ok(ImageSummary {
        name,
        source_kind: normalized.source_kind(),
        width: normalized.width(),
        height: normalized.height(),
        png_bytes: normalized.encoded_bytes().len(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Decode and re-encode off the async worker threads.
async fn normalize_blocking(upload: UploadedFile) -> Result<NormalizedImage, MedImgError> {
    tokio::task::spawn_blocking(move || normalize::normalize(&upload))
        .await
        .map_err(|e| MedImgError::Internal(format!("Normalize task panicked: {}", e)))?
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, MedImgError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        MedImgError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    [`DEFAULT_MODEL`]; the factory reads the matching API key variable.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **`OPENAI_API_KEY`** present → OpenAI with the configured model or
///    [`DEFAULT_MODEL`].
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, MedImgError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| MedImgError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::{Cursor, Write};

    #[tokio::test]
    async fn inspect_local_png() {
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(12, 9, Rgba([1, 2, 3, 4])))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrist.png");
        std::fs::File::create(&path).unwrap().write_all(&png).unwrap();

        let summary = inspect(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(summary.name, "wrist.png");
        assert_eq!(summary.source_kind, crate::SourceKind::Standard);
        assert_eq!((summary.width, summary.height), (12, 9));
        assert!(summary.png_bytes > 0);
    }

    #[tokio::test]
    async fn inspect_missing_file() {
        let err = inspect("/definitely/not/a/real/scan.dcm", 5).await.unwrap_err();
        assert!(matches!(err, MedImgError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn normalize_blocking_propagates_decode_error() {
        let err = normalize_blocking(UploadedFile::new("bad.dcm", vec![0; 10]))
            .await
            .unwrap_err();
        assert!(err.is_decode_error());
    }
}
