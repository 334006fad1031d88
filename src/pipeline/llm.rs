//! VLM interaction: build the vision request and call the provider.
//!
//! The request is always two messages: a system message (persona) and a
//! user message carrying the diagnosis instructions plus the PNG attachment.
//! The reply is treated as opaque Markdown and returned untouched.
//!
//! There is no retry loop. A failed call surfaces once as
//! [`MedImgError::InferenceFailed`] and the caller decides what to do.

use crate::config::AnalysisConfig;
use crate::error::MedImgError;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, DIAGNOSIS_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Raw model output for one image.
#[derive(Debug, Clone)]
pub struct ReportText {
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Send one image to the model and return its report.
pub async fn request_report(
    provider: &Arc<dyn LLMProvider>,
    name: &str,
    image_data: ImageData,
    config: &AnalysisConfig,
) -> Result<ReportText, MedImgError> {
    let start = Instant::now();
    let messages = build_messages(image_data, config);
    let options = build_options(config);

    let call = provider.chat(&messages, Some(&options));
    let result = match config.api_timeout_secs {
        Some(secs) => timeout(Duration::from_secs(secs), call).await.map_err(|_| {
            warn!("'{}': model call timed out after {}s", name, secs);
            MedImgError::InferenceTimeout { secs }
        })?,
        None => call.await,
    };

    match result {
        Ok(response) => {
            debug!(
                "'{}': {} input tokens, {} output tokens, {:?}",
                name,
                response.prompt_tokens,
                response.completion_tokens,
                start.elapsed()
            );
            Ok(ReportText {
                markdown: response.content,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
            })
        }
        Err(e) => {
            warn!("'{}': model call failed — {}", name, e);
            Err(MedImgError::InferenceFailed {
                message: e.to_string(),
            })
        }
    }
}

/// System persona + user turn with instructions and the image.
pub fn build_messages(image_data: ImageData, config: &AnalysisConfig) -> Vec<ChatMessage> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let instructions = config.instructions.as_deref().unwrap_or(DIAGNOSIS_PROMPT);

    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(instructions, vec![image_data]),
    ]
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
