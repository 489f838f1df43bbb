//! Vision analysis: screenshot + prompt → raw model reply.
//!
//! The reply is returned as text; turning it into an
//! [`crate::output::AnalysisRecord`] is [`crate::pipeline::parse`]'s job, so
//! this module only deals with transport, retries and provider selection.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 from vision APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) with 500 ms base and 2 retries waits
//! 500 ms → 1 s before giving up.

use crate::config::PipelineConfig;
use crate::error::{AnalysisError, PosterError};
use crate::pipeline::encode::encode_screenshot;
use crate::prompts::ANALYSIS_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Model used when Gemini is picked up from `GEMINI_API_KEY`.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Looks at a screenshot and answers the analysis prompt.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn analyze(&self, screenshot: &Path, prompt: &str) -> Result<String, AnalysisError>;
}

/// [`VisionModel`] backed by any `edgequake-llm` provider.
pub struct LlmVision {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    max_screenshot_dim: u32,
}

impl LlmVision {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            max_screenshot_dim: config.max_screenshot_dim,
        }
    }

    /// Resolve a provider from the config and environment, then wrap it.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PosterError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }
}

#[async_trait]
impl VisionModel for LlmVision {
    async fn analyze(&self, screenshot: &Path, prompt: &str) -> Result<String, AnalysisError> {
        let start = Instant::now();

        let path = screenshot.to_path_buf();
        let max_dim = self.max_screenshot_dim;
        let image = tokio::task::spawn_blocking(move || encode_screenshot(&path, max_dim))
            .await
            .map_err(|e| AnalysisError::Encode(format!("encoder task failed: {e}")))?
            .map_err(|e| AnalysisError::Encode(e.to_string()))?;

        let messages = &build_messages(prompt, image);
        let options = &self.options;
        let provider = &self.provider;
        let retries = self.max_retries;

        let content = with_retries(retries, self.retry_backoff_ms, || async move {
            let response = provider
                .chat(messages, Some(options))
                .await
                .map_err(|e| AnalysisError::Model {
                    retries,
                    detail: e.to_string(),
                })?;
            debug!(
                "Vision reply: {} input tokens, {} output tokens",
                response.prompt_tokens, response.completion_tokens
            );
            if response.content.trim().is_empty() {
                return Err(AnalysisError::EmptyResponse);
            }
            Ok(response.content)
        })
        .await?;

        debug!("Vision analysis took {:?}", start.elapsed());
        Ok(content)
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// System prompt, then one user turn carrying the prompt and the screenshot.
pub fn build_messages(prompt: &str, image: ImageData) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
        ChatMessage::user_with_images(prompt, vec![image]),
    ]
}

/// Run `op` up to `max_retries + 1` times with exponential backoff,
/// returning the first success or the last error.
pub async fn with_retries<T, E, F, Fut>(max_retries: u32, backoff_ms: u64, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut result = op().await;
    for attempt in 1..=max_retries {
        let Err(ref e) = result else { break };
        let backoff = backoff_delay(backoff_ms, attempt);
        warn!(
            "Vision attempt {} failed: {}; retry {}/{} after {:?}",
            attempt, e, attempt, max_retries, backoff
        );
        sleep(backoff).await;
        result = op().await;
    }
    result
}

/// `backoff_ms * 2^(retry - 1)`, saturating instead of overflowing.
fn backoff_delay(backoff_ms: u64, retry: u32) -> Duration {
    let factor = 2u64.saturating_pow(retry.saturating_sub(1));
    Duration::from_millis(backoff_ms.saturating_mul(factor))
}

// ── Provider resolution ──────────────────────────────────────────────────────

/// Default model for a named provider when none is configured.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "gemini" => DEFAULT_GEMINI_MODEL,
        "anthropic" => "claude-3-5-sonnet-latest",
        "ollama" => "llava",
        _ => "gpt-4.1-mini",
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PosterError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PosterError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.vision_provider`) with `config.vision_model`
///    or the provider's default model.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **Gemini** when `GEMINI_API_KEY` is set.
/// 5. **Auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PosterError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.vision_provider {
        let model = config
            .vision_model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        return create_vision_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        non_empty_env("EDGEQUAKE_LLM_PROVIDER"),
        non_empty_env("EDGEQUAKE_MODEL"),
    ) {
        return create_vision_provider(&prov, &model);
    }

    if non_empty_env("GEMINI_API_KEY").is_some() {
        let model = config.vision_model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_vision_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PosterError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_models() {
        assert_eq!(default_model_for("gemini"), "gemini-2.0-flash");
        assert_eq!(default_model_for("openai"), "gpt-4.1-mini");
    }

    #[test]
    fn messages_are_system_then_user() {
        let image = ImageData::new("aGVsbG8=", "image/png");
        assert_eq!(build_messages("analyze", image).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retries(2, 500, || async move {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err("503".to_string()),
                _ => Ok("reply"),
            }
        })
        .await;
        assert_eq!(result, Ok("reply"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), String> = with_retries(1, 10, || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Err(format!("failure {n}"))
        })
        .await;
        assert_eq!(result, Err("failure 1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_one_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let _ = with_retries::<(), String, _, _>(0, 10, || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("x".to_string())
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn options_follow_config() {
        let opts = build_options(&PipelineConfig::default());
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(1024));
    }
}
