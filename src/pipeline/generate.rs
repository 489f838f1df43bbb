//! Image generation: [`PosterPrompt`] → raw image bytes.
//!
//! [`HuggingFaceGenerator`] calls the Hugging Face inference router's
//! text-to-image task. FLUX.1-schnell answers with the image bytes directly;
//! errors come back as JSON with a non-2xx status.

use crate::error::{GenerationError, PosterError};
use crate::output::PosterPrompt;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HF_BASE_URL: &str = "https://router.huggingface.co";
pub const DEFAULT_IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-schnell";

/// Maximum characters of an API error body kept in [`GenerationError::Api`].
const ERROR_DETAIL_CHARS: usize = 300;

/// Turns a poster prompt into image bytes.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &PosterPrompt) -> Result<Vec<u8>, GenerationError>;
}

/// Text-to-image via the Hugging Face inference router.
pub struct HuggingFaceGenerator {
    client: Client,
    endpoint: String,
    token: String,
}

impl HuggingFaceGenerator {
    /// Client for the production router and the default FLUX model.
    pub fn new(token: &str, timeout_secs: u64) -> Result<Self, PosterError> {
        Self::with_base_url(token, DEFAULT_IMAGE_MODEL, DEFAULT_HF_BASE_URL, timeout_secs)
    }

    /// Client for any router base URL and model (wiremock in tests).
    pub fn with_base_url(
        token: &str,
        model: &str,
        base_url: &str,
        timeout_secs: u64,
    ) -> Result<Self, PosterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vibelink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PosterError::HttpClient(e.to_string()))?;

        let endpoint = format!(
            "{}/hf-inference/models/{}",
            base_url.trim_end_matches('/'),
            model.trim_matches('/')
        );

        Ok(Self {
            client,
            endpoint,
            token: token.to_owned(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceGenerator {
    async fn generate(&self, prompt: &PosterPrompt) -> Result<Vec<u8>, GenerationError> {
        let params = &prompt.generation_params;
        let body = json!({
            "inputs": prompt.instruction,
            "parameters": {
                "negative_prompt": prompt.exclusions,
                "num_inference_steps": params.steps,
                "guidance_scale": params.guidance_scale,
                "width": params.width,
                "height": params.height,
            }
        });

        debug!(
            "POST {} ({}x{}, {} steps)",
            self.endpoint, params.width, params.height, params.steps
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(ACCEPT, "image/png")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                detail: text.chars().take(ERROR_DETAIL_CHARS).collect(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let bytes = response.bytes().await?;

        if image::guess_format(&bytes).is_err() {
            return Err(GenerationError::NotAnImage {
                len: bytes.len(),
                content_type,
            });
        }

        debug!("Generated {} bytes ({})", bytes.len(), content_type);
        Ok(bytes.to_vec())
    }
}
