//! Image hosting: local poster file → public URL.
//!
//! [`ImgbbHost`] posts the image as base64 form data to ImgBB's v1 upload
//! API. ImgBB reports failures inside the JSON envelope, sometimes with a
//! 200 status, so the body is inspected whatever the HTTP status.

use crate::error::{PosterError, UploadError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_IMGBB_BASE_URL: &str = "https://api.imgbb.com";

/// Publishes a local image and returns its public URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: &Path) -> Result<String, UploadError>;
}

/// ImgBB upload client.
pub struct ImgbbHost {
    client: Client,
    endpoint: String,
    api_key: String,
    expiration_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ImgbbEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ImgbbData>,
    #[serde(default)]
    error: Option<ImgbbErrorBody>,
    #[serde(default)]
    status_txt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImgbbData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImgbbErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl ImgbbHost {
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, PosterError> {
        Self::with_base_url(api_key, DEFAULT_IMGBB_BASE_URL, timeout_secs)
    }

    /// Client for any base URL (wiremock in tests).
    pub fn with_base_url(
        api_key: &str,
        base_url: &str,
        timeout_secs: u64,
    ) -> Result<Self, PosterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vibelink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PosterError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/1/upload", base_url.trim_end_matches('/')),
            api_key: api_key.to_owned(),
            expiration_secs: None,
        })
    }

    /// Ask ImgBB to delete the image after `secs` seconds.
    pub fn with_expiration(mut self, secs: Option<u64>) -> Self {
        self.expiration_secs = secs;
        self
    }
}

#[async_trait]
impl ImageHost for ImgbbHost {
    async fn upload(&self, image: &Path) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(image).await?;
        let encoded = STANDARD.encode(&bytes);

        let mut form = vec![("key", self.api_key.clone()), ("image", encoded)];
        if let Some(secs) = self.expiration_secs {
            form.push(("expiration", secs.to_string()));
        }

        debug!("Uploading {} bytes to {}", bytes.len(), self.endpoint);
        let response = self.client.post(&self.endpoint).form(&form).send().await?;
        let status = response.status();
        let text = response.text().await?;

        interpret_response(status.as_u16(), &text)
    }
}

/// Map an ImgBB reply to the hosted URL or an [`UploadError`].
fn interpret_response(status: u16, body: &str) -> Result<String, UploadError> {
    let envelope: ImgbbEnvelope = match serde_json::from_str(body) {
        Ok(env) => env,
        Err(e) if (200..300).contains(&status) => {
            return Err(UploadError::MalformedResponse {
                detail: format!("invalid JSON: {e}"),
            })
        }
        Err(_) => ImgbbEnvelope::default(),
    };

    if !envelope.success {
        let detail = envelope
            .error
            .and_then(|e| e.message)
            .or(envelope.status_txt)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(UploadError::Rejected { detail });
    }

    envelope
        .data
        .and_then(|d| d.url)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| UploadError::MalformedResponse {
            detail: "success response without data.url".into(),
        })
}
