//! Configuration types for the poster pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The config is constructed once at process
//! start and handed to [`crate::create::Pipeline::from_config`], which builds
//! every collaborator client from it. Nothing is read from globals later.

use crate::error::PosterError;
use crate::output::GenerationParams;
use crate::progress::SharedObserver;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the four-stage poster pipeline.
///
/// # Example
/// ```rust
/// use vibelink::{AspectProfile, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .aspect(AspectProfile::Square)
///     .context_limit(2000)
///     .hf_token("hf_xxx")
///     .imgbb_key("key")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    // ── Prompting ────────────────────────────────────────────────────────
    /// Maximum characters of page text embedded in the analysis prompt. Default: 3500.
    ///
    /// Brand-relevant copy (hero headline, tagline, navigation) sits at the top
    /// of the page; everything past the first few thousand characters is
    /// footers and legal text that only costs tokens.
    pub context_limit: usize,

    /// Poster shape and the generation parameters that go with it. Default: Vertical.
    pub aspect: AspectProfile,

    /// Whether the brand name is rendered into the image. Default: HeroTypography.
    pub brand_placement: BrandPlacement,

    /// Font for the brand-name overlay on text-free posters. Default: the
    /// first bold sans-serif found among common system font paths.
    pub overlay_font: Option<PathBuf>,

    // ── Capture ──────────────────────────────────────────────────────────
    /// Chromium/Chrome executable. Default: `chromium`.
    pub chromium_path: PathBuf,

    /// Browser viewport width in pixels. Default: 1920.
    pub viewport_width: u32,

    /// Browser viewport height in pixels. Default: 1080.
    ///
    /// Only the first screen is captured: the hero section carries the
    /// logo, the brand colours and the headline.
    pub viewport_height: u32,

    /// Navigation budget for the first attempts in seconds. Default: 10.
    pub navigation_timeout_secs: u64,

    /// Navigation budget for the final, patient attempt in seconds. Default: 25.
    pub extended_navigation_timeout_secs: u64,

    /// Orchestrator bound on the whole capture stage in seconds. Default: 90.
    pub capture_timeout_secs: u64,

    // ── Analysis ─────────────────────────────────────────────────────────
    /// Vision model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-mini".
    pub vision_model: Option<String>,

    /// Vision provider name (e.g. "gemini", "openai", "anthropic").
    pub vision_provider: Option<String>,

    /// Pre-constructed vision provider. Takes precedence over `vision_provider`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the analysis call. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens for the analysis reply. Default: 1024.
    pub max_tokens: usize,

    /// Retries on a failed vision call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Longest screenshot side sent to the vision model, in pixels. Default: 1568.
    pub max_screenshot_dim: u32,

    /// Orchestrator bound on the analysis stage in seconds. Default: 60.
    pub analysis_timeout_secs: u64,

    // ── Generation ───────────────────────────────────────────────────────
    /// Hugging Face access token.
    pub hf_token: Option<String>,

    /// Inference router base URL. Default: `https://router.huggingface.co`.
    pub hf_base_url: String,

    /// Text-to-image model. Default: `black-forest-labs/FLUX.1-schnell`.
    pub image_model: String,

    /// Orchestrator bound on the generation stage in seconds. Default: 120.
    pub generation_timeout_secs: u64,

    // ── Upload ───────────────────────────────────────────────────────────
    /// ImgBB API key.
    pub imgbb_key: Option<String>,

    /// ImgBB base URL. Default: `https://api.imgbb.com`.
    pub imgbb_base_url: String,

    /// Auto-delete uploaded posters after this many seconds. Default: never.
    pub upload_expiration_secs: Option<u64>,

    /// Orchestrator bound on the upload stage in seconds. Default: 30.
    pub upload_timeout_secs: u64,

    // ── Misc ─────────────────────────────────────────────────────────────
    /// Parent directory for request workspaces. Default: the system temp dir.
    pub temp_root: Option<PathBuf>,

    /// Receives stage start/complete/error events.
    pub observer: Option<SharedObserver>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_limit: 3500,
            aspect: AspectProfile::default(),
            brand_placement: BrandPlacement::default(),
            overlay_font: None,
            chromium_path: PathBuf::from("chromium"),
            viewport_width: 1920,
            viewport_height: 1080,
            navigation_timeout_secs: 10,
            extended_navigation_timeout_secs: 25,
            capture_timeout_secs: 90,
            vision_model: None,
            vision_provider: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_screenshot_dim: 1568,
            analysis_timeout_secs: 60,
            hf_token: None,
            hf_base_url: "https://router.huggingface.co".to_string(),
            image_model: "black-forest-labs/FLUX.1-schnell".to_string(),
            generation_timeout_secs: 120,
            imgbb_key: None,
            imgbb_base_url: "https://api.imgbb.com".to_string(),
            upload_expiration_secs: None,
            upload_timeout_secs: 30,
            temp_root: None,
            observer: None,
        }
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("context_limit", &self.context_limit)
            .field("aspect", &self.aspect)
            .field("brand_placement", &self.brand_placement)
            .field("overlay_font", &self.overlay_font)
            .field("chromium_path", &self.chromium_path)
            .field("viewport", &(self.viewport_width, self.viewport_height))
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field(
                "extended_navigation_timeout_secs",
                &self.extended_navigation_timeout_secs,
            )
            .field("capture_timeout_secs", &self.capture_timeout_secs)
            .field("vision_model", &self.vision_model)
            .field("vision_provider", &self.vision_provider)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("analysis_timeout_secs", &self.analysis_timeout_secs)
            .field("hf_token", &redact(&self.hf_token))
            .field("hf_base_url", &self.hf_base_url)
            .field("image_model", &self.image_model)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .field("imgbb_key", &redact(&self.imgbb_key))
            .field("imgbb_base_url", &self.imgbb_base_url)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("temp_root", &self.temp_root)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn context_limit(mut self, chars: usize) -> Self {
        self.config.context_limit = chars;
        self
    }

    pub fn aspect(mut self, aspect: AspectProfile) -> Self {
        self.config.aspect = aspect;
        self
    }

    pub fn brand_placement(mut self, placement: BrandPlacement) -> Self {
        self.config.brand_placement = placement;
        self
    }

    pub fn overlay_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.overlay_font = Some(path.into());
        self
    }

    pub fn chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chromium_path = path.into();
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs;
        self
    }

    pub fn extended_navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extended_navigation_timeout_secs = secs;
        self
    }

    pub fn capture_timeout_secs(mut self, secs: u64) -> Self {
        self.config.capture_timeout_secs = secs;
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn vision_provider(mut self, name: impl Into<String>) -> Self {
        self.config.vision_provider = Some(name.into());
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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_screenshot_dim(mut self, px: u32) -> Self {
        self.config.max_screenshot_dim = px.max(256);
        self
    }

    pub fn analysis_timeout_secs(mut self, secs: u64) -> Self {
        self.config.analysis_timeout_secs = secs;
        self
    }

    pub fn hf_token(mut self, token: impl Into<String>) -> Self {
        self.config.hf_token = Some(token.into());
        self
    }

    pub fn hf_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.hf_base_url = url.into();
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.config.image_model = model.into();
        self
    }

    pub fn generation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation_timeout_secs = secs;
        self
    }

    pub fn imgbb_key(mut self, key: impl Into<String>) -> Self {
        self.config.imgbb_key = Some(key.into());
        self
    }

    pub fn imgbb_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.imgbb_base_url = url.into();
        self
    }

    pub fn upload_expiration_secs(mut self, secs: u64) -> Self {
        self.config.upload_expiration_secs = Some(secs);
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(dir.into());
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PosterError> {
        let c = &self.config;
        if c.context_limit == 0 {
            return Err(PosterError::InvalidConfig(
                "Context limit must be ≥ 1 character".into(),
            ));
        }
        if c.viewport_width < 320 || c.viewport_height < 240 {
            return Err(PosterError::InvalidConfig(format!(
                "Viewport must be at least 320×240, got {}×{}",
                c.viewport_width, c.viewport_height
            )));
        }
        let timeouts = [
            ("navigation", c.navigation_timeout_secs),
            ("extended navigation", c.extended_navigation_timeout_secs),
            ("capture", c.capture_timeout_secs),
            ("analysis", c.analysis_timeout_secs),
            ("generation", c.generation_timeout_secs),
            ("upload", c.upload_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(PosterError::InvalidConfig(format!(
                "The {name} timeout must be ≥ 1 second"
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Poster shape. Generation parameters follow from the profile, never from
/// the analysis record.
///
/// | Profile | Size | Use |
/// |---------|------|-----|
/// | `Square` | 1024×1024 | social feeds, thumbnails |
/// | `Vertical` | 768×1344 | phone wallpapers, story formats (default) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectProfile {
    Square,
    #[default]
    Vertical,
}

impl AspectProfile {
    /// FLUX.1-schnell is distilled for 1–4 steps and ignores guidance.
    pub fn generation_params(self) -> GenerationParams {
        let (width, height) = match self {
            AspectProfile::Square => (1024, 1024),
            AspectProfile::Vertical => (768, 1344),
        };
        GenerationParams {
            width,
            height,
            steps: 4,
            guidance_scale: 0.0,
        }
    }

    /// Ratio label used in the composition line of the instruction.
    pub fn ratio_label(self) -> &'static str {
        match self {
            AspectProfile::Square => "1:1",
            AspectProfile::Vertical => "9:16",
        }
    }
}

/// How the brand name reaches the final poster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrandPlacement {
    /// The image model renders the brand name as centred 3D hero typography.
    /// Exclusions reject garbled or misspelled lettering but permit legible text. (default)
    #[default]
    HeroTypography,
    /// The image shows the business scene only with every kind of text
    /// excluded; the brand name is overlaid afterwards with a system font.
    TextFree,
}
