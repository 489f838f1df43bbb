//! Pipeline orchestration: URL in, hosted poster URL out.
//!
//! [`Pipeline::run`] executes the four stages strictly in order. Every
//! stage runs under its own bounded timeout; any failure, including an
//! elapsed timeout, ends the run with a [`PipelineError`] tagged with the
//! stage. There is no partial success.
//!
//! With [`BrandPlacement::TextFree`] the brand name is overlaid onto the
//! generated image before it is stored, still inside the generation stage.
//!
//! Temporary files live in a per-run [`Workspace`] that is removed when
//! `run` returns or when its future is dropped.

use crate::config::{BrandPlacement, PipelineConfig};
use crate::error::{AnalysisError, GenerationError, PipelineError, PosterError, Stage, StageFailure};
use crate::output::PipelineResult;
use crate::pipeline::capture::{normalize_url, Capture, ChromiumCapture};
use crate::pipeline::generate::{HuggingFaceGenerator, ImageGenerator};
use crate::pipeline::overlay::{apply_brand_overlay, BrandFont};
use crate::pipeline::parse::parse_structured_response;
use crate::pipeline::synthesize::synthesize;
use crate::pipeline::upload::{ImageHost, ImgbbHost};
use crate::pipeline::vision::{LlmVision, VisionModel};
use crate::progress::{NoopObserver, PipelineObserver};
use crate::prompts::{build_analysis_prompt, truncate_context};
use crate::workspace::Workspace;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The assembled pipeline: configuration plus one client per collaborator.
///
/// Build it once at startup and share it (`Arc<Pipeline>`); runs do not
/// share any mutable state.
pub struct Pipeline {
    config: PipelineConfig,
    capture: Arc<dyn Capture>,
    vision: Arc<dyn VisionModel>,
    generator: Arc<dyn ImageGenerator>,
    host: Arc<dyn ImageHost>,
    brand_font: Option<Arc<BrandFont>>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        capture: Arc<dyn Capture>,
        vision: Arc<dyn VisionModel>,
        generator: Arc<dyn ImageGenerator>,
        host: Arc<dyn ImageHost>,
    ) -> Self {
        Self {
            config,
            capture,
            vision,
            generator,
            host,
            brand_font: None,
        }
    }

    /// Font for the brand overlay on text-free posters. Without one those
    /// posters are uploaded as generated.
    pub fn with_brand_font(mut self, font: BrandFont) -> Self {
        self.brand_font = Some(Arc::new(font));
        self
    }

    /// Build the default collaborators (Chromium, `edgequake-llm`,
    /// Hugging Face, ImgBB) from the configuration.
    ///
    /// # Errors
    /// [`PosterError::MissingCredential`] when the HF token or ImgBB key is
    /// absent, [`PosterError::ProviderNotConfigured`] when no vision provider
    /// resolves, [`PosterError::InvalidConfig`] when a configured overlay font
    /// does not load.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PosterError> {
        let hf_token = config
            .hf_token
            .clone()
            .ok_or(PosterError::MissingCredential { name: "HF_TOKEN" })?;
        let imgbb_key = config
            .imgbb_key
            .clone()
            .ok_or(PosterError::MissingCredential { name: "IMGBB_KEY" })?;

        let brand_font = match config.brand_placement {
            BrandPlacement::TextFree => BrandFont::resolve(config.overlay_font.as_deref())?,
            BrandPlacement::HeroTypography => None,
        };

        let capture = ChromiumCapture::from_config(&config);
        let vision = LlmVision::from_config(&config)?;
        let generator = HuggingFaceGenerator::with_base_url(
            &hf_token,
            &config.image_model,
            &config.hf_base_url,
            config.generation_timeout_secs,
        )?;
        let host = ImgbbHost::with_base_url(
            &imgbb_key,
            &config.imgbb_base_url,
            config.upload_timeout_secs,
        )?
        .with_expiration(config.upload_expiration_secs);

        let pipeline = Self::new(
            config,
            Arc::new(capture),
            Arc::new(vision),
            Arc::new(generator),
            Arc::new(host),
        );
        Ok(match brand_font {
            Some(font) => pipeline.with_brand_font(font),
            None => pipeline,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn observer(&self) -> &dyn PipelineObserver {
        self.config.observer.as_deref().unwrap_or(&NoopObserver)
    }

    /// Turn a website URL into a hosted poster.
    ///
    /// # Errors
    /// A [`PipelineError`] naming the first stage that failed.
    pub async fn run(&self, url: &str) -> Result<PipelineResult, PipelineError> {
        let start = Instant::now();
        info!("Starting poster run: {}", url);
        self.observer().on_run_start(url);

        let result = self.run_stages(url).await;

        let total_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(done) => {
                info!("Poster ready in {}ms: {}", total_ms, done.poster_url);
                self.observer().on_run_complete(&done.poster_url, total_ms);
            }
            Err(e) => warn!("Poster run failed after {}ms: {}", total_ms, e),
        }
        result
    }

    async fn run_stages(&self, url: &str) -> Result<PipelineResult, PipelineError> {
        let config = &self.config;
        let workspace = Workspace::create(config.temp_root.as_deref())
            .map_err(|e| PipelineError::new(Stage::Capture, e))?;
        let screenshot_path = workspace.screenshot_path();

        // ── Stage 1: Capture ─────────────────────────────────────────────
        let page = self
            .stage(Stage::Capture, config.capture_timeout(), async {
                let target = normalize_url(url)?;
                self.capture.capture(&target, &screenshot_path).await
            })
            .await?;
        debug!("Captured {} chars of page text", page.text.chars().count());

        // ── Stage 2: Analysis ────────────────────────────────────────────
        let analysis = self
            .stage(Stage::Analysis, config.analysis_timeout(), async {
                let context = truncate_context(&page.text, config.context_limit);
                let prompt = build_analysis_prompt(&context);
                let reply = self.vision.analyze(&page.screenshot, &prompt).await?;
                Ok::<_, AnalysisError>(parse_structured_response(&reply)?)
            })
            .await;
        workspace.discard_screenshot().await;
        let record = analysis?;
        info!("Analysis: {}", record.summary());

        // ── Stage 3: Generation ──────────────────────────────────────────
        let prompt = synthesize(&record, config.aspect, config.brand_placement);
        debug!("Poster instruction: {}", prompt.instruction);
        let poster_path = workspace.poster_path();
        let overlay = self.overlay_for(record.brand_name.as_deref());
        self.stage(Stage::Generation, config.generation_timeout(), async {
            let bytes = self.generator.generate(&prompt).await?;
            let dest = poster_path.clone();
            tokio::task::spawn_blocking(move || store_poster(&bytes, &dest, overlay))
                .await
                .map_err(std::io::Error::other)??;
            Ok::<_, StageFailure>(())
        })
        .await?;

        // ── Stage 4: Upload ──────────────────────────────────────────────
        let poster_url = self
            .stage(
                Stage::Upload,
                config.upload_timeout(),
                self.host.upload(&poster_path),
            )
            .await?;

        Ok(PipelineResult {
            poster_url,
            summary: record.summary(),
        })
    }

    /// Font and brand name to overlay, when this run needs one.
    fn overlay_for(&self, brand: Option<&str>) -> Option<(Arc<BrandFont>, String)> {
        if self.config.brand_placement != BrandPlacement::TextFree {
            return None;
        }
        let brand = brand.map(str::trim).filter(|b| !b.is_empty())?;
        let font = self.brand_font.clone()?;
        Some((font, brand.to_string()))
    }

    /// Run one stage under its timeout, reporting to the observer.
    async fn stage<T, E, Fut>(
        &self,
        stage: Stage,
        budget: Duration,
        work: Fut,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<StageFailure>,
    {
        let start = Instant::now();
        debug!("Stage {} started", stage);
        self.observer().on_stage_start(stage);

        let outcome = match tokio::time::timeout(budget, work).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(PipelineError::new(stage, e)),
            Err(_) => Err(PipelineError::new(
                stage,
                StageFailure::TimedOut {
                    secs: budget.as_secs(),
                },
            )),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => {
                info!("Stage {} completed in {}ms", stage, elapsed_ms);
                self.observer().on_stage_complete(stage, elapsed_ms);
            }
            Err(e) => {
                warn!("Stage {} failed after {}ms: {}", stage, elapsed_ms, e.cause);
                self.observer().on_stage_error(stage, &e.cause.to_string());
            }
        }
        outcome
    }
}

/// Decode whatever the image model returned, apply the brand overlay if
/// given, and store the result as PNG.
fn store_poster(
    bytes: &[u8],
    dest: &Path,
    overlay: Option<(Arc<BrandFont>, String)>,
) -> Result<(), GenerationError> {
    let img = image::load_from_memory(bytes)?;
    match overlay {
        Some((font, brand)) => {
            let mut rgb = img.to_rgb8();
            apply_brand_overlay(&mut rgb, &brand, &font);
            rgb.save_with_format(dest, image::ImageFormat::Png)?;
        }
        None => img.save_with_format(dest, image::ImageFormat::Png)?,
    }
    Ok(())
}

/// Build a pipeline from `config` and run it once.
///
/// Convenience for one-off use; servers should build a [`Pipeline`] once
/// and call [`Pipeline::run`] per request.
pub async fn create_poster(
    url: impl AsRef<str>,
    config: PipelineConfig,
) -> Result<PipelineResult, PosterError> {
    let pipeline = Pipeline::from_config(config)?;
    Ok(pipeline.run(url.as_ref()).await?)
}
