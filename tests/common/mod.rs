//! In-process fakes for the four pipeline collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::Url;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vibelink::{
    AnalysisError, Capture, CaptureError, CapturedPage, GenerationError, ImageGenerator,
    ImageHost, Pipeline, PipelineConfig, PipelineObserver, PosterPrompt, Stage, UploadError,
    VisionModel,
};

pub const MUSINSA_REPLY: &str = r##"Here is the analysis:
```json
{
  "brand_name": "MUSINSA",
  "what_it_provides": "Korean streetwear marketplace",
  "scene_description": "a neon-lit Seoul street at night",
  "color_palette": {"primary": "#000000", "secondary": ["#FFFFFF"]},
  "mood": "urban and bold",
  "key_objects": ["hoodie", "sneaker"]
}
```"##;

/// A small valid PNG.
pub fn tiny_png() -> Vec<u8> {
    solid_png(4, 4, [10, 20, 30])
}

/// A single-colour PNG.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

// ── Capture ──────────────────────────────────────────────────────────────────

pub enum CaptureBehavior {
    Succeed { text: String },
    DnsFailure,
    Hang,
}

pub struct FakeCapture {
    behavior: CaptureBehavior,
    pub seen_url: Mutex<Option<Url>>,
}

impl FakeCapture {
    pub fn new(behavior: CaptureBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            seen_url: Mutex::new(None),
        })
    }

    pub fn with_text(text: &str) -> Arc<Self> {
        Self::new(CaptureBehavior::Succeed {
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl Capture for FakeCapture {
    async fn capture(&self, url: &Url, screenshot: &Path) -> Result<CapturedPage, CaptureError> {
        *self.seen_url.lock().unwrap() = Some(url.clone());
        match &self.behavior {
            CaptureBehavior::Succeed { text } => {
                tokio::fs::write(screenshot, tiny_png()).await.unwrap();
                Ok(CapturedPage {
                    screenshot: screenshot.to_path_buf(),
                    text: text.clone(),
                })
            }
            CaptureBehavior::DnsFailure => Err(CaptureError::DnsResolution {
                host: url.host_str().unwrap_or_default().to_string(),
            }),
            CaptureBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("capture should have been cancelled")
            }
        }
    }
}

// ── Vision ───────────────────────────────────────────────────────────────────

pub struct FakeVision {
    reply: String,
    pub seen_prompt: Mutex<Option<String>>,
    pub screenshot_existed: Mutex<Option<bool>>,
}

impl FakeVision {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            seen_prompt: Mutex::new(None),
            screenshot_existed: Mutex::new(None),
        })
    }
}

#[async_trait]
impl VisionModel for FakeVision {
    async fn analyze(&self, screenshot: &Path, prompt: &str) -> Result<String, AnalysisError> {
        *self.seen_prompt.lock().unwrap() = Some(prompt.to_string());
        *self.screenshot_existed.lock().unwrap() = Some(screenshot.exists());
        Ok(self.reply.clone())
    }
}

// ── Generation ───────────────────────────────────────────────────────────────

pub enum GeneratorBehavior {
    Png,
    ApiError,
    Bytes(Vec<u8>),
}

pub struct FakeGenerator {
    behavior: GeneratorBehavior,
    delay: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub seen_prompt: Mutex<Option<PosterPrompt>>,
}

impl FakeGenerator {
    pub fn new() -> Arc<Self> {
        Self::with(GeneratorBehavior::Png, Duration::ZERO)
    }

    pub fn with(behavior: GeneratorBehavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            seen_prompt: Mutex::new(None),
        })
    }

    /// Succeeds after `delay`, recording how many calls overlapped.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::with(GeneratorBehavior::Png, delay)
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, prompt: &PosterPrompt) -> Result<Vec<u8>, GenerationError> {
        *self.seen_prompt.lock().unwrap() = Some(prompt.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.behavior {
            GeneratorBehavior::Png => Ok(tiny_png()),
            GeneratorBehavior::ApiError => Err(GenerationError::Api {
                status: 503,
                detail: "Model is currently loading".into(),
            }),
            GeneratorBehavior::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

// ── Upload ───────────────────────────────────────────────────────────────────

pub struct FakeHost {
    outcome: Result<String, String>,
    pub uploaded_png: Mutex<Option<bool>>,
    pub uploaded: Mutex<Option<Vec<u8>>>,
}

impl FakeHost {
    pub fn returning(url: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(url.to_string()),
            uploaded_png: Mutex::new(None),
            uploaded: Mutex::new(None),
        })
    }

    pub fn rejecting(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(detail.to_string()),
            uploaded_png: Mutex::new(None),
            uploaded: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ImageHost for FakeHost {
    async fn upload(&self, poster: &Path) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(poster).await?;
        *self.uploaded_png.lock().unwrap() =
            Some(image::guess_format(&bytes).ok() == Some(ImageFormat::Png));
        *self.uploaded.lock().unwrap() = Some(bytes);
        match &self.outcome {
            Ok(url) => Ok(url.clone()),
            Err(detail) => Err(UploadError::Rejected {
                detail: detail.clone(),
            }),
        }
    }
}

// ── Observer ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_run_start(&self, _url: &str) {
        self.push("run_start".into());
    }
    fn on_stage_start(&self, stage: Stage) {
        self.push(format!("start:{stage}"));
    }
    fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
        self.push(format!("done:{stage}"));
    }
    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.push(format!("error:{stage}"));
    }
    fn on_run_complete(&self, _poster_url: &str, _total_ms: u64) {
        self.push("run_complete".into());
    }
}

// ── Assembly ─────────────────────────────────────────────────────────────────

/// Default config with scratch directories under `temp_root`.
pub fn config_in(temp_root: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .temp_root(temp_root)
        .build()
        .unwrap()
}

pub fn pipeline(
    config: PipelineConfig,
    capture: Arc<FakeCapture>,
    vision: Arc<FakeVision>,
    generator: Arc<FakeGenerator>,
    host: Arc<FakeHost>,
) -> Pipeline {
    Pipeline::new(config, capture, vision, generator, host)
}

/// Number of entries left under `dir`.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
