//! # vibelink
//!
//! Turn a website URL into a generated brand "vibe" poster.
//!
//! ## Why this crate?
//!
//! A brand's landing page already says what the business does, which
//! colours it owns and how it wants to feel. This crate screenshots the
//! first screen, asks a vision model to distil that into a structured
//! analysis, expands the analysis into a text-to-image prompt and publishes
//! the generated poster, all behind one call.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Capture     headless Chromium screenshot + visible text (www./timeout fallbacks)
//!  ├─ 2. Analysis    vision model → JSON → AnalysisRecord (fence stripping, quote repair)
//!  ├─ 3. Generation  AnalysisRecord → poster prompt → FLUX.1-schnell
//!  │                 (text-free posters get the brand name overlaid here)
//!  └─ 4. Upload      ImgBB → public poster URL
//! ```
//!
//! Every stage runs under a bounded timeout; the first failure ends the run
//! with a [`PipelineError`] naming the stage. Temporary files are removed on
//! every exit path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vibelink::{create_poster, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Vision provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = PipelineConfig::builder()
//!         .hf_token(std::env::var("HF_TOKEN")?)
//!         .imgbb_key(std::env::var("IMGBB_KEY")?)
//!         .build()?;
//!     let result = create_poster("musinsa.com", config).await?;
//!     println!("{} → {}", result.summary, result.poster_url);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router exposing `/api/create` and `/api/health` |
//! | `cli`    | on      | the `vibelink` binary (clap + anyhow + tracing-subscriber); implies `server` |
//!
//! Disable both when using only the library:
//! ```toml
//! vibelink = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod create;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AspectProfile, BrandPlacement, PipelineConfig, PipelineConfigBuilder};
pub use create::{create_poster, Pipeline};
pub use error::{
    AnalysisError, CaptureError, GenerationError, ParseError, PipelineError, PosterError, Stage,
    StageFailure, UploadError,
};
pub use output::{AnalysisRecord, ColorPalette, GenerationParams, PipelineResult, PosterPrompt};
pub use pipeline::capture::{Capture, CapturedPage, ChromiumCapture};
pub use pipeline::generate::{HuggingFaceGenerator, ImageGenerator};
pub use pipeline::overlay::{apply_brand_overlay, BrandFont};
pub use pipeline::parse::parse_structured_response;
pub use pipeline::synthesize::synthesize;
pub use pipeline::upload::{ImageHost, ImgbbHost};
pub use pipeline::vision::{LlmVision, VisionModel};
pub use progress::{NoopObserver, PipelineObserver, SharedObserver};
pub use prompts::{build_analysis_prompt, truncate_context};
