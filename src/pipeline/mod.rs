//! Pipeline stages for URL-to-poster generation.
//!
//! Each submodule implements exactly one step. The four external
//! collaborators sit behind traits ([`capture::Capture`],
//! [`vision::VisionModel`], [`generate::ImageGenerator`],
//! [`upload::ImageHost`]) so the orchestrator can be exercised with fakes.
//!
//! ## Data Flow
//!
//! ```text
//! URL ──▶ capture ──▶ encode ──▶ vision ──▶ parse ──▶ synthesize ──▶ generate ──▶ overlay ──▶ upload
//!        (chromium)  (base64)   (VLM)     (JSON)    (prompt)       (FLUX)       (text-free)  (ImgBB)
//! ```
//!
//! 1. [`capture`]    — first-screen screenshot + visible text, with host and
//!    timeout fallbacks
//! 2. [`encode`]     — downscale and base64-wrap the screenshot
//! 3. [`vision`]     — vision model call with retry/backoff
//! 4. [`parse`]      — recover a JSON object from the free-form reply
//! 5. [`synthesize`] — deterministic analysis → image prompt expansion, with
//!    [`palette`] turning hex codes into colour names
//! 6. [`generate`]   — text-to-image call
//! 7. [`overlay`]    — brand name stamped onto text-free posters
//! 8. [`upload`]     — publish the poster and return its URL

pub mod capture;
pub mod encode;
pub mod generate;
pub mod overlay;
pub mod palette;
pub mod parse;
pub mod synthesize;
pub mod upload;
pub mod vision;
