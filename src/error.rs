//! Error types for the vibelink library.
//!
//! Two layers of errors reflect two distinct failure modes:
//!
//! * [`PosterError`] — **Setup**: the pipeline cannot even be assembled
//!   (invalid configuration, missing API credential, no vision provider).
//!   Returned from [`crate::create::Pipeline::from_config`] and the builder.
//!   The one-shot [`crate::create::create_poster`] also folds run failures
//!   into it.
//!
//! * [`PipelineError`] — **Run**: one of the four stages failed while
//!   processing a URL. It carries the [`Stage`] tag plus the stage-specific
//!   cause. There is no partial success: any stage failure means no poster.
//!
//! Each collaborator has its own error enum ([`CaptureError`],
//! [`AnalysisError`], [`GenerationError`], [`UploadError`]) so the
//! collaborator traits stay independent of the orchestrator.

use std::fmt;
use thiserror::Error;

/// Maximum number of characters of model output carried in a [`ParseError`].
pub const PARSE_SNIPPET_CHARS: usize = 200;

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Capture,
    Analysis,
    Generation,
    Upload,
}

impl Stage {
    /// All stages in the order the orchestrator runs them.
    pub const ALL: [Stage; 4] = [
        Stage::Capture,
        Stage::Analysis,
        Stage::Generation,
        Stage::Upload,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Capture => "capture",
            Stage::Analysis => "analysis",
            Stage::Generation => "generation",
            Stage::Upload => "upload",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal setup errors.
#[derive(Debug, Error)]
pub enum PosterError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An API credential required by a default collaborator is absent.
    #[error("Missing credential {name}\nSet it in the environment or pass it explicitly.")]
    MissingCredential { name: &'static str },

    /// The vision provider could not be initialised.
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// An HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The pipeline was built but a stage failed.
    #[error(transparent)]
    Run(#[from] PipelineError),
}

/// A stage failure tagged with the stage it happened in.
///
/// This is the single error type returned by
/// [`crate::create::Pipeline::run`]; the HTTP layer renders its `Display`
/// text as the `detail` of a 500 response.
#[derive(Debug, Error)]
#[error("{stage} failed: {cause}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub cause: StageFailure,
}

impl PipelineError {
    pub fn new(stage: Stage, cause: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// The stage-level timeout that fired, if that is what failed.
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, StageFailure::TimedOut { .. })
    }
}

/// Underlying cause of a [`PipelineError`].
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The orchestrator's bounded timeout for the stage elapsed.
    #[error("timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// The request workspace could not be created or written.
    #[error("workspace I/O error: {0}")]
    Workspace(#[from] std::io::Error),
}

// ── Collaborator errors ──────────────────────────────────────────────────

/// Screenshot capture failures.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    /// DNS lookup for the host failed.
    #[error("Could not resolve host '{host}'")]
    DnsResolution { host: String },

    /// Navigation did not produce a page within the budget.
    #[error("Navigation to '{url}' timed out after {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    /// The browser ran but did not produce a screenshot.
    #[error("Navigation to '{url}' failed: {detail}")]
    NavigationFailed { url: String, detail: String },

    /// The browser binary could not be started.
    #[error("Failed to launch browser '{binary}': {source}")]
    BrowserLaunch {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    /// DNS and navigation timeouts are worth another attempt with a
    /// different host variant or a longer budget; nothing else is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CaptureError::DnsResolution { .. } | CaptureError::NavigationTimeout { .. }
        )
    }
}

/// The model reply held no recoverable JSON object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to parse model response as JSON: {snippet}")]
pub struct ParseError {
    /// At most [`PARSE_SNIPPET_CHARS`] characters of the narrowed text.
    pub snippet: String,
}

impl ParseError {
    pub fn from_text(text: &str) -> Self {
        Self {
            snippet: text.chars().take(PARSE_SNIPPET_CHARS).collect(),
        }
    }
}

/// Vision analysis failures.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The screenshot could not be read or encoded for the model.
    #[error("Failed to encode screenshot: {0}")]
    Encode(String),

    /// The provider call failed after all retries.
    #[error("Vision model call failed after {retries} retries: {detail}")]
    Model { retries: u32, detail: String },

    /// The provider returned an empty reply.
    #[error("Vision model returned an empty response")]
    EmptyResponse,
}

/// Image generation failures.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request never produced an HTTP response.
    #[error("Image generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The inference API answered with a non-success status.
    #[error("Image generation API returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    /// The response body is not a decodable image.
    #[error("Image generation returned {len} bytes that are not an image ({content_type})")]
    NotAnImage { len: usize, content_type: String },

    /// Returned bytes could not be decoded or re-encoded.
    #[error("Generated image could not be processed: {0}")]
    Image(#[from] image::ImageError),
}

/// Image hosting failures.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered `success: false`.
    #[error("Image host rejected the upload: {detail}")]
    Rejected { detail: String },

    /// The service answered success but without a usable URL.
    #[error("Image host returned an unexpected response: {detail}")]
    MalformedResponse { detail: String },

    #[error("Failed to read image for upload: {0}")]
    Io(#[from] std::io::Error),
}
