//! Observer trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::PipelineConfigBuilder::observer`] to receive events as
//! the pipeline moves through capture, analysis, generation and upload.
//! The CLI uses this to drive its spinner; a server could forward the same
//! events to a log sink or a WebSocket without the library knowing.
//!
//! # Example
//!
//! ```rust
//! use vibelink::{PipelineConfig, PipelineObserver, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct StageLog(Mutex<Vec<Stage>>);
//!
//! impl PipelineObserver for StageLog {
//!     fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .observer(Arc::new(StageLog::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the orchestrator around each stage of a run.
///
/// Implementations must be `Send + Sync`: one observer is shared by every
/// request the server handles concurrently. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Called once per run, before capture starts.
    fn on_run_start(&self, url: &str) {
        let _ = url;
    }

    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails. No further stage starts afterwards.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once per successful run with the hosted poster URL.
    fn on_run_complete(&self, poster_url: &str, total_ms: u64) {
        let _ = (poster_url, total_ms);
    }
}

/// Used when no observer is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// How [`crate::config::PipelineConfig`] stores its observer.
pub type SharedObserver = Arc<dyn PipelineObserver>;
