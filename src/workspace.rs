//! Request-scoped scratch directory.
//!
//! Every run gets its own `TempDir`; the screenshot and the re-encoded
//! poster live inside it. Dropping the [`Workspace`] removes the directory,
//! so every exit path (success, stage error, timeout, a cancelled request
//! future) leaves nothing behind.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

pub const SCREENSHOT_FILE: &str = "screenshot.png";
pub const POSTER_FILE: &str = "poster.png";

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `root`, or the system temp dir.
    pub fn create(root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vibelink-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        debug!("Workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn screenshot_path(&self) -> PathBuf {
        self.dir.path().join(SCREENSHOT_FILE)
    }

    pub fn poster_path(&self) -> PathBuf {
        self.dir.path().join(POSTER_FILE)
    }

    /// Delete the screenshot once analysis no longer needs it.
    pub async fn discard_screenshot(&self) {
        if let Err(e) = tokio::fs::remove_file(self.screenshot_path()).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Could not remove screenshot: {}", e);
            }
        }
    }
}
