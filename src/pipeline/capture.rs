//! Screenshot capture: URL → first-screen PNG + visible page text.
//!
//! [`ChromiumCapture`] drives a headless Chromium binary as a child process.
//! Each attempt runs two short-lived browsers: one `--screenshot` run for the
//! hero section, one `--dump-dom` run for the text. Chromium's own
//! `--timeout` stops loading after the navigation budget and proceeds with
//! whatever DOM is present, so slow third-party assets do not fail a capture.
//!
//! ## Attempt plan
//!
//! Only DNS failures and navigation timeouts are worth retrying:
//!
//! 1. the URL as given, base budget
//! 2. the `www.` variant, base budget (domain hosts without `www.` only)
//! 3. the URL as given, extended budget

use crate::error::CaptureError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Desktop Chrome user agent; many sites serve a stripped page to headless UAs.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Extra wall-clock time granted to the browser process beyond its
/// navigation budget (startup, rendering, writing the PNG).
const PROCESS_GRACE_SECS: u64 = 15;

/// Output of a successful capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPage {
    /// PNG of the first screen, inside the request workspace.
    pub screenshot: PathBuf,
    /// Visible page text, whitespace-collapsed. May be empty.
    pub text: String,
}

/// Renders a page and reports what a visitor would see first.
#[async_trait]
pub trait Capture: Send + Sync {
    /// Write a PNG of `url` to `screenshot` and return it with the page text.
    async fn capture(&self, url: &Url, screenshot: &Path) -> Result<CapturedPage, CaptureError>;
}

// ── URL handling ─────────────────────────────────────────────────────────────

/// Parse user input into an http(s) URL, prepending `https://` when no
/// scheme is given.
pub fn normalize_url(input: &str) -> Result<Url, CaptureError> {
    let trimmed = input.trim();
    let invalid = |reason: &str| CaptureError::InvalidUrl {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("URL is empty"));
    }

    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs are supported"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("URL has no host"));
    }
    Ok(url)
}

/// True when `input` starts with `scheme://`. A `://` later in the path or
/// query (`shop.com/login?next=https://...`) does not count.
fn has_scheme(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// The same URL with a `www.` host, for bare domain names only.
pub fn www_variant(url: &Url) -> Option<Url> {
    let host = url.domain()?;
    if host.starts_with("www.") || !host.contains('.') {
        return None;
    }
    let mut variant = url.clone();
    variant.set_host(Some(&format!("www.{host}"))).ok()?;
    Some(variant)
}

/// One navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub url: Url,
    pub timeout_secs: u64,
}

/// Ordered attempts for `url`; see the module docs.
pub fn attempt_plan(url: &Url, base_secs: u64, extended_secs: u64) -> Vec<Attempt> {
    let mut plan = vec![Attempt {
        url: url.clone(),
        timeout_secs: base_secs,
    }];
    if let Some(www) = www_variant(url) {
        plan.push(Attempt {
            url: www,
            timeout_secs: base_secs,
        });
    }
    plan.push(Attempt {
        url: url.clone(),
        timeout_secs: extended_secs,
    });
    plan
}

// ── Chromium ─────────────────────────────────────────────────────────────────

/// Headless Chromium driven as a child process.
#[derive(Debug, Clone)]
pub struct ChromiumCapture {
    pub binary: PathBuf,
    pub viewport: (u32, u32),
    pub navigation_timeout_secs: u64,
    pub extended_navigation_timeout_secs: u64,
    pub user_agent: String,
}

impl ChromiumCapture {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            viewport: (1920, 1080),
            navigation_timeout_secs: 10,
            extended_navigation_timeout_secs: 25,
            user_agent: DESKTOP_USER_AGENT.to_string(),
        }
    }

    pub fn from_config(config: &crate::config::PipelineConfig) -> Self {
        Self {
            binary: config.chromium_path.clone(),
            viewport: (config.viewport_width, config.viewport_height),
            navigation_timeout_secs: config.navigation_timeout_secs,
            extended_navigation_timeout_secs: config.extended_navigation_timeout_secs,
            user_agent: DESKTOP_USER_AGENT.to_string(),
        }
    }

    fn base_args(&self, timeout_secs: u64) -> Vec<String> {
        vec![
            "--headless=new".into(),
            "--disable-gpu".into(),
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
            "--hide-scrollbars".into(),
            "--mute-audio".into(),
            "--disable-blink-features=AutomationControlled".into(),
            format!("--window-size={},{}", self.viewport.0, self.viewport.1),
            format!("--user-agent={}", self.user_agent),
            format!("--timeout={}", timeout_secs * 1000),
        ]
    }

    async fn run_browser(
        &self,
        args: Vec<String>,
        url: &Url,
        timeout_secs: u64,
    ) -> Result<std::process::Output, CaptureError> {
        let child = Command::new(&self.binary)
            .args(args)
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let wall = Duration::from_secs(timeout_secs + PROCESS_GRACE_SECS);
        match tokio::time::timeout(wall, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(CaptureError::BrowserLaunch {
                binary: self.binary.display().to_string(),
                source,
            }),
            Err(_) => Err(CaptureError::NavigationTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }),
        }
    }

    async fn screenshot_once(
        &self,
        attempt: &Attempt,
        screenshot: &Path,
    ) -> Result<(), CaptureError> {
        // A PNG left over from an earlier attempt must not count as success.
        let _ = tokio::fs::remove_file(screenshot).await;

        let mut args = self.base_args(attempt.timeout_secs);
        args.push(format!("--screenshot={}", screenshot.display()));
        let output = self
            .run_browser(args, &attempt.url, attempt.timeout_secs)
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Some(err) = classify_stderr(&stderr, &attempt.url, attempt.timeout_secs) {
            return Err(err);
        }

        match tokio::fs::metadata(screenshot).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(CaptureError::NavigationFailed {
                url: attempt.url.to_string(),
                detail: last_line(&stderr)
                    .map(String::from)
                    .unwrap_or_else(|| format!("no screenshot written ({})", output.status)),
            }),
        }
    }

    /// Text failures degrade to an empty string; the screenshot alone is
    /// enough for analysis.
    async fn visible_text(&self, attempt: &Attempt) -> String {
        let mut args = self.base_args(attempt.timeout_secs);
        args.push("--dump-dom".into());
        match self
            .run_browser(args, &attempt.url, attempt.timeout_secs)
            .await
        {
            Ok(output) if output.status.success() => {
                html_to_text(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!("DOM dump for {} exited with {}", attempt.url, output.status);
                String::new()
            }
            Err(e) => {
                warn!("DOM dump for {} failed: {}", attempt.url, e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl Capture for ChromiumCapture {
    async fn capture(&self, url: &Url, screenshot: &Path) -> Result<CapturedPage, CaptureError> {
        let plan = attempt_plan(
            url,
            self.navigation_timeout_secs,
            self.extended_navigation_timeout_secs,
        );
        let total = plan.len();
        let mut last_err = None;

        for (i, attempt) in plan.iter().enumerate() {
            debug!(
                "Capture attempt {}/{}: {} ({}s)",
                i + 1,
                total,
                attempt.url,
                attempt.timeout_secs
            );
            match self.screenshot_once(attempt, screenshot).await {
                Ok(()) => {
                    let text = self.visible_text(attempt).await;
                    info!(
                        "Captured {} ({} chars of text)",
                        attempt.url,
                        text.chars().count()
                    );
                    return Ok(CapturedPage {
                        screenshot: screenshot.to_path_buf(),
                        text,
                    });
                }
                Err(e) if e.is_retryable() => {
                    warn!("Capture attempt {}/{} failed: {}", i + 1, total, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| CaptureError::NavigationFailed {
            url: url.to_string(),
            detail: "no capture attempts were made".into(),
        }))
    }
}

/// Map Chromium's network error codes to capture errors.
pub fn classify_stderr(stderr: &str, url: &Url, timeout_secs: u64) -> Option<CaptureError> {
    if stderr.contains("ERR_NAME_NOT_RESOLVED") {
        return Some(CaptureError::DnsResolution {
            host: url.host_str().unwrap_or_default().to_string(),
        });
    }
    if stderr.contains("ERR_TIMED_OUT") || stderr.contains("ERR_CONNECTION_TIMED_OUT") {
        return Some(CaptureError::NavigationTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        });
    }
    None
}

fn last_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

// ── DOM → text ───────────────────────────────────────────────────────────────

static RE_INVISIBLE_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>|<template\b.*?</template>|<!--.*?-->").unwrap()
});

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

/// Approximate `innerText` from serialized DOM.
pub fn html_to_text(html: &str) -> String {
    let visible = RE_INVISIBLE_BLOCKS.replace_all(html, " ");
    let mut text = RE_TAGS.replace_all(&visible, " ").into_owned();
    for (entity, plain) in ENTITIES {
        text = text.replace(entity, plain);
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
