//! CLI binary for vibelink.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `create` runs one pipeline from the terminal. Both map their flags onto
//! `PipelineConfig`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vibelink::server::{build_app, ServerSettings};
use vibelink::{
    AspectProfile, BrandPlacement, Pipeline, PipelineConfig, PipelineObserver, SharedObserver, Stage,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Spinner on stderr with one log line per finished stage.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Capture => "Opening the site in headless Chromium…",
        Stage::Analysis => "Reading the brand with the vision model…",
        Stage::Generation => "Painting the poster…",
        Stage::Upload => "Publishing the poster…",
    }
}

impl PipelineObserver for CliObserver {
    fn on_run_start(&self, url: &str) {
        self.bar.set_message(url.to_string());
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.as_str());
        self.bar.set_message(stage_message(stage));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10}  {}",
            green("✓"),
            stage.as_str(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg: String = if error.chars().count() > 100 {
            error.chars().take(99).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {:<10}  {}", red("✗"), stage.as_str(), red(&msg)));
        self.bar.finish_and_clear();
    }

    fn on_run_complete(&self, _poster_url: &str, total_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} poster ready in {}",
            green("✔"),
            bold(&format!("{:.1}s", total_ms as f64 / 1000.0))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 8000
  vibelink serve --bind 127.0.0.1:9000

  # One poster from the terminal
  vibelink create musinsa.com

  # Square poster, scene only with the brand name overlaid afterwards, JSON result
  vibelink create https://www.notion.so --aspect square --placement text-free --json

ENVIRONMENT VARIABLES:
  HF_TOKEN                Hugging Face token for FLUX.1-schnell (required)
  IMGBB_KEY               ImgBB API key (required)
  GEMINI_API_KEY          Google Gemini key; used for analysis when no provider is set
  OPENAI_API_KEY          OpenAI key (auto-detected)
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  VIBELINK_CHROMIUM       Chromium/Chrome executable
  VIBELINK_OVERLAY_FONT   Font for the text-free brand overlay
  RUST_LOG                Log filter (overrides --verbose/--quiet)

A `.env` file in the working directory is loaded on startup.
"#;

/// Turn website URLs into brand vibe posters.
#[derive(Parser, Debug)]
#[command(
    name = "vibelink",
    version,
    about = "Turn website URLs into generated brand vibe posters",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "VIBELINK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "VIBELINK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Generate one poster and print its URL.
    Create(CreateArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "VIBELINK_BIND", default_value = "0.0.0.0:8000")]
    bind: String,

    /// Allowed CORS origin (repeatable, or comma-separated). `*` allows any.
    #[arg(long = "allowed-origin", env = "VIBELINK_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// Maximum concurrent poster requests.
    #[arg(long, env = "VIBELINK_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Website URL; `https://` is assumed when no scheme is given.
    url: String,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "VIBELINK_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Hugging Face access token.
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    hf_token: Option<String>,

    /// ImgBB API key.
    #[arg(long, env = "IMGBB_KEY", hide_env_values = true)]
    imgbb_key: Option<String>,

    /// Vision provider: gemini, openai, anthropic, ollama.
    #[arg(long, env = "VIBELINK_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "VIBELINK_MODEL")]
    model: Option<String>,

    /// Poster shape.
    #[arg(long, env = "VIBELINK_ASPECT", value_enum, default_value = "vertical")]
    aspect: AspectArg,

    /// Render the brand name into the image, or leave the image text-free.
    #[arg(long, env = "VIBELINK_PLACEMENT", value_enum, default_value = "hero-typography")]
    placement: PlacementArg,

    /// TrueType/OpenType font for the brand overlay on text-free posters.
    #[arg(long, env = "VIBELINK_OVERLAY_FONT")]
    overlay_font: Option<PathBuf>,

    /// Chromium/Chrome executable.
    #[arg(long, env = "VIBELINK_CHROMIUM", default_value = "chromium")]
    chromium: PathBuf,

    /// Characters of page text sent to the vision model.
    #[arg(long, env = "VIBELINK_CONTEXT_LIMIT", default_value_t = 3500)]
    context_limit: usize,

    /// Navigation budget for the first attempts, in seconds.
    #[arg(long, env = "VIBELINK_NAVIGATION_TIMEOUT", default_value_t = 10)]
    navigation_timeout: u64,

    /// Navigation budget for the final attempt, in seconds.
    #[arg(long, env = "VIBELINK_EXTENDED_NAVIGATION_TIMEOUT", default_value_t = 25)]
    extended_navigation_timeout: u64,

    /// Capture stage timeout in seconds.
    #[arg(long, env = "VIBELINK_CAPTURE_TIMEOUT", default_value_t = 90)]
    capture_timeout: u64,

    /// Analysis stage timeout in seconds.
    #[arg(long, env = "VIBELINK_ANALYSIS_TIMEOUT", default_value_t = 60)]
    analysis_timeout: u64,

    /// Generation stage timeout in seconds.
    #[arg(long, env = "VIBELINK_GENERATION_TIMEOUT", default_value_t = 120)]
    generation_timeout: u64,

    /// Upload stage timeout in seconds.
    #[arg(long, env = "VIBELINK_UPLOAD_TIMEOUT", default_value_t = 30)]
    upload_timeout: u64,

    /// Vision temperature (0.0–2.0).
    #[arg(long, env = "VIBELINK_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max vision output tokens.
    #[arg(long, env = "VIBELINK_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Retries on vision failure.
    #[arg(long, env = "VIBELINK_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Text-to-image model on the Hugging Face router.
    #[arg(long, env = "VIBELINK_IMAGE_MODEL", default_value = "black-forest-labs/FLUX.1-schnell")]
    image_model: String,

    /// Hugging Face router base URL.
    #[arg(long, env = "VIBELINK_HF_BASE_URL", default_value = "https://router.huggingface.co")]
    hf_base_url: String,

    /// ImgBB API base URL.
    #[arg(long, env = "VIBELINK_IMGBB_BASE_URL", default_value = "https://api.imgbb.com")]
    imgbb_base_url: String,

    /// Delete uploaded posters after this many seconds.
    #[arg(long, env = "VIBELINK_UPLOAD_EXPIRATION")]
    upload_expiration: Option<u64>,

    /// Parent directory for per-request scratch directories.
    #[arg(long, env = "VIBELINK_TEMP_DIR")]
    temp_dir: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum AspectArg {
    Square,
    Vertical,
}

impl From<AspectArg> for AspectProfile {
    fn from(v: AspectArg) -> Self {
        match v {
            AspectArg::Square => AspectProfile::Square,
            AspectArg::Vertical => AspectProfile::Vertical,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PlacementArg {
    HeroTypography,
    TextFree,
}

impl From<PlacementArg> for BrandPlacement {
    fn from(v: PlacementArg) -> Self {
        match v {
            PlacementArg::HeroTypography => BrandPlacement::HeroTypography,
            PlacementArg::TextFree => BrandPlacement::TextFree,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // A one-shot `create` with the spinner keeps library INFO logs quiet;
    // the spinner already shows every stage.
    let spinner = match &cli.command {
        Command::Create(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Create(args) => create(args, spinner).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = build_config(&args.pipeline, None)?;
    let pipeline = Arc::new(Pipeline::from_config(config).context("Failed to initialise pipeline")?);

    let settings = ServerSettings {
        allowed_origins: args.allowed_origins,
        max_concurrent: args.max_concurrent,
    };
    let app = build_app(pipeline, &settings);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    tracing::info!("vibelink listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn create(args: CreateArgs, spinner: bool) -> Result<()> {
    let observer: Option<SharedObserver> = if spinner {
        Some(CliObserver::new() as SharedObserver)
    } else {
        None
    };
    let config = build_config(&args.pipeline, observer)?;
    let pipeline = Pipeline::from_config(config).context("Failed to initialise pipeline")?;

    let result = pipeline
        .run(&args.url)
        .await
        .context("Poster generation failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else {
        println!("{}", result.poster_url);
        eprintln!("{}", dim(&result.summary));
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(
    args: &PipelineArgs,
    observer: Option<SharedObserver>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .aspect(args.aspect.into())
        .brand_placement(args.placement.into())
        .chromium_path(&args.chromium)
        .context_limit(args.context_limit)
        .navigation_timeout_secs(args.navigation_timeout)
        .extended_navigation_timeout_secs(args.extended_navigation_timeout)
        .capture_timeout_secs(args.capture_timeout)
        .analysis_timeout_secs(args.analysis_timeout)
        .generation_timeout_secs(args.generation_timeout)
        .upload_timeout_secs(args.upload_timeout)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_retries(args.max_retries)
        .image_model(&args.image_model)
        .hf_base_url(&args.hf_base_url)
        .imgbb_base_url(&args.imgbb_base_url);

    if let Some(ref token) = args.hf_token {
        builder = builder.hf_token(token);
    }
    if let Some(ref key) = args.imgbb_key {
        builder = builder.imgbb_key(key);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.vision_provider(provider);
    }
    if let Some(ref model) = args.model {
        builder = builder.vision_model(model);
    }
    if let Some(secs) = args.upload_expiration {
        builder = builder.upload_expiration_secs(secs);
    }
    if let Some(ref font) = args.overlay_font {
        builder = builder.overlay_font(font);
    }
    if let Some(ref dir) = args.temp_dir {
        builder = builder.temp_root(dir);
    }
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }

    builder.build().context("Invalid configuration")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
