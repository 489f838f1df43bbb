//! Orchestrator tests with in-process collaborators.
//!
//! No browser, model or network is involved; the fakes in `common` stand in
//! for all four external services.

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use vibelink::{
    AnalysisError, AspectProfile, BrandFont, BrandPlacement, CaptureError, GenerationError,
    PipelineConfig, Stage, StageFailure, UploadError,
};

#[tokio::test]
async fn musinsa_run_produces_poster_url_and_summary() {
    let root = tempfile::tempdir().unwrap();
    let capture = FakeCapture::with_text("무신사 스토어 - 온라인 패션 편집숍");
    let vision = FakeVision::replying(MUSINSA_REPLY);
    let generator = FakeGenerator::new();
    let host = FakeHost::returning("https://i.ibb.co/abc/poster.png");

    let p = pipeline(
        config_in(root.path()),
        capture.clone(),
        vision.clone(),
        generator.clone(),
        host.clone(),
    );
    let result = p.run("musinsa.com").await.unwrap();

    assert_eq!(result.poster_url, "https://i.ibb.co/abc/poster.png");
    assert_eq!(result.summary, "MUSINSA: Korean streetwear marketplace");

    let seen = capture.seen_url.lock().unwrap().clone().unwrap();
    assert_eq!(seen.as_str(), "https://musinsa.com/");

    let analysis_prompt = vision.seen_prompt.lock().unwrap().clone().unwrap();
    assert!(analysis_prompt.contains("무신사 스토어"));
    assert_eq!(*vision.screenshot_existed.lock().unwrap(), Some(true));

    let prompt = generator.seen_prompt.lock().unwrap().clone().unwrap();
    let brand = prompt.instruction.find("MUSINSA").expect("brand in prompt");
    let hoodie = prompt.instruction.find("hoodie").expect("hoodie in prompt");
    let sneaker = prompt.instruction.find("sneaker").expect("sneaker in prompt");
    assert!(brand < hoodie && hoodie < sneaker, "{}", prompt.instruction);
    assert_eq!(
        prompt.generation_params,
        AspectProfile::Vertical.generation_params()
    );

    assert_eq!(*host.uploaded_png.lock().unwrap(), Some(true));
    assert_eq!(entries(root.path()), 0, "workspace must be removed");
}

#[tokio::test]
async fn square_aspect_reaches_the_generator() {
    let root = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .temp_root(root.path())
        .aspect(AspectProfile::Square)
        .build()
        .unwrap();
    let generator = FakeGenerator::new();
    let p = pipeline(
        config,
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        generator.clone(),
        FakeHost::returning("https://i.ibb.co/x.png"),
    );
    p.run("https://musinsa.com").await.unwrap();

    let params = generator.seen_prompt.lock().unwrap().clone().unwrap().generation_params;
    assert_eq!((params.width, params.height), (1024, 1024));
}

#[tokio::test]
async fn capture_failure_is_tagged_and_cleaned_up() {
    let root = tempfile::tempdir().unwrap();
    let vision = FakeVision::replying(MUSINSA_REPLY);
    let p = pipeline(
        config_in(root.path()),
        FakeCapture::new(CaptureBehavior::DnsFailure),
        vision.clone(),
        FakeGenerator::new(),
        FakeHost::returning("unused"),
    );

    let err = p.run("nope.invalid").await.unwrap_err();
    assert_eq!(err.stage, Stage::Capture);
    assert!(matches!(
        err.cause,
        StageFailure::Capture(CaptureError::DnsResolution { .. })
    ));
    assert!(vision.seen_prompt.lock().unwrap().is_none(), "analysis must not run");
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn invalid_url_fails_in_capture() {
    let root = tempfile::tempdir().unwrap();
    let capture = FakeCapture::with_text("");
    let p = pipeline(
        config_in(root.path()),
        capture.clone(),
        FakeVision::replying(MUSINSA_REPLY),
        FakeGenerator::new(),
        FakeHost::returning("unused"),
    );

    let err = p.run("ftp://example.com").await.unwrap_err();
    assert_eq!(err.stage, Stage::Capture);
    assert!(matches!(
        err.cause,
        StageFailure::Capture(CaptureError::InvalidUrl { .. })
    ));
    assert!(capture.seen_url.lock().unwrap().is_none());
}

#[tokio::test]
async fn unparseable_reply_fails_in_analysis() {
    let root = tempfile::tempdir().unwrap();
    let generator = FakeGenerator::new();
    let p = pipeline(
        config_in(root.path()),
        FakeCapture::with_text("hello"),
        FakeVision::replying("I cannot analyse this page, sorry."),
        generator.clone(),
        FakeHost::returning("unused"),
    );

    let err = p.run("example.com").await.unwrap_err();
    assert_eq!(err.stage, Stage::Analysis);
    assert!(matches!(
        err.cause,
        StageFailure::Analysis(AnalysisError::Parse(_))
    ));
    assert!(generator.seen_prompt.lock().unwrap().is_none());
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn rejected_upload_fails_in_upload() {
    let root = tempfile::tempdir().unwrap();
    let p = pipeline(
        config_in(root.path()),
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        FakeGenerator::new(),
        FakeHost::rejecting("Invalid API v1 key."),
    );

    let err = p.run("musinsa.com").await.unwrap_err();
    assert_eq!(err.stage, Stage::Upload);
    match &err.cause {
        StageFailure::Upload(UploadError::Rejected { detail }) => {
            assert_eq!(detail, "Invalid API v1 key.")
        }
        other => panic!("unexpected cause: {other:?}"),
    }
    assert!(err.to_string().starts_with("upload failed"));
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test(start_paused = true)]
async fn hung_capture_hits_stage_timeout() {
    let root = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .temp_root(root.path())
        .capture_timeout_secs(5)
        .build()
        .unwrap();
    let p = pipeline(
        config,
        FakeCapture::new(CaptureBehavior::Hang),
        FakeVision::replying(MUSINSA_REPLY),
        FakeGenerator::new(),
        FakeHost::returning("unused"),
    );

    let err = p.run("example.com").await.unwrap_err();
    assert_eq!(err.stage, Stage::Capture);
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "capture failed: timed out after 5s");
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn observer_sees_stages_in_order() {
    let root = tempfile::tempdir().unwrap();
    let observer = Arc::new(RecordingObserver::default());
    let config = PipelineConfig::builder()
        .temp_root(root.path())
        .observer(observer.clone())
        .build()
        .unwrap();
    let p = pipeline(
        config,
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        FakeGenerator::new(),
        FakeHost::returning("https://i.ibb.co/x.png"),
    );
    p.run("musinsa.com").await.unwrap();

    assert_eq!(
        observer.events(),
        [
            "run_start",
            "start:capture",
            "done:capture",
            "start:analysis",
            "done:analysis",
            "start:generation",
            "done:generation",
            "start:upload",
            "done:upload",
            "run_complete",
        ]
    );
}

#[tokio::test]
async fn observer_sees_failing_stage() {
    let root = tempfile::tempdir().unwrap();
    let observer = Arc::new(RecordingObserver::default());
    let config = PipelineConfig::builder()
        .temp_root(root.path())
        .observer(observer.clone())
        .build()
        .unwrap();
    let p = pipeline(
        config,
        FakeCapture::with_text(""),
        FakeVision::replying("no json here"),
        FakeGenerator::new(),
        FakeHost::returning("unused"),
    );
    p.run("musinsa.com").await.unwrap_err();

    assert_eq!(
        observer.events(),
        [
            "run_start",
            "start:capture",
            "done:capture",
            "start:analysis",
            "error:analysis",
        ]
    );
}

#[tokio::test]
async fn concurrent_runs_use_separate_workspaces() {
    let root = tempfile::tempdir().unwrap();
    let p = Arc::new(pipeline(
        config_in(root.path()),
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        FakeGenerator::new(),
        FakeHost::returning("https://i.ibb.co/x.png"),
    ));

    let runs = (0..4).map(|_| {
        let p = p.clone();
        tokio::spawn(async move { p.run("musinsa.com").await })
    });
    for handle in runs.collect::<Vec<_>>() {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn generation_failure_is_tagged_and_cleaned_up() {
    let root = tempfile::tempdir().unwrap();
    let host = FakeHost::returning("unused");
    let p = pipeline(
        config_in(root.path()),
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        FakeGenerator::with(GeneratorBehavior::ApiError, Duration::ZERO),
        host.clone(),
    );

    let err = p.run("musinsa.com").await.unwrap_err();
    assert_eq!(err.stage, Stage::Generation);
    assert!(matches!(
        err.cause,
        StageFailure::Generation(GenerationError::Api { status: 503, .. })
    ));
    assert!(host.uploaded_png.lock().unwrap().is_none(), "upload must not run");
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn undecodable_generated_bytes_fail_in_generation() {
    let root = tempfile::tempdir().unwrap();
    let p = pipeline(
        config_in(root.path()),
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        FakeGenerator::with(
            GeneratorBehavior::Bytes(b"<html>rate limited</html>".to_vec()),
            Duration::ZERO,
        ),
        FakeHost::returning("unused"),
    );

    let err = p.run("musinsa.com").await.unwrap_err();
    assert_eq!(err.stage, Stage::Generation);
    assert!(matches!(
        err.cause,
        StageFailure::Generation(GenerationError::Image(_))
    ));
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn welcome_text_with_single_color_reply() {
    let root = tempfile::tempdir().unwrap();
    let vision = FakeVision::replying(
        r##"{"brand_name":"MUSINSA","color_palette":{"primary":"#000000","secondary":[]},"key_objects":["hoodie","sneaker"]}"##,
    );
    let generator = FakeGenerator::new();
    let p = pipeline(
        config_in(root.path()),
        FakeCapture::with_text("Welcome to MUSINSA. Shop streetwear."),
        vision.clone(),
        generator.clone(),
        FakeHost::returning("https://i.ibb.co/m/poster.png"),
    );

    let result = p.run("musinsa.com").await.unwrap();
    assert_eq!(result.summary, "MUSINSA");

    let analysis_prompt = vision.seen_prompt.lock().unwrap().clone().unwrap();
    assert!(analysis_prompt.contains("Welcome to MUSINSA. Shop streetwear."));

    let prompt = generator.seen_prompt.lock().unwrap().clone().unwrap();
    let brand = prompt.instruction.find("MUSINSA").expect("brand in prompt");
    let hoodie = prompt.instruction.find("hoodie").expect("hoodie in prompt");
    let sneaker = prompt.instruction.find("sneaker").expect("sneaker in prompt");
    assert!(brand < hoodie && hoodie < sneaker, "{}", prompt.instruction);
    assert!(prompt.instruction.contains("dominant"), "{}", prompt.instruction);
    assert_eq!(
        prompt.generation_params,
        AspectProfile::Vertical.generation_params()
    );
    assert_eq!(entries(root.path()), 0);
}

const DARK: [u8; 3] = [10, 10, 10];

fn placement_config(root: &std::path::Path, placement: BrandPlacement) -> PipelineConfig {
    PipelineConfig::builder()
        .temp_root(root)
        .brand_placement(placement)
        .build()
        .unwrap()
}

fn dark_generator() -> Arc<FakeGenerator> {
    FakeGenerator::with(
        GeneratorBehavior::Bytes(solid_png(256, 256, DARK)),
        Duration::ZERO,
    )
}

/// Rows of the uploaded poster that differ from the generated colour.
fn changed_rows(host: &FakeHost) -> Vec<u32> {
    let bytes = host.uploaded.lock().unwrap().clone().expect("uploaded bytes");
    let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
    (0..img.height())
        .filter(|&y| (0..img.width()).any(|x| img.get_pixel(x, y).0 != DARK))
        .collect()
}

#[tokio::test]
async fn text_free_poster_gets_brand_overlay() {
    // Needs a system font; hosts without one have nothing to render with.
    let Some(font) = BrandFont::discover() else {
        return;
    };
    let root = tempfile::tempdir().unwrap();
    let host = FakeHost::returning("https://i.ibb.co/t/poster.png");
    let p = pipeline(
        placement_config(root.path(), BrandPlacement::TextFree),
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        dark_generator(),
        host.clone(),
    )
    .with_brand_font(font);

    p.run("musinsa.com").await.unwrap();

    let rows = changed_rows(&host);
    assert!(!rows.is_empty(), "overlay must mark the poster");
    assert!(rows.iter().all(|&y| y < 64), "overlay outside the top band: {rows:?}");
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn hero_typography_poster_is_uploaded_as_generated() {
    let root = tempfile::tempdir().unwrap();
    let host = FakeHost::returning("https://i.ibb.co/h/poster.png");
    let mut p = pipeline(
        placement_config(root.path(), BrandPlacement::HeroTypography),
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        dark_generator(),
        host.clone(),
    );
    if let Some(font) = BrandFont::discover() {
        p = p.with_brand_font(font);
    }

    p.run("musinsa.com").await.unwrap();
    assert!(changed_rows(&host).is_empty());
}

#[tokio::test]
async fn text_free_without_font_is_uploaded_as_generated() {
    let root = tempfile::tempdir().unwrap();
    let host = FakeHost::returning("https://i.ibb.co/n/poster.png");
    let p = pipeline(
        placement_config(root.path(), BrandPlacement::TextFree),
        FakeCapture::with_text(""),
        FakeVision::replying(MUSINSA_REPLY),
        dark_generator(),
        host.clone(),
    );

    let result = p.run("musinsa.com").await.unwrap();
    assert_eq!(result.poster_url, "https://i.ibb.co/n/poster.png");
    assert!(changed_rows(&host).is_empty());
}
