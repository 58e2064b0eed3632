// tests/challenge.rs
mod common;

use std::time::Duration;

use common::{fixture_ctx, posting, strings, RecordingNotifier, StubScraper};
use job_scout::dedup::SeenCache;
use job_scout::evasion::detect_challenge;
use job_scout::pipeline::{Pipeline, PipelineOptions};
use job_scout::relevance::RelevanceRules;
use job_scout::scrape::challenge::pass_challenge;
use job_scout::scrape::topcv::TopCvScraper;
use job_scout::scrape::{CardFilter, ScrapeError, SourceScraper};
use job_scout::surface::fixture::FixtureSurface;
use job_scout::surface::{FrameInfo, Surface};

const CHALLENGE: &str = include_str!("fixtures/challenge.html");

#[test]
fn titles_and_frames_are_recognised() {
    assert!(detect_challenge("Attention Required! | Cloudflare", &[]));
    assert!(detect_challenge("JUST A MOMENT...", &[]));
    assert!(!detect_challenge("Golang jobs | TopCV", &[]));

    let turnstile = FrameInfo {
        url: "https://challenges.cloudflare.com/cdn-cgi/challenge-platform/turnstile".into(),
        name: String::new(),
    };
    assert!(detect_challenge("Golang jobs", &[turnstile]));
    let ad = FrameInfo {
        url: "https://ads.example/frame".into(),
        name: "banner".into(),
    };
    assert!(!detect_challenge("Golang jobs", &[ad]));
}

#[tokio::test]
async fn fixture_frames_are_detected_without_title() {
    let dir = tempfile::tempdir().unwrap();
    let html = CHALLENGE.replace("Just a moment...", "TopCV");
    let surface = FixtureSurface::new().page("topcv.vn", &html);
    surface
        .goto("https://www.topcv.vn/", Duration::from_secs(1))
        .await
        .unwrap();
    let probe = surface.clone();
    let err = pass_challenge(&fixture_ctx(surface, dir.path()), "TopCV")
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Challenge { .. }));
    // One dismissal attempt per gate.
    assert_eq!(probe.clicked().len(), 1);
}

#[tokio::test]
async fn blocked_source_does_not_stop_its_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let surface = FixtureSurface::new().page("topcv.vn", CHALLENGE);
    let probe = surface.clone();
    let notifier = RecordingNotifier::default();
    let scrapers: Vec<Box<dyn SourceScraper>> = vec![
        Box::new(TopCvScraper::new(CardFilter::default())),
        StubScraper::returning(
            "TopDev",
            vec![posting("Golang Intern", "https://topdev.vn/detail-jobs/go-1", "HCM", "TopDev")],
        ),
    ];
    let pipeline = Pipeline::new(
        scrapers,
        RelevanceRules::default(),
        SeenCache::open(dir.path().join("cache")),
        Box::new(notifier.clone()),
        PipelineOptions {
            send_delay: Duration::ZERO,
            results_dir: dir.path().join("logs"),
            ..Default::default()
        },
    );

    let summary = pipeline
        .run(
            &fixture_ctx(surface, &dir.path().join("shots")),
            &strings(&["golang"]),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(summary.source_errors, 1);
    assert_eq!(notifier.sent_urls(), vec!["https://topdev.vn/detail-jobs/go-1"]);
    // Blocked on the homepage, one capture, no search pages attempted.
    assert_eq!(probe.visited(), vec!["https://www.topcv.vn/".to_string()]);
    let captures = probe.captures();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].starts_with(dir.path().join("shots")));
    assert!(captures[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("TopCV_challenge_"));
}
