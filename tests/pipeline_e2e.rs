// tests/pipeline_e2e.rs
mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{fixture_ctx, posting, strings, RecordingNotifier, StubScraper};
use job_scout::dedup::SeenCache;
use job_scout::evasion::StealthProfile;
use job_scout::pipeline::results::snapshot_path;
use job_scout::pipeline::{Pipeline, PipelineError, PipelineOptions, SourceErrorPolicy};
use job_scout::relevance::RelevanceRules;
use job_scout::scrape::topcv::TopCvScraper;
use job_scout::scrape::{CardFilter, ScrapeContext, ScrapeError, SourceScraper};
use job_scout::surface::fixture::FixtureSurface;

const Y: &str = "https://www.topcv.vn/viec-lam/junior-golang/1.html";
const X: &str = "https://itviec.com/it-jobs/golang-developer-2";
const Z: &str = "https://topdev.vn/detail-jobs/golang-intern-3";
const W: &str = "https://vn.linkedin.com/jobs/view/golang-engineer-4";

fn options(dir: &Path) -> PipelineOptions {
    PipelineOptions {
        send_delay: Duration::ZERO,
        results_dir: dir.join("logs"),
        ..Default::default()
    }
}

fn ctx(dir: &Path) -> ScrapeContext {
    fixture_ctx(FixtureSurface::new(), &dir.join("shots"))
}

fn two_sources() -> Vec<Box<dyn SourceScraper>> {
    vec![
        StubScraper::returning(
            "first",
            vec![
                posting("Golang Developer", &format!("{X}?lab_feature=preview"), "Singapore", "ITViec"),
                posting("Junior Golang Developer", &format!("{Y}?ta_source=list"), "Can Tho", "TopCV"),
                posting("Senior Golang Developer", "https://x.vn/senior", "HCM", "TopCV"),
            ],
        ),
        StubScraper::returning(
            "second",
            vec![
                posting("Junior Golang Developer", &format!("{Y}?utm_source=mail"), "Can Tho", "TopCV"),
                posting("Golang Engineer", W, "Remote", "LinkedIn"),
                posting("Golang Intern", Z, "HCM", "TopDev"),
            ],
        ),
    ]
}

fn pipeline(
    scrapers: Vec<Box<dyn SourceScraper>>,
    dir: &Path,
    notifier: &RecordingNotifier,
    options: PipelineOptions,
) -> Pipeline {
    Pipeline::new(
        scrapers,
        RelevanceRules::default(),
        SeenCache::open(dir.join("cache")),
        Box::new(notifier.clone()),
        options,
    )
}

#[tokio::test]
async fn unseen_postings_are_sent_ranked_deduped_and_marked_seen() {
    let dir = tempfile::tempdir().unwrap();
    SeenCache::open(dir.path().join("cache")).add(&[W]);
    let notifier = RecordingNotifier::default();
    let p = pipeline(two_sources(), dir.path(), &notifier, options(dir.path()));

    let summary = p.run(&ctx(dir.path()), &strings(&["golang"]), &[]).await.unwrap();

    // Per source: filter + rank; across sources: first occurrence wins, cache hits dropped.
    assert_eq!(notifier.sent_urls(), vec![Y, X, Z]);
    assert_eq!(summary.scraped, 6);
    assert_eq!(summary.admitted, 5);
    assert_eq!(summary.unseen, 3);
    assert_eq!(summary.notified, 3);
    assert_eq!(summary.failed_sends, 0);
    assert!(!summary.timed_out);

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent[0].match_score, Some(8));
    assert_eq!(sent[1].match_score, Some(3));

    for u in [Y, X, Z, W] {
        assert!(p.cache().is_seen(u), "{u}");
    }
    assert_eq!(p.cache().len(), 4);

    let statuses = notifier.statuses();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].contains("3 new, 3 sent"));

    let snap = summary.snapshot.expect("snapshot written");
    assert_eq!(snap, snapshot_path(&dir.path().join("logs"), Utc::now().date_naive()));
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(snap).unwrap()).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["url"], Y);
    assert_eq!(rows[0]["matchScore"], 8);
    assert_eq!(rows[0]["techStack"], "golang");
}

#[tokio::test]
async fn second_run_sends_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let first = RecordingNotifier::default();
    pipeline(two_sources(), dir.path(), &first, options(dir.path()))
        .run(&ctx(dir.path()), &strings(&["golang"]), &[])
        .await
        .unwrap();
    assert_eq!(first.sent_urls().len(), 4);

    let second = RecordingNotifier::default();
    let summary = pipeline(two_sources(), dir.path(), &second, options(dir.path()))
        .run(&ctx(dir.path()), &strings(&["golang"]), &[])
        .await
        .unwrap();
    assert!(second.sent_urls().is_empty());
    assert_eq!(summary.unseen, 0);
    assert_eq!(second.statuses().len(), 1);

    let snap = summary.snapshot.unwrap();
    assert_eq!(std::fs::read_to_string(snap).unwrap(), "[]");
}

#[tokio::test]
async fn failing_source_is_skipped_under_continue() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = RecordingNotifier::default();
    let scrapers = vec![
        StubScraper::challenged("blocked"),
        StubScraper::returning("ok", vec![posting("Golang Intern", Z, "HCM", "TopDev")]),
    ];
    let summary = pipeline(scrapers, dir.path(), &notifier, options(dir.path()))
        .run(&ctx(dir.path()), &strings(&["golang"]), &[])
        .await
        .unwrap();

    assert_eq!(summary.source_errors, 1);
    assert_eq!(notifier.sent_urls(), vec![Z]);
    assert!(notifier.statuses()[0].contains("1 source errors"));
}

#[tokio::test]
async fn failing_source_aborts_under_abort_policy() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = RecordingNotifier::default();
    let scrapers = vec![
        StubScraper::returning("ok", vec![posting("Golang Intern", Z, "HCM", "TopDev")]),
        StubScraper::challenged("blocked"),
    ];
    let opts = PipelineOptions {
        on_source_error: SourceErrorPolicy::Abort,
        ..options(dir.path())
    };
    let p = pipeline(scrapers, dir.path(), &notifier, opts);
    let err = p.run(&ctx(dir.path()), &strings(&["golang"]), &[]).await.unwrap_err();

    match err {
        PipelineError::SourceAborted { source_name, error } => {
            assert_eq!(source_name, "blocked");
            assert!(matches!(error, ScrapeError::Challenge { .. }));
        }
    }
    assert!(notifier.sent_urls().is_empty());
    assert!(notifier.statuses().is_empty());
    assert!(p.cache().is_empty());
}

#[tokio::test]
async fn postings_beyond_the_cap_stay_unseen() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = RecordingNotifier::default();
    let opts = PipelineOptions {
        max_notifications: Some(2),
        ..options(dir.path())
    };
    let p = pipeline(two_sources(), dir.path(), &notifier, opts);
    let summary = p.run(&ctx(dir.path()), &strings(&["golang"]), &[]).await.unwrap();

    assert_eq!(notifier.sent_urls(), vec![Y, X]);
    assert_eq!(summary.unseen, 4);
    assert_eq!(summary.notified, 2);
    assert!(p.cache().is_seen(Y));
    assert!(!p.cache().is_seen(W));
    assert!(!p.cache().is_seen(Z));
}

#[tokio::test]
async fn failed_sends_are_counted_and_still_marked_seen() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = RecordingNotifier::failing_on(&[X]);
    let p = pipeline(two_sources(), dir.path(), &notifier, options(dir.path()));
    let summary = p.run(&ctx(dir.path()), &strings(&["golang"]), &[]).await.unwrap();

    assert_eq!(summary.failed_sends, 1);
    assert_eq!(summary.notified, 3);
    assert_eq!(notifier.sent_urls(), vec![Y, Z, W]);
    assert!(p.cache().is_seen(X));
}

#[tokio::test]
async fn dry_run_sends_and_marks_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = RecordingNotifier::default();
    let opts = PipelineOptions {
        dry_run: true,
        ..options(dir.path())
    };
    let p = pipeline(two_sources(), dir.path(), &notifier, opts);
    let summary = p.run(&ctx(dir.path()), &strings(&["golang"]), &[]).await.unwrap();

    assert_eq!(summary.unseen, 4);
    assert_eq!(summary.notified, 0);
    assert!(notifier.sent_urls().is_empty());
    assert!(notifier.statuses().is_empty());
    assert!(p.cache().is_empty());
    assert!(summary.snapshot.unwrap().exists());
}

#[tokio::test]
async fn expired_budget_keeps_results_of_finished_sources() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = RecordingNotifier::default();
    let scrapers = vec![
        StubScraper::returning("fast", vec![posting("Golang Intern", Z, "HCM", "TopDev")]),
        StubScraper::hanging("slow"),
        StubScraper::returning("never", vec![posting("Golang Developer", X, "HCM", "ITViec")]),
    ];
    let ctx = ScrapeContext::new(Arc::new(FixtureSurface::new()), Duration::from_millis(300))
        .with_stealth(StealthProfile::instant());

    let started = std::time::Instant::now();
    let summary = pipeline(scrapers, dir.path(), &notifier, options(dir.path()))
        .run(&ctx, &strings(&["golang"]), &[])
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(summary.timed_out);
    assert_eq!(notifier.sent_urls(), vec![Z]);
    assert!(notifier.statuses()[0].contains("time budget exhausted"));
}

#[tokio::test]
async fn topcv_fixture_through_the_whole_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let surface = FixtureSurface::new()
        .page("www.topcv.vn/", include_str!("fixtures/topcv_home.html"))
        .page("tim-viec-lam-golang", include_str!("fixtures/topcv_listing.html"));
    let notifier = RecordingNotifier::default();
    let scrapers: Vec<Box<dyn SourceScraper>> =
        vec![Box::new(TopCvScraper::new(CardFilter::default()))];

    let summary = pipeline(scrapers, dir.path(), &notifier, options(dir.path()))
        .run(
            &fixture_ctx(surface, &dir.path().join("shots")),
            &strings(&["golang"]),
            &strings(&["Hồ Chí Minh", "Cần Thơ"]),
        )
        .await
        .unwrap();

    assert_eq!(summary.scraped, 3);
    let sent = notifier.sent.lock().unwrap().clone();
    let titles: Vec<&str> = sent.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Golang Backend Intern", "Junior Golang Developer", "Golang Developer"]
    );
    let scores: Vec<u8> = sent.iter().map(|p| p.score()).collect();
    assert_eq!(scores, vec![9, 8, 5]);
}
