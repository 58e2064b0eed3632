// tests/relevance_scoring.rs
use chrono::{TimeZone, Utc};
use job_scout::posting::Posting;
use job_scout::relevance::{RelevanceConfig, RelevanceRules, MAX_SCORE};

fn p(title: &str, description: &str, location: &str) -> Posting {
    Posting {
        title: title.into(),
        description: description.into(),
        location: location.into(),
        posted_date: "Recent".into(),
        ..Default::default()
    }
}

#[test]
fn scenario_junior_golang_in_can_tho_scores_nine() {
    let rules = RelevanceRules::default();
    let post = p("Junior Golang Developer", "Docker, Kubernetes, Remote", "Can Tho");
    assert!(rules.should_include(&post));
    assert_eq!(rules.calculate_match_score(&post), 9);
}

#[test]
fn scenario_senior_with_years_is_rejected_and_zero() {
    let rules = RelevanceRules::default();
    let post = p("Senior Golang Developer with 5 years exp", "Remote", "");
    assert!(!rules.should_include(&post));
    assert_eq!(rules.calculate_match_score(&post), 0);
}

#[test]
fn experience_veto_beats_every_positive_signal() {
    let rules = RelevanceRules::default();
    let post = p(
        "Junior Golang Developer",
        "Docker, Kubernetes, AWS. Yêu cầu 3 năm kinh nghiệm",
        "Cần Thơ",
    );
    assert_eq!(rules.calculate_match_score(&post), 0);
    assert!(!rules.should_include(&post));
}

#[test]
fn seniority_terms_exclude_even_with_keyword() {
    let rules = RelevanceRules::default();
    for title in [
        "Golang Tech Lead",
        "Principal Golang Engineer",
        "Golang Architect",
        "Engineering Manager (Golang)",
        "Golang Developer 2+ years",
    ] {
        assert!(!rules.should_include(&p(title, "", "HCM")), "{title}");
    }
}

#[test]
fn scores_stay_in_range() {
    let rules = RelevanceRules::default();
    let samples = [
        p("", "", ""),
        p("Golang", "", ""),
        p("Fresher Golang Backend Intern", "docker k8s aws gcp grpc microservices", "Remote, Hồ Chí Minh, Hà Nội"),
        p("Blockchain golang junior", "rest api", "Sài Gòn"),
    ];
    for s in &samples {
        assert!(rules.calculate_match_score(s) <= MAX_SCORE);
    }
}

#[test]
fn secondary_location_is_worth_one() {
    let rules = RelevanceRules::default();
    let primary = p("Golang Developer", "", "Thành phố Hồ Chí Minh");
    let secondary = p("Golang Developer", "", "Hà Nội");
    let nowhere = p("Golang Developer", "", "Singapore");
    assert_eq!(rules.calculate_match_score(&primary), 5);
    assert_eq!(rules.calculate_match_score(&secondary), 4);
    assert_eq!(rules.calculate_match_score(&nowhere), 3);
}

#[test]
fn stale_posted_dates_are_not_admitted() {
    let rules = RelevanceRules::default();
    let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
    let mut post = p("Junior Golang Developer", "", "Can Tho");

    post.posted_date = "2026-06-01".into();
    assert!(rules.should_include_at(&post, now));
    post.posted_date = "2026-03-01".into();
    assert!(!rules.should_include_at(&post, now));
    post.posted_date = "20/06/2026".into();
    assert!(!rules.should_include_at(&post, now));
    post.posted_date = "Posted in 2025".into();
    assert!(rules.should_include_at(&post, now));
    post.posted_date = "Posted in 2019".into();
    assert!(!rules.should_include_at(&post, now));
    post.posted_date = "N/A".into();
    assert!(rules.should_include_at(&post, now));
}

#[test]
fn rank_sorts_by_score_and_keeps_ties_in_order() {
    let rules = RelevanceRules::default();
    let ranked = rules.rank(vec![
        p("Golang Developer A", "", "Singapore"),
        p("Senior Golang Developer", "", "HCM"),
        p("Junior Golang Developer", "docker", "Can Tho"),
        p("Golang Developer B", "", "Singapore"),
    ]);
    let titles: Vec<&str> = ranked.iter().map(|x| x.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Junior Golang Developer", "Golang Developer A", "Golang Developer B"]
    );
    assert_eq!(ranked[0].match_score, Some(9));
    assert_eq!(ranked[1].match_score, Some(3));
}

#[test]
fn toml_overrides_patterns_and_rejects_bad_ones() {
    let rules = RelevanceRules::from_toml_str(
        r#"
include_pattern = '(?i)\brust\b'
primary_locations = ["da nang"]
"#,
    )
    .unwrap();
    let post = p("Junior Rust Developer", "", "Đà Nẵng");
    assert!(rules.should_include(&post));
    assert_eq!(rules.calculate_match_score(&post), 8);

    assert!(RelevanceRules::from_toml_str("exclude_pattern = '(unclosed'").is_err());

    let cfg = RelevanceConfig {
        experience_pattern: r"(\d+) years".into(),
        ..Default::default()
    };
    assert!(RelevanceRules::compile(&cfg).is_err());
}

#[test]
fn fullwidth_posted_date_is_treated_as_recent() {
    let rules = RelevanceRules::default();
    let mut post = p("Junior Golang Developer", "", "Can Tho");
    post.posted_date = "２０２６-01-15".into();
    assert!(rules.should_include(&post));
    let ranked = rules.rank(vec![post]);
    assert_eq!(ranked.len(), 1);
}
