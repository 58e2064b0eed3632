// tests/config_load.rs
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use job_scout::config::AppConfig;
use job_scout::pipeline::SourceErrorPolicy;
use job_scout::scrape::SourceKind;
use serial_test::serial;

fn shipped_config() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config/job_scout.toml")
}

#[test]
fn shipped_config_parses_and_compiles() {
    let cfg = AppConfig::load_from(&shipped_config()).unwrap();
    assert_eq!(cfg.search.keywords, vec!["golang"]);
    assert_eq!(cfg.source_kinds().unwrap(), SourceKind::ALL.to_vec());
    assert_eq!(cfg.run.on_source_error, SourceErrorPolicy::Continue);
    assert_eq!(cfg.run.max_notifications, None);
    assert_eq!(cfg.stealth.warmup.min_ms, 2000);
    assert_eq!(cfg.relevance.recency.max_age_days, 60);
    assert_eq!(cfg.search.cookies_dir, cfg.paths.cookies_dir);
    assert!(cfg.relevance_rules().is_ok());
}

#[test]
fn bad_relevance_pattern_names_the_field() {
    let cfg = AppConfig::from_toml_str("[relevance]\nlevel_pattern = '(junior'").unwrap();
    let err = cfg.relevance_rules().unwrap_err();
    assert!(format!("{err:#}").contains("level_pattern"));
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("broken.toml");
    fs::write(&p, "[search\nkeywords = 1").unwrap();
    let err = AppConfig::load_from(&p).unwrap_err();
    assert!(format!("{err:#}").contains("broken.toml"));
}

#[serial]
#[test]
fn explicit_path_still_takes_env_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("scout.toml");
    fs::write(
        &p,
        "[search]\nkeywords = [\"rust\"]\nsources = [\"topdev\"]\n[telegram]\nchat_id = \"1\"\n",
    )
    .unwrap();

    env::remove_var("TELEGRAM_CHAT_ID");
    env::set_var("TELEGRAM_BOT_TOKEN", "42:from-env");
    env::set_var("JOB_SCOUT_LOGS_DIR", "/tmp/scout-logs");

    let cfg = AppConfig::load(Some(&p)).unwrap();
    assert_eq!(cfg.search.keywords, vec!["rust"]);
    assert_eq!(cfg.source_kinds().unwrap(), vec![SourceKind::TopDev]);
    assert_eq!(cfg.telegram_credentials(), Some(("42:from-env", "1")));
    assert_eq!(cfg.paths.logs_dir, PathBuf::from("/tmp/scout-logs"));

    env::remove_var("TELEGRAM_BOT_TOKEN");
    env::remove_var("JOB_SCOUT_LOGS_DIR");
}

#[serial]
#[test]
fn blank_env_values_do_not_override() {
    env::set_var("TELEGRAM_BOT_TOKEN", "   ");
    let cfg = AppConfig::load(Some(&shipped_config())).unwrap();
    assert_eq!(cfg.telegram_credentials(), None);
    env::remove_var("TELEGRAM_BOT_TOKEN");
}
