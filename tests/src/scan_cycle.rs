//! End-to-end scan cycles against scripted sources with state on disk.

use chrono::{DateTime, Duration, Utc};
use monitor::config::Config;
use monitor::runner::{run_with, Collaborators, RunOptions};
use monitor::sources::ScriptedPostSource;
use monitor::TrendScanner;
use shared_models::error::Result;
use shared_models::{AlertType, Post};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn post(id: &str, handle: &str, likes: u64, reshares: u64) -> Post {
    Post {
        id: id.into(),
        text: format!("post {} about AI", id),
        author_id: format!("{}-id", handle),
        author_handle: handle.into(),
        created_at: Utc::now(),
        likes,
        reshares,
        replies: 0,
        quotes: 0,
        url: Post::canonical_url(handle, id),
    }
}

fn config(dir: &Path, keywords: &[&str], accounts: &[&str]) -> Config {
    Config {
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        followed_accounts: accounts.iter().map(|a| a.to_string()).collect(),
        ..Config::default()
    }
    .with_state_dir(dir)
}

async fn scan(config: &Config, source: ScriptedPostSource, now: DateTime<Utc>) -> Vec<shared_models::TrendAlert> {
    let mut scanner = TrendScanner::from_config(Arc::new(source), config);
    scanner.run_check_at(now).await
}

#[tokio::test]
async fn threshold_alert_fires_once_across_runs() -> Result<()> {
    init_tracing();
    info!("🧪 threshold alert across runs");

    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), &["AI"], &[]);
    let source = ScriptedPostSource::new().with_search("AI", vec![post("p1", "alice", 3000, 2500)]);
    let now = Utc::now();

    let first = scan(&config, source.clone(), now).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].alert_type, AlertType::ThresholdReached);
    assert_eq!(first[0].current_engagement, 5500);
    assert_eq!(first[0].matched_keyword.as_deref(), Some("AI"));
    assert!(config.alerted_path.exists());
    assert!(config.history_path.exists());

    // A fresh process reads the suppression back from disk.
    let second = scan(&config, source, now + Duration::minutes(15)).await;
    assert!(second.is_empty());
    Ok(())
}

#[tokio::test]
async fn growth_between_runs_raises_rapid_growth() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), &["AI"], &[]);
    let t0 = Utc::now();

    let quiet = scan(
        &config,
        ScriptedPostSource::new().with_search("AI", vec![post("p2", "bob", 1000, 0)]),
        t0,
    )
    .await;
    assert!(quiet.is_empty());

    let alerts = scan(
        &config,
        ScriptedPostSource::new().with_search("AI", vec![post("p2", "bob", 2000, 500)]),
        t0 + Duration::hours(1),
    )
    .await;

    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.alert_type, AlertType::RapidGrowth);
    assert_eq!(alert.previous_engagement, Some(1000));
    assert_eq!(alert.current_engagement, 2500);
    let rate = alert.growth_rate.unwrap_or_default();
    assert!((rate - 1500.0).abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn failing_query_does_not_stop_the_cycle() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), &["broken", "AI"], &["carol"]);
    let source = ScriptedPostSource::new()
        .failing_search("broken")
        .with_search("AI", vec![post("k1", "dave", 6000, 0)])
        .with_user("carol", vec![post("u1", "carol", 7000, 0)]);

    let alerts = scan(&config, source, Utc::now()).await;
    let ids: Vec<&str> = alerts.iter().map(|a| a.post.id.as_str()).collect();
    assert_eq!(ids, ["k1", "u1"]);
    assert_eq!(alerts[1].matched_keyword, None);
    Ok(())
}

#[tokio::test]
async fn suppression_expires_after_a_week() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), &["AI"], &[]);
    let source = ScriptedPostSource::new().with_search("AI", vec![post("p3", "erin", 9000, 0)]);
    let t0 = Utc::now();

    assert_eq!(scan(&config, source.clone(), t0).await.len(), 1);
    assert!(scan(&config, source.clone(), t0 + Duration::days(6)).await.is_empty());
    assert_eq!(scan(&config, source, t0 + Duration::days(8)).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_sources_produce_a_clean_run() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), &["AI"], &["nobody"]);
    let collaborators = Collaborators::new(Arc::new(ScriptedPostSource::new()));
    let options = RunOptions {
        output: Some(dir.path().join("alerts.json")),
        ..RunOptions::default()
    };

    let report = run_with(&config, &collaborators, None, &options, Utc::now()).await;
    assert!(report.success);
    assert_eq!(report.alerts_count, 0);
    assert!(!report.notification_sent);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("alerts.json"))?)?;
    assert_eq!(written, serde_json::json!([]));
    Ok(())
}
