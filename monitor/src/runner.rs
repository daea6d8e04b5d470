//! One complete monitoring run: scan, persist, rank, publish, notify.

use crate::analyzer::{build_analyzer, rank_posts};
use crate::config::{Config, Credentials};
use crate::dashboard::{publish_dashboard, render_index};
use crate::metrics::ScanMetrics;
use crate::notify::{build_notifier, send_alert_notification};
use crate::scanner::TrendScanner;
use crate::sources::build_post_source;
use crate::state::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_models::error::{ModelError, Result};
use shared_models::{NotificationSink, PostAnalyzer, PostSource, PostSummary, TrendAlert};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Alerts are written here as JSON when set.
    pub output: Option<PathBuf>,
    pub dashboard_dir: Option<PathBuf>,
    pub metrics_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub success: bool,
    pub alerts_count: usize,
    pub alerts: Vec<TrendAlert>,
    pub notification_sent: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RunReport {
    fn failed(run_id: Uuid, error: &ModelError, timestamp: DateTime<Utc>) -> Self {
        Self {
            run_id,
            success: false,
            alerts_count: 0,
            alerts: Vec::new(),
            notification_sent: false,
            error: Some(error.to_string()),
            timestamp,
        }
    }
}

/// External services a run talks to. Only the post source is mandatory.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn PostSource>,
    pub notifier: Option<Arc<dyn NotificationSink>>,
    pub analyzer: Option<Arc<dyn PostAnalyzer>>,
}

impl Collaborators {
    pub fn new(source: Arc<dyn PostSource>) -> Self {
        Self {
            source,
            notifier: None,
            analyzer: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn PostAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// A missing post source is fatal; notifier and analyzer problems only
    /// disable those steps.
    pub fn from_credentials(credentials: &Credentials, config: &Config) -> Result<Self> {
        let source = build_post_source(credentials)?;

        let notifier = build_notifier(credentials).unwrap_or_else(|e| {
            warn!(error = %e, "Email notifier unavailable");
            None
        });
        let analyzer = build_analyzer(credentials, &config.analysis_context).unwrap_or_else(|e| {
            warn!(error = %e, "Analyzer unavailable");
            None
        });

        Ok(Self {
            source,
            notifier,
            analyzer,
        })
    }
}

/// Entry point used by the CLI. Configuration or post-source failures end the
/// run with `success = false` before anything is fetched.
pub async fn run_monitor(
    config: Result<Config>,
    credentials: &Credentials,
    notify_email: Option<&str>,
    options: &RunOptions,
) -> RunReport {
    let prepared = config.and_then(|config| {
        let collaborators = Collaborators::from_credentials(credentials, &config)?;
        Ok((config, collaborators))
    });

    match prepared {
        Ok((config, collaborators)) => {
            run_with(&config, &collaborators, notify_email, options, Utc::now()).await
        }
        Err(e) => {
            let run_id = Uuid::new_v4();
            error!(%run_id, error = %e, "❌ Monitor run aborted");
            RunReport::failed(run_id, &e, Utc::now())
        }
    }
}

pub async fn run_with(
    config: &Config,
    collaborators: &Collaborators,
    notify_email: Option<&str>,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> RunReport {
    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        source = collaborators.source.name(),
        keywords = config.keywords.len(),
        accounts = config.followed_accounts.len(),
        "🚀 Starting monitor run"
    );

    let metrics = match ScanMetrics::new() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            warn!(error = %e, "Metrics disabled for this run");
            None
        }
    };

    let mut scanner = TrendScanner::from_config(Arc::clone(&collaborators.source), config);
    if let Some(metrics) = &metrics {
        scanner = scanner.with_metrics(Arc::clone(metrics));
    }
    let alerts = scanner.run_check_at(now).await;

    if let Some(path) = &options.output {
        if let Err(e) = write_alerts(path, &alerts) {
            warn!(path = %path.display(), error = %e, "Failed to write alerts file");
        }
    }

    if let Some(dir) = &options.dashboard_dir {
        publish(dir, &alerts, collaborators.analyzer.as_deref(), now).await;
    }

    let mut notification_sent = false;
    if !alerts.is_empty() {
        match (notify_email, &collaborators.notifier) {
            (Some(to), Some(sink)) => {
                notification_sent = send_alert_notification(sink.as_ref(), &alerts, to).await;
            }
            (Some(_), None) => warn!("Recipient given but no email provider configured"),
            (None, _) => info!("No recipient configured, skipping notification"),
        }
    }

    if let (Some(path), Some(metrics)) = (&options.metrics_file, &metrics) {
        if let Err(e) = metrics.write_textfile(path) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics");
        }
    }

    info!(%run_id, alerts = alerts.len(), notification_sent, "✅ Monitor run complete");
    RunReport {
        run_id,
        success: true,
        alerts_count: alerts.len(),
        alerts,
        notification_sent,
        error: None,
        timestamp: now,
    }
}

async fn publish(
    dir: &Path,
    alerts: &[TrendAlert],
    analyzer: Option<&dyn PostAnalyzer>,
    now: DateTime<Utc>,
) {
    let summaries: Vec<PostSummary> = alerts.iter().map(PostSummary::from).collect();
    let ranked = rank_posts(&summaries, analyzer).await;

    if let Err(e) = publish_dashboard(dir, &ranked, now) {
        warn!(dir = %dir.display(), error = %e, "Failed to publish dashboard");
        return;
    }
    if let Err(e) = render_index(dir) {
        warn!(dir = %dir.display(), error = %e, "Failed to rebuild history index");
    }
}

pub fn write_alerts(path: &Path, alerts: &[TrendAlert]) -> Result<()> {
    write_atomic(path, &alerts)?;
    info!(path = %path.display(), count = alerts.len(), "Alerts written");
    Ok(())
}

pub fn read_alerts(path: &Path) -> Result<Vec<TrendAlert>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ModelError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Sends a previously written alerts file. Returns whether an email went out.
pub async fn notify_from_file(path: &Path, to: &str, credentials: &Credentials) -> Result<bool> {
    let alerts = read_alerts(path)?;
    if alerts.is_empty() {
        info!(path = %path.display(), "Alerts file is empty, nothing to send");
        return Ok(false);
    }

    let sink = build_notifier(credentials)?.ok_or_else(|| {
        ModelError::Config(
            "No email provider configured. Set SENDGRID_API_KEY, SES_SMTP_USERNAME or SMTP_USER"
                .into(),
        )
    })?;
    Ok(send_alert_notification(sink.as_ref(), &alerts, to).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ScriptedPostSource;
    use async_trait::async_trait;
    use shared_models::Post;
    use std::sync::Mutex;

    fn post(id: &str, likes: u64) -> Post {
        Post {
            id: id.into(),
            text: format!("about AI {}", id),
            author_id: "1".into(),
            author_handle: "poster".into(),
            created_at: Utc::now(),
            likes,
            reshares: 0,
            replies: 0,
            quotes: 0,
            url: Post::canonical_url("poster", id),
        }
    }

    fn config_in(dir: &Path) -> Config {
        Config {
            keywords: vec!["AI".into()],
            followed_accounts: Vec::new(),
            ..Config::default()
        }
        .with_state_dir(dir)
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, to: &str, subject: &str, _html: &str, _text: &str) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            true
        }
    }

    #[tokio::test]
    async fn missing_credentials_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_monitor(
            Ok(config_in(dir.path())),
            &Credentials::default(),
            None,
            &RunOptions::default(),
        )
        .await;

        assert!(!report.success);
        assert!(report.alerts.is_empty());
        assert!(report.error.unwrap().contains("No post source credentials"));
    }

    #[tokio::test]
    async fn config_error_is_reported() {
        let report = run_monitor(
            Err(ModelError::Config("no keywords or followed accounts configured".into())),
            &Credentials::default(),
            None,
            &RunOptions::default(),
        )
        .await;
        assert!(!report.success);
        assert_eq!(report.alerts_count, 0);
    }

    #[tokio::test]
    async fn alerts_are_written_published_and_mailed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let sink = Arc::new(RecordingSink::default());
        let source = ScriptedPostSource::new().with_search("AI", vec![post("hot", 6000), post("cold", 10)]);
        let collaborators = Collaborators::new(Arc::new(source)).with_notifier(sink.clone());
        let options = RunOptions {
            output: Some(dir.path().join("alerts.json")),
            dashboard_dir: Some(dir.path().join("docs")),
            metrics_file: Some(dir.path().join("monitor.prom")),
        };

        let report = run_with(&config, &collaborators, Some("me@example.com"), &options, Utc::now()).await;

        assert!(report.success);
        assert_eq!(report.alerts_count, 1);
        assert!(report.notification_sent);
        assert_eq!(sink.sent.lock().unwrap()[0].0, "me@example.com");

        let written = read_alerts(&dir.path().join("alerts.json")).unwrap();
        assert_eq!(written[0].post.id, "hot");
        assert!(dir.path().join("docs/dashboard.html").exists());
        assert!(dir.path().join("docs/index.html").exists());
        let metrics = std::fs::read_to_string(dir.path().join("monitor.prom")).unwrap();
        assert!(metrics.contains("posts_observed_total 2"));
    }

    #[tokio::test]
    async fn quiet_run_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let sink = Arc::new(RecordingSink::default());
        let source = ScriptedPostSource::new().with_search("AI", vec![post("cold", 10)]);
        let collaborators = Collaborators::new(Arc::new(source)).with_notifier(sink.clone());

        let report = run_with(
            &config,
            &collaborators,
            Some("me@example.com"),
            &RunOptions::default(),
            Utc::now(),
        )
        .await;

        assert!(report.success);
        assert!(!report.notification_sent);
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notify_from_empty_file_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        write_alerts(&path, &[]).unwrap();

        let sent = notify_from_file(&path, "me@example.com", &Credentials::default())
            .await
            .unwrap();
        assert!(!sent);
    }
}
