use crate::config::Config;
use crate::decision::AlertEngine;
use crate::metrics::ScanMetrics;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use shared_models::{Post, PostSource, TrendAlert};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Drives one poll cycle: keyword searches, then followed accounts, feeding
/// every post through the alert engine.
pub struct TrendScanner {
    source: Arc<dyn PostSource>,
    engine: AlertEngine,
    keywords: Vec<String>,
    accounts: Vec<String>,
    max_results: usize,
    metrics: Option<Arc<ScanMetrics>>,
}

impl TrendScanner {
    pub fn new(
        source: Arc<dyn PostSource>,
        engine: AlertEngine,
        keywords: Vec<String>,
        accounts: Vec<String>,
    ) -> Self {
        Self {
            source,
            engine,
            keywords,
            accounts,
            max_results: DEFAULT_MAX_RESULTS,
            metrics: None,
        }
    }

    pub fn from_config(source: Arc<dyn PostSource>, config: &Config) -> Self {
        Self::new(
            source,
            AlertEngine::open(config),
            config.keywords.clone(),
            config.followed_accounts.clone(),
        )
        .with_max_results(config.max_results)
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, DEFAULT_MAX_RESULTS);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    pub async fn run_check(&mut self) -> Vec<TrendAlert> {
        self.run_check_at(Utc::now()).await
    }

    /// Alerts come back in discovery order: keywords in list order, then
    /// accounts in list order.
    pub async fn run_check_at(&mut self, now: DateTime<Utc>) -> Vec<TrendAlert> {
        let started = Instant::now();
        self.engine.begin_run(now);

        // Fetches are independent; join_all keeps results in input order.
        let keyword_results = {
            let source = &self.source;
            let max = self.max_results;
            join_all(self.keywords.iter().map(|keyword| async move {
                info!(%keyword, "Searching for keyword");
                source.search(keyword, max).await
            }))
            .await
        };
        let account_results = {
            let source = &self.source;
            let max = self.max_results;
            join_all(self.accounts.iter().map(|handle| async move {
                info!(%handle, "Checking account");
                source.user_posts(handle, max).await
            }))
            .await
        };

        let mut alerts = Vec::new();

        for (keyword, result) in self.keywords.clone().iter().zip(keyword_results) {
            let posts = match result {
                Ok(posts) => posts,
                Err(e) => {
                    warn!(%keyword, source = self.source.name(), error = %e, "Keyword search failed, skipping");
                    self.count_failure("search");
                    Vec::new()
                }
            };
            self.evaluate_batch(&posts, Some(keyword), now, &mut alerts);
        }

        for (handle, result) in self.accounts.clone().iter().zip(account_results) {
            let posts = match result {
                Ok(posts) => posts,
                Err(e) => {
                    warn!(%handle, source = self.source.name(), error = %e, "Account fetch failed, skipping");
                    self.count_failure("user_posts");
                    Vec::new()
                }
            };
            self.evaluate_batch(&posts, None, now, &mut alerts);
        }

        if let Err(e) = self.engine.finish_run(now) {
            error!(error = %e, "Failed to persist run state");
        }

        if let Some(metrics) = &self.metrics {
            metrics.scan_duration.observe(started.elapsed().as_secs_f64());
        }
        info!(alerts = alerts.len(), elapsed_ms = started.elapsed().as_millis() as u64, "Scan cycle complete");
        alerts
    }

    fn evaluate_batch(
        &mut self,
        posts: &[Post],
        keyword: Option<&str>,
        now: DateTime<Utc>,
        alerts: &mut Vec<TrendAlert>,
    ) {
        for post in posts {
            if let Some(metrics) = &self.metrics {
                metrics.posts_observed.inc();
            }
            if let Some(alert) = self.engine.evaluate_at(post, keyword, now) {
                info!(
                    post_id = %post.id,
                    alert_type = %alert.alert_type,
                    engagement = alert.current_engagement,
                    growth_rate = ?alert.growth_rate,
                    "🔥 Trend alert"
                );
                if let Some(metrics) = &self.metrics {
                    metrics
                        .alerts_emitted
                        .with_label_values(&[alert.alert_type.as_str()])
                        .inc();
                }
                self.engine.acknowledge(&alert);
                alerts.push(alert);
            }
        }
    }

    fn count_failure(&self, kind: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.fetch_failures.with_label_values(&[kind]).inc();
        }
    }
}
