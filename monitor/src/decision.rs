use crate::alerted_set::AlertedSet;
use crate::config::Config;
use crate::engagement_store::{EngagementStore, DEFAULT_CLEANUP_AGE_HOURS};
use chrono::{DateTime, Utc};
use shared_models::error::Result;
use shared_models::{AlertType, Post, TrendAlert};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Engagement per hour.
    pub rapid_growth: f64,
    /// Total engagement.
    pub absolute: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            rapid_growth: 1000.0,
            absolute: 5000,
        }
    }
}

impl From<&Config> for AlertThresholds {
    fn from(config: &Config) -> Self {
        Self {
            rapid_growth: config.rapid_growth_threshold,
            absolute: config.absolute_threshold,
        }
    }
}

/// Decides whether a freshly observed post deserves an alert.
///
/// Owns both pieces of durable state. `evaluate` only reads the alerted set;
/// the scanner calls `acknowledge` once it has actually kept an alert.
#[derive(Debug)]
pub struct AlertEngine {
    store: EngagementStore,
    alerted: AlertedSet,
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(store: EngagementStore, alerted: AlertedSet, thresholds: AlertThresholds) -> Self {
        Self {
            store,
            alerted,
            thresholds,
        }
    }

    pub fn open(config: &Config) -> Self {
        Self::new(
            EngagementStore::open(&config.history_path),
            AlertedSet::load(&config.alerted_path),
            AlertThresholds::from(config),
        )
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.thresholds
    }

    pub fn store(&self) -> &EngagementStore {
        &self.store
    }

    pub fn is_alerted(&self, post_id: &str) -> bool {
        self.alerted.contains(post_id)
    }

    /// Reloads the alerted set so each run starts from what is on disk.
    pub fn begin_run(&mut self, now: DateTime<Utc>) {
        self.alerted.refresh_at(now);
        debug!(alerted = self.alerted.len(), tracked = self.store.len(), "Run state ready");
    }

    pub fn evaluate(&mut self, post: &Post, keyword: Option<&str>) -> Option<TrendAlert> {
        self.evaluate_at(post, keyword, Utc::now())
    }

    pub fn evaluate_at(
        &mut self,
        post: &Post,
        keyword: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<TrendAlert> {
        if self.alerted.contains(&post.id) {
            return None;
        }

        // Every observation is tracked, alert or not.
        if let Err(e) = self.store.record_at(post, now) {
            warn!(post_id = %post.id, error = %e, "Failed to persist engagement sample");
        }

        let engagement = post.total_engagement();

        // Absolute threshold wins ties with rapid growth.
        if engagement >= self.thresholds.absolute {
            return Some(TrendAlert {
                post: post.clone(),
                alert_type: AlertType::ThresholdReached,
                previous_engagement: None,
                current_engagement: engagement,
                growth_rate: None,
                detected_at: now,
                matched_keyword: keyword.map(str::to_string),
            });
        }

        let growth = self.store.growth_rate(&post.id)?;
        if growth.rate_per_hour >= self.thresholds.rapid_growth {
            return Some(TrendAlert {
                post: post.clone(),
                alert_type: AlertType::RapidGrowth,
                previous_engagement: Some(growth.previous_engagement),
                current_engagement: engagement,
                growth_rate: Some(growth.rate_per_hour),
                detected_at: now,
                matched_keyword: keyword.map(str::to_string),
            });
        }

        None
    }

    pub fn acknowledge(&mut self, alert: &TrendAlert) {
        self.alerted.insert(&alert.post.id, alert.detected_at);
    }

    /// Persists the alerted set and garbage-collects the engagement history.
    /// Cleanup still runs when the save fails; the save error is returned.
    pub fn finish_run(&mut self, now: DateTime<Utc>) -> Result<()> {
        let saved = self.alerted.save();
        if let Err(e) = &saved {
            warn!(error = %e, "Failed to persist alerted set");
        }

        let removed = self.store.cleanup_at(now, DEFAULT_CLEANUP_AGE_HOURS)?;
        info!(
            alerted = self.alerted.len(),
            tracked = self.store.len(),
            removed,
            "Run state persisted"
        );
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn post(id: &str, likes: u64, reshares: u64) -> Post {
        Post {
            id: id.into(),
            text: "post".into(),
            author_id: "9".into(),
            author_handle: "handle".into(),
            created_at: Utc::now(),
            likes,
            reshares,
            replies: 0,
            quotes: 0,
            url: Post::canonical_url("handle", id),
        }
    }

    fn engine() -> AlertEngine {
        AlertEngine::new(
            EngagementStore::in_memory(),
            AlertedSet::in_memory(),
            AlertThresholds::default(),
        )
    }

    #[test]
    fn threshold_alert_carries_no_growth_data() {
        let mut engine = engine();
        let alert = engine
            .evaluate(&post("p", 3000, 2500), Some("AI"))
            .expect("alert");

        assert_eq!(alert.alert_type, AlertType::ThresholdReached);
        assert_eq!(alert.current_engagement, 5500);
        assert_eq!(alert.previous_engagement, None);
        assert_eq!(alert.growth_rate, None);
        assert_eq!(alert.matched_keyword.as_deref(), Some("AI"));
    }

    #[test]
    fn rapid_growth_fires_on_oldest_to_newest_rate() {
        let mut engine = engine();
        let t0 = Utc::now() - Duration::hours(2);
        assert!(engine.evaluate_at(&post("p", 100, 0), None, t0).is_none());
        assert!(engine
            .evaluate_at(&post("p", 100, 0), None, t0 + Duration::hours(1))
            .is_none());

        let alert = engine
            .evaluate_at(&post("p", 2100, 0), None, t0 + Duration::hours(2))
            .expect("alert");
        assert_eq!(alert.alert_type, AlertType::RapidGrowth);
        assert_eq!(alert.previous_engagement, Some(100));
        assert!((alert.growth_rate.unwrap() - 1000.0).abs() < 1e-9);
        assert_eq!(alert.matched_keyword, None);
    }

    #[test]
    fn threshold_takes_priority_over_rapid_growth() {
        let mut engine = engine();
        let t0 = Utc::now() - Duration::hours(1);
        engine.evaluate_at(&post("p", 0, 0), None, t0);

        // Both rules qualify: 6000 total, 6000/hour.
        let alert = engine
            .evaluate_at(&post("p", 6000, 0), None, t0 + Duration::hours(1))
            .expect("alert");
        assert_eq!(alert.alert_type, AlertType::ThresholdReached);
    }

    #[test]
    fn acknowledged_posts_never_alert_again() {
        let mut engine = engine();
        let alert = engine.evaluate(&post("p", 9000, 0), None).expect("alert");
        engine.acknowledge(&alert);

        assert!(engine.evaluate(&post("p", 90_000, 0), None).is_none());
        assert!(engine.is_alerted("p"));
    }

    #[test]
    fn evaluate_does_not_mark_alerted_by_itself() {
        let mut engine = engine();
        assert!(engine.evaluate(&post("p", 9000, 0), None).is_some());
        assert!(!engine.is_alerted("p"));
        assert!(engine.evaluate(&post("p", 9000, 0), None).is_some());
    }

    #[test]
    fn quiet_posts_are_still_recorded() {
        let mut engine = engine();
        assert!(engine.evaluate(&post("quiet", 1, 0), None).is_none());
        assert_eq!(engine.store().series("quiet").unwrap().samples.len(), 1);
    }

    #[test]
    fn failed_alerted_save_still_cleans_history() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the alerted path makes the final rename fail.
        let alerted_path = dir.path().join("alerted.json");
        std::fs::create_dir_all(alerted_path.join("blocker")).unwrap();

        let now = Utc::now();
        let mut store = EngagementStore::open(dir.path().join("history.json"));
        store
            .record_at(&post("stale", 1, 0), now - Duration::hours(49))
            .unwrap();
        let mut engine = AlertEngine::new(
            store,
            AlertedSet::load_at(&alerted_path, now),
            AlertThresholds::default(),
        );

        assert!(engine.finish_run(now).is_err());
        assert!(engine.store().series("stale").is_none());
    }

    #[test]
    fn suppressed_posts_are_not_recorded() {
        let mut engine = engine();
        let alert = engine.evaluate(&post("p", 9000, 0), None).unwrap();
        engine.acknowledge(&alert);
        engine.evaluate(&post("p", 9500, 0), None);
        assert_eq!(engine.store().series("p").unwrap().samples.len(), 1);
    }
}
