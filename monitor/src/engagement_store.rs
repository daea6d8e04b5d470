use crate::state;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared_models::error::Result;
use shared_models::Post;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RETENTION_HOURS: i64 = 24;
pub const DEFAULT_CLEANUP_AGE_HOURS: i64 = 48;
/// Two samples closer than this never yield a growth rate.
const MIN_GROWTH_WINDOW_HOURS: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSample {
    pub timestamp: DateTime<Utc>,
    pub engagement: u64,
    pub likes: u64,
    pub reshares: u64,
    pub replies: u64,
    pub quotes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSeries {
    pub first_seen: DateTime<Utc>,
    /// Ascending by timestamp, trimmed to the retention window on every write.
    pub samples: Vec<EngagementSample>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthRate {
    pub previous_engagement: u64,
    pub rate_per_hour: f64,
}

/// Rolling engagement history per post id, written through to disk on every
/// mutation when backed by a file.
#[derive(Debug, Default)]
pub struct EngagementStore {
    path: Option<PathBuf>,
    series: BTreeMap<String, EngagementSeries>,
}

impl EngagementStore {
    /// Opens the store at `path`. Missing or corrupt files start empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let series: BTreeMap<String, EngagementSeries> = state::load_or_default(&path);
        debug!(path = %path.display(), tracked = series.len(), "Engagement history loaded");
        Self {
            path: Some(path),
            series,
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series(&self, post_id: &str) -> Option<&EngagementSeries> {
        self.series.get(post_id)
    }

    pub fn record(&mut self, post: &Post) -> Result<()> {
        self.record_at(post, Utc::now())
    }

    pub fn record_at(&mut self, post: &Post, now: DateTime<Utc>) -> Result<()> {
        let series = self
            .series
            .entry(post.id.clone())
            .or_insert_with(|| EngagementSeries {
                first_seen: now,
                samples: Vec::new(),
            });

        series.samples.push(EngagementSample {
            timestamp: now,
            engagement: post.total_engagement(),
            likes: post.likes,
            reshares: post.reshares,
            replies: post.replies,
            quotes: post.quotes,
        });
        trim_to_retention(series, now);

        self.persist()
    }

    pub fn growth_rate(&self, post_id: &str) -> Option<GrowthRate> {
        let samples = &self.series.get(post_id)?.samples;
        if samples.len() < 2 {
            return None;
        }

        // Oldest vs newest retained sample, not the latest pair.
        let oldest = samples.first()?;
        let newest = samples.last()?;
        let hours = (newest.timestamp - oldest.timestamp).num_milliseconds() as f64 / 3_600_000.0;
        if hours < MIN_GROWTH_WINDOW_HOURS {
            return None;
        }

        Some(GrowthRate {
            previous_engagement: oldest.engagement,
            rate_per_hour: (newest.engagement as f64 - oldest.engagement as f64) / hours,
        })
    }

    pub fn cleanup(&mut self, max_age_hours: i64) -> Result<usize> {
        self.cleanup_at(Utc::now(), max_age_hours)
    }

    /// Drops series first seen before `now - max_age_hours` whose samples have
    /// all aged out of the retention window. Returns how many were removed.
    pub fn cleanup_at(&mut self, now: DateTime<Utc>, max_age_hours: i64) -> Result<usize> {
        let cutoff = now - Duration::hours(max_age_hours);
        let before = self.series.len();

        self.series.retain(|_, series| {
            trim_to_retention(series, now);
            !(series.first_seen < cutoff && series.samples.is_empty())
        });

        let removed = before - self.series.len();
        debug!(removed, remaining = self.series.len(), "Engagement history cleaned");
        self.persist()?;
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        match &self.path {
            Some(path) => state::write_atomic(path, &self.series),
            None => Ok(()),
        }
    }
}

fn trim_to_retention(series: &mut EngagementSeries, now: DateTime<Utc>) {
    let cutoff = now - Duration::hours(RETENTION_HOURS);
    series.samples.retain(|s| s.timestamp > cutoff);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_with(id: &str, likes: u64) -> Post {
        Post {
            id: id.into(),
            text: "text".into(),
            author_id: "1".into(),
            author_handle: "author".into(),
            created_at: Utc::now(),
            likes,
            reshares: 0,
            replies: 0,
            quotes: 0,
            url: Post::canonical_url("author", id),
        }
    }

    #[test]
    fn growth_compares_oldest_and_newest_samples() {
        let t0 = Utc::now() - Duration::hours(3);
        let mut store = EngagementStore::in_memory();
        store.record_at(&post_with("p", 100), t0).unwrap();
        store.record_at(&post_with("p", 100), t0 + Duration::hours(1)).unwrap();
        store.record_at(&post_with("p", 2100), t0 + Duration::hours(2)).unwrap();

        let growth = store.growth_rate("p").unwrap();
        assert_eq!(growth.previous_engagement, 100);
        assert!((growth.rate_per_hour - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_or_single_sample_has_no_growth() {
        let mut store = EngagementStore::in_memory();
        assert!(store.growth_rate("missing").is_none());
        store.record(&post_with("p", 10)).unwrap();
        assert!(store.growth_rate("p").is_none());
    }

    #[test]
    fn samples_under_six_minutes_apart_have_no_growth() {
        let t0 = Utc::now();
        let mut store = EngagementStore::in_memory();
        store.record_at(&post_with("p", 0), t0).unwrap();
        store
            .record_at(&post_with("p", 1_000_000), t0 + Duration::minutes(5))
            .unwrap();
        assert!(store.growth_rate("p").is_none());
    }

    #[test]
    fn samples_older_than_retention_are_dropped_on_write() {
        let t0 = Utc::now() - Duration::hours(30);
        let mut store = EngagementStore::in_memory();
        store.record_at(&post_with("p", 10), t0).unwrap();
        store
            .record_at(&post_with("p", 50_000), t0 + Duration::hours(25))
            .unwrap();

        assert_eq!(store.series("p").unwrap().samples.len(), 1);
        assert!(store.growth_rate("p").is_none());
        assert_eq!(store.series("p").unwrap().first_seen, t0);
    }

    #[test]
    fn cleanup_removes_only_expired_empty_series() {
        let now = Utc::now();
        let mut store = EngagementStore::in_memory();
        store.series.insert(
            "stale".into(),
            EngagementSeries {
                first_seen: now - Duration::hours(49),
                samples: vec![],
            },
        );
        store.series.insert(
            "active".into(),
            EngagementSeries {
                first_seen: now - Duration::hours(49),
                samples: vec![EngagementSample {
                    timestamp: now - Duration::hours(1),
                    engagement: 5,
                    likes: 5,
                    reshares: 0,
                    replies: 0,
                    quotes: 0,
                }],
            },
        );
        store.series.insert(
            "young".into(),
            EngagementSeries {
                first_seen: now - Duration::hours(2),
                samples: vec![],
            },
        );

        let removed = store.cleanup_at(now, DEFAULT_CLEANUP_AGE_HOURS).unwrap();
        assert_eq!(removed, 1);
        assert!(store.series("stale").is_none());
        assert!(store.series("active").is_some());
        assert!(store.series("young").is_some());
    }

    #[test]
    fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engagement_history.json");
        let t0 = Utc::now() - Duration::hours(1);
        {
            let mut store = EngagementStore::open(&path);
            store.record_at(&post_with("p", 10), t0).unwrap();
        }

        let mut store = EngagementStore::open(&path);
        assert_eq!(store.len(), 1);
        store.record_at(&post_with("p", 1010), t0 + Duration::hours(1)).unwrap();
        let growth = store.growth_rate("p").unwrap();
        assert!((growth.rate_per_hour - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn corrupt_history_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engagement_history.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(EngagementStore::open(&path).is_empty());
    }
}
