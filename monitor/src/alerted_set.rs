use crate::state;
use chrono::{DateTime, Duration, Utc};
use shared_models::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ALERT_HORIZON_DAYS: i64 = 7;

/// Post ids that already produced an alert, keyed to when they first did.
#[derive(Debug, Default)]
pub struct AlertedSet {
    path: Option<PathBuf>,
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl AlertedSet {
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::load_at(path, Utc::now())
    }

    /// Loads the set and drops entries alerted more than seven days before `now`.
    pub fn load_at(path: impl AsRef<Path>, now: DateTime<Utc>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut entries: BTreeMap<String, DateTime<Utc>> = state::load_or_default(&path);
        let loaded = entries.len();
        let cutoff = now - Duration::days(ALERT_HORIZON_DAYS);
        entries.retain(|_, alerted_at| *alerted_at > cutoff);
        debug!(
            path = %path.display(),
            kept = entries.len(),
            expired = loaded - entries.len(),
            "Alerted set loaded"
        );
        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Re-reads the backing file (if any) and re-applies the horizon filter.
    pub fn refresh_at(&mut self, now: DateTime<Utc>) {
        match self.path.clone() {
            Some(path) => *self = Self::load_at(path, now),
            None => {
                let cutoff = now - Duration::days(ALERT_HORIZON_DAYS);
                self.entries.retain(|_, alerted_at| *alerted_at > cutoff);
            }
        }
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.entries.contains_key(post_id)
    }

    /// Keeps the earliest timestamp if the id is already present.
    pub fn insert(&mut self, post_id: &str, alerted_at: DateTime<Utc>) {
        self.entries
            .entry(post_id.to_string())
            .or_insert(alerted_at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full overwrite of the backing file.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => state::write_atomic(path, &self.entries),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_older_than_seven_days_are_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerted.json");
        let now = Utc::now();

        let mut set = AlertedSet::load_at(&path, now);
        set.insert("old", now - Duration::days(8));
        set.insert("recent", now - Duration::days(2));
        set.save().unwrap();

        let reloaded = AlertedSet::load_at(&path, now);
        assert!(!reloaded.contains("old"));
        assert!(reloaded.contains("recent"));
    }

    #[test]
    fn reinsert_keeps_original_alert_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerted.json");
        let now = Utc::now();

        let mut set = AlertedSet::load_at(&path, now);
        set.insert("p", now - Duration::days(6));
        set.insert("p", now);
        set.save().unwrap();

        // Still expires on the original schedule.
        let later = AlertedSet::load_at(&path, now + Duration::days(2));
        assert!(!later.contains("p"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AlertedSet::load(dir.path().join("absent.json")).is_empty());
    }
}
