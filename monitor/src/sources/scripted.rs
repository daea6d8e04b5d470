use async_trait::async_trait;
use shared_models::error::{ModelError, Result};
use shared_models::{Post, PostSource};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Canned responses keyed by query or handle. Used for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPostSource {
    searches: HashMap<String, Vec<Post>>,
    timelines: HashMap<String, Vec<Post>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
}

impl ScriptedPostSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: &str, posts: Vec<Post>) -> Self {
        self.searches.insert(query.to_string(), posts);
        self
    }

    pub fn with_user(mut self, handle: &str, posts: Vec<Post>) -> Self {
        self.timelines.insert(handle.to_string(), posts);
        self
    }

    /// Makes every request for `query_or_handle` fail.
    pub fn failing_search(mut self, query_or_handle: &str) -> Self {
        self.failing.insert(query_or_handle.to_string());
        self
    }

    /// Holds every request for `query_or_handle` back by `delay`.
    pub fn with_delay(mut self, query_or_handle: &str, delay: Duration) -> Self {
        self.delays.insert(query_or_handle.to_string(), delay);
        self
    }

    async fn check(&self, key: &str) -> Result<()> {
        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(key) {
            return Err(ModelError::Provider(format!("scripted failure for {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl PostSource for ScriptedPostSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Post>> {
        self.check(query).await?;
        Ok(self
            .searches
            .get(query)
            .map(|posts| posts.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }

    async fn user_posts(&self, handle: &str, max_results: usize) -> Result<Vec<Post>> {
        self.check(handle).await?;
        Ok(self
            .timelines
            .get(handle)
            .map(|posts| posts.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }

    async fn post_by_id(&self, id: &str) -> Result<Option<Post>> {
        self.check(id).await?;
        Ok(self
            .searches
            .values()
            .chain(self.timelines.values())
            .flatten()
            .find(|p| p.id == id)
            .cloned())
    }
}
