use super::lenient_count;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use shared_models::error::{ModelError, Result};
use shared_models::{Post, PostSource};
use tracing::debug;

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Third-party scraping API exposed through RapidAPI (twitter-api45 shape).
pub struct RapidApiSource {
    client: Client,
    api_key: String,
    host: String,
}

impl RapidApiSource {
    pub fn new(client: Client, api_key: String, host: String) -> Self {
        Self {
            client,
            api_key,
            host,
        }
    }

    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .client
            .get(format!("https://{}/{}", self.host, endpoint))
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .query(query)
            .send()
            .await
            .map_err(|e| ModelError::Network(format!("RapidAPI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Provider(format!(
                "RapidAPI {} returned {}: {}",
                endpoint, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::Provider(format!("RapidAPI {} returned bad JSON: {}", endpoint, e)))
    }
}

fn string_field(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match data.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// First non-zero counter among the aliases.
fn count_field(data: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .map(|key| lenient_count(data.get(*key)))
        .find(|count| *count > 0)
        .unwrap_or(0)
}

fn parse_post(data: &Value, fallback_handle: Option<&str>) -> Option<Post> {
    let id = string_field(data, &["tweet_id", "id"])?;
    let handle = string_field(data, &["screen_name", "username"])
        .or_else(|| fallback_handle.map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    let created_at = data
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_str(raw, CREATED_AT_FORMAT).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(Post {
        url: Post::canonical_url(&handle, &id),
        text: string_field(data, &["text"]).unwrap_or_default(),
        author_id: string_field(data, &["user_id"]).unwrap_or_default(),
        author_handle: handle,
        created_at,
        likes: count_field(data, &["favorites", "like_count"]),
        reshares: count_field(data, &["retweets", "retweet_count"]),
        replies: count_field(data, &["replies", "reply_count"]),
        quotes: count_field(data, &["quotes", "quote_count"]),
        id,
    })
}

fn parse_listing(body: &Value, max_results: usize, fallback_handle: Option<&str>) -> Vec<Post> {
    let items = ["timeline", "tweets"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_array))
        .find(|items| !items.is_empty());

    items
        .map(|items| {
            items
                .iter()
                .take(max_results)
                .filter_map(|item| parse_post(item, fallback_handle))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PostSource for RapidApiSource {
    fn name(&self) -> &'static str {
        "rapidapi"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Post>> {
        let body = self
            .get("search.php", &[("query", query), ("search_type", "Latest")])
            .await?;
        let posts = parse_listing(&body, max_results, None);
        debug!(%query, count = posts.len(), "RapidAPI search");
        Ok(posts)
    }

    async fn user_posts(&self, handle: &str, max_results: usize) -> Result<Vec<Post>> {
        let body = self.get("timeline.php", &[("screenname", handle)]).await?;
        // The timeline endpoint omits screen_name on each item.
        Ok(parse_listing(&body, max_results, Some(handle)))
    }

    async fn post_by_id(&self, id: &str) -> Result<Option<Post>> {
        let body = self.get("tweet.php", &[("id", id)]).await?;
        Ok(parse_post(&body, None))
    }
}
