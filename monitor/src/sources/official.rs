use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use shared_models::error::{ModelError, Result};
use shared_models::{Post, PostSource};
use std::collections::HashMap;
use tracing::debug;

const BASE_URL: &str = "https://api.twitter.com/2";
const TWEET_FIELDS: &str = "created_at,public_metrics,author_id";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    includes: Option<Includes>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    quote_count: u64,
}

/// X API v2 with an app-only bearer token.
pub struct OfficialApiSource {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl OfficialApiSource {
    pub fn new(client: Client, bearer_token: String) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            bearer_token,
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse<T>> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ModelError::Network(format!("X API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Provider(format!(
                "X API {} returned {}: {}",
                path, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::Provider(format!("X API {} returned bad JSON: {}", path, e)))
    }

    fn tweet_query(max_results: usize, floor: usize) -> Vec<(&'static str, String)> {
        vec![
            ("max_results", max_results.clamp(floor, 100).to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", "username".to_string()),
        ]
    }
}

fn handles_by_id(includes: Option<Includes>) -> HashMap<String, String> {
    includes
        .unwrap_or_default()
        .users
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect()
}

fn into_post(tweet: ApiTweet, handles: &HashMap<String, String>) -> Post {
    let author_id = tweet.author_id.unwrap_or_default();
    let handle = handles.get(&author_id).cloned();
    let metrics = tweet.public_metrics.unwrap_or_default();
    // The canonical URL resolves through /i/ when the author is unknown.
    let url = Post::canonical_url(handle.as_deref().unwrap_or("i"), &tweet.id);
    Post {
        url,
        author_handle: handle.unwrap_or_else(|| "unknown".to_string()),
        author_id,
        created_at: tweet.created_at.unwrap_or_else(Utc::now),
        likes: metrics.like_count,
        reshares: metrics.retweet_count,
        replies: metrics.reply_count,
        quotes: metrics.quote_count,
        text: tweet.text,
        id: tweet.id,
    }
}

fn into_posts(response: ApiResponse<Vec<ApiTweet>>, max_results: usize) -> Vec<Post> {
    let handles = handles_by_id(response.includes);
    response
        .data
        .unwrap_or_default()
        .into_iter()
        .take(max_results)
        .map(|t| into_post(t, &handles))
        .collect()
}

#[async_trait]
impl PostSource for OfficialApiSource {
    fn name(&self) -> &'static str {
        "x_api_v2"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Post>> {
        let mut params = Self::tweet_query(max_results, 10);
        params.push(("query", query.to_string()));
        let response: ApiResponse<Vec<ApiTweet>> =
            self.get("/tweets/search/recent", &params).await?;
        let posts = into_posts(response, max_results);
        debug!(%query, count = posts.len(), "X API search");
        Ok(posts)
    }

    async fn user_posts(&self, handle: &str, max_results: usize) -> Result<Vec<Post>> {
        let user: ApiResponse<ApiUser> = self
            .get(&format!("/users/by/username/{}", handle), &[])
            .await?;
        let Some(user) = user.data else {
            return Ok(Vec::new());
        };

        let response: ApiResponse<Vec<ApiTweet>> = self
            .get(
                &format!("/users/{}/tweets", user.id),
                &Self::tweet_query(max_results, 5),
            )
            .await?;

        let handles = HashMap::from([(user.id, handle.to_string())]);
        Ok(response
            .data
            .unwrap_or_default()
            .into_iter()
            .take(max_results)
            .map(|t| into_post(t, &handles))
            .collect())
    }

    async fn post_by_id(&self, id: &str) -> Result<Option<Post>> {
        let mut params = Self::tweet_query(10, 10);
        params.retain(|(k, _)| *k != "max_results");
        let response: ApiResponse<ApiTweet> = self.get(&format!("/tweets/{}", id), &params).await?;
        let handles = handles_by_id(response.includes);
        Ok(response.data.map(|t| into_post(t, &handles)))
    }
}
