use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;

use error::Result;

// Observed posts

/// One fetched observation of a post. `id` is stable across fetches and is the
/// join key for every piece of durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_handle: String,
    pub created_at: DateTime<Utc>,
    pub likes: u64,
    pub reshares: u64,
    pub replies: u64,
    pub quotes: u64,
    pub url: String,
}

impl Post {
    /// Saturates instead of overflowing on absurd provider counters.
    pub fn total_engagement(&self) -> u64 {
        self.likes
            .saturating_add(self.reshares)
            .saturating_add(self.replies)
            .saturating_add(self.quotes)
    }

    pub fn canonical_url(handle: &str, id: &str) -> String {
        format!("https://x.com/{}/status/{}", handle, id)
    }
}

// Alerts

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    RapidGrowth,
    ThresholdReached,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::RapidGrowth => "rapid_growth",
            AlertType::ThresholdReached => "threshold_reached",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertType::RapidGrowth => "Rapid Growth",
            AlertType::ThresholdReached => "Threshold Reached",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAlert {
    pub post: Post,
    pub alert_type: AlertType,
    pub previous_engagement: Option<u64>,
    pub current_engagement: u64,
    /// Engagement per hour between the oldest and newest retained sample.
    pub growth_rate: Option<f64>,
    pub detected_at: DateTime<Utc>,
    pub matched_keyword: Option<String>,
}

// Ranking

/// The reduced view of a post handed to the ranking model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    pub text: String,
    pub author_handle: String,
    pub total_engagement: u64,
    pub url: String,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            text: post.text.clone(),
            author_handle: post.author_handle.clone(),
            total_engagement: post.total_engagement(),
            url: post.url.clone(),
        }
    }
}

impl From<&TrendAlert> for PostSummary {
    fn from(alert: &TrendAlert) -> Self {
        let mut summary = PostSummary::from(&alert.post);
        summary.total_engagement = alert.current_engagement;
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    HighPriority,
    Suggested,
    Optional,
    ObserveOnly,
    AnalysisFailed,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::HighPriority => "high_priority",
            RecommendedAction::Suggested => "suggested",
            RecommendedAction::Optional => "optional",
            RecommendedAction::ObserveOnly => "observe_only",
            RecommendedAction::AnalysisFailed => "analysis_failed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecommendedAction::HighPriority => "High priority reply",
            RecommendedAction::Suggested => "Suggested reply",
            RecommendedAction::Optional => "Optional reply",
            RecommendedAction::ObserveOnly => "Observe only",
            RecommendedAction::AnalysisFailed => "Analysis failed",
        }
    }

    /// Lenient parse of whatever label the model returned. Unknown labels
    /// degrade to `ObserveOnly`.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "high_priority" | "high_priority_reply" | "high" => RecommendedAction::HighPriority,
            "suggested" | "suggested_reply" | "reply" => RecommendedAction::Suggested,
            "optional" | "optional_reply" => RecommendedAction::Optional,
            "analysis_failed" => RecommendedAction::AnalysisFailed,
            _ => RecommendedAction::ObserveOnly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAnalysis {
    pub translated_text: String,
    /// 1-10, 0 when the post was never scored.
    pub relevance_score: u8,
    /// 1-10, 0 when the post was never scored.
    pub engagement_potential: u8,
    pub recommended_action: RecommendedAction,
    pub reasoning: String,
    pub reply_angle: String,
}

impl PostAnalysis {
    pub fn failed() -> Self {
        Self {
            translated_text: String::new(),
            relevance_score: 0,
            engagement_potential: 0,
            recommended_action: RecommendedAction::AnalysisFailed,
            reasoning: "analysis failed".to_string(),
            reply_angle: String::new(),
        }
    }

    pub fn priority_score(&self) -> f64 {
        0.6 * self.relevance_score as f64 + 0.4 * self.engagement_potential as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPost {
    pub post: PostSummary,
    pub analysis: PostAnalysis,
    /// 1-based, dense.
    pub priority_rank: usize,
}

// Collaborator seams

/// Where posts come from. Provider errors are returned, and the scanner
/// decides whether they are fatal.
#[async_trait]
pub trait PostSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Post>>;
    async fn user_posts(&self, handle: &str, max_results: usize) -> Result<Vec<Post>>;
    async fn post_by_id(&self, id: &str) -> Result<Option<Post>>;
}

/// Delivery of rendered content. Implementations log their own failures and
/// report them through the returned flag only.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, to: &str, subject: &str, html_body: &str, text_body: &str) -> bool;
}

/// External scoring of a batch of posts. Returned indices refer to positions in
/// the input slice; posts may be missing from the answer.
#[async_trait]
pub trait PostAnalyzer: Send + Sync {
    async fn analyze(&self, posts: &[PostSummary]) -> Result<Vec<(usize, PostAnalysis)>>;
}
