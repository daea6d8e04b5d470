use crate::config::Credentials;
use crate::sources::http_client;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_models::error::{ModelError, Result};
use shared_models::{AnalyzedPost, PostAnalysis, PostAnalyzer, PostSummary, RecommendedAction};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Posts per model request.
pub const MAX_BATCH: usize = 20;

const MAX_PROMPT_TEXT_CHARS: usize = 500;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// One entry of the model's JSON answer. Everything but the index is optional.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(alias = "tweet_index")]
    post_index: i64,
    #[serde(default)]
    translated_text: String,
    #[serde(default)]
    relevance_score: f64,
    #[serde(default)]
    engagement_potential: f64,
    #[serde(default)]
    recommended_action: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default, alias = "suggested_reply_angle")]
    reply_angle: String,
}

fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 10.0) as u8
}

impl RawAnalysis {
    fn into_analysis(self) -> PostAnalysis {
        PostAnalysis {
            translated_text: self.translated_text,
            relevance_score: clamp_score(self.relevance_score),
            engagement_potential: clamp_score(self.engagement_potential),
            recommended_action: RecommendedAction::parse_lenient(&self.recommended_action),
            reasoning: self.reasoning,
            reply_angle: self.reply_angle,
        }
    }
}

/// Strips a fenced code block if the model wrapped its answer in one.
pub(crate) fn extract_json(raw: &str) -> &str {
    match FENCED_JSON.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => raw.trim(),
    }
}

/// Parses a batch answer. `post_index` is 1-based within the batch. Entries
/// that are malformed or point outside the batch are dropped one by one.
pub(crate) fn parse_analyses(raw: &str, batch_len: usize) -> Result<Vec<(usize, PostAnalysis)>> {
    let entries: Vec<Value> = serde_json::from_str(extract_json(raw))
        .map_err(|e| ModelError::Analysis(format!("model returned unparsable JSON: {}", e)))?;

    Ok(entries
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawAnalysis>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping malformed analysis entry");
                None
            }
        })
        .filter_map(|entry| {
            let idx = usize::try_from(entry.post_index).ok()?.checked_sub(1)?;
            (idx < batch_len).then(|| (idx, entry.into_analysis()))
        })
        .collect())
}

/// Google Gemini through the public REST endpoint.
pub struct GeminiAnalyzer {
    client: Client,
    api_key: String,
    model: String,
    context: String,
}

impl GeminiAnalyzer {
    pub fn new(client: Client, api_key: String, model: String, context: String) -> Self {
        Self {
            client,
            api_key,
            model,
            context,
        }
    }

    fn build_prompt(&self, posts: &[PostSummary]) -> String {
        let mut listing = String::new();
        for (i, post) in posts.iter().enumerate() {
            let text: String = post.text.chars().take(MAX_PROMPT_TEXT_CHARS).collect();
            let _ = write!(
                listing,
                "[Post {}]\nAuthor: @{}\nEngagement: {}\nURL: {}\nText: {}\n\n",
                i + 1,
                post.author_handle,
                post.total_engagement,
                post.url,
                text
            );
        }

        format!(
            "You are a social media strategist. Decide which of the following posts are worth \
             engaging with.\n\n{context}\n\n---\n\nPosts:\n\n{listing}---\n\n\
             Answer with a JSON array only, one object per post:\n\
             [{{\"post_index\": 1, \"translated_text\": \"...\", \"relevance_score\": 8, \
             \"engagement_potential\": 7, \"recommended_action\": \"high_priority\", \
             \"reasoning\": \"...\", \"reply_angle\": \"...\"}}]\n\n\
             relevance_score (1-10): relevance to the context above.\n\
             engagement_potential (1-10): expected reach of a reply.\n\
             recommended_action: one of high_priority, suggested, optional, observe_only.",
            context = self.context,
            listing = listing,
        )
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/{}:generateContent", API_BASE, self.model);
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": 0.3}
        });

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Analysis(format!("Gemini returned {}: {}", status, body)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Analysis(format!("Gemini returned bad JSON: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(ModelError::Analysis("Gemini returned an empty answer".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl PostAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, posts: &[PostSummary]) -> Result<Vec<(usize, PostAnalysis)>> {
        let mut analyses = Vec::with_capacity(posts.len());
        let mut last_error = None;
        let mut succeeded = 0usize;

        for (batch_no, batch) in posts.chunks(MAX_BATCH).enumerate() {
            let offset = batch_no * MAX_BATCH;
            let answer = match self.generate(&self.build_prompt(batch)).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(batch = batch_no, error = %e, "Gemini batch failed");
                    last_error = Some(e);
                    continue;
                }
            };
            match parse_analyses(&answer, batch.len()) {
                Ok(parsed) => {
                    debug!(batch = batch_no, analysed = parsed.len(), "Gemini batch parsed");
                    succeeded += 1;
                    analyses.extend(parsed.into_iter().map(|(i, a)| (offset + i, a)));
                }
                Err(e) => {
                    warn!(batch = batch_no, error = %e, "Gemini batch unparsable");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(analyses),
        }
    }
}

pub fn build_analyzer(
    credentials: &Credentials,
    context: &str,
) -> Result<Option<Arc<dyn PostAnalyzer>>> {
    let Some(api_key) = credentials.gemini_api_key.clone() else {
        info!("No Gemini API key, posts will be left unranked");
        return Ok(None);
    };
    info!(model = %credentials.gemini_model, "🤖 Gemini analyzer ready");
    Ok(Some(Arc::new(GeminiAnalyzer::new(
        http_client()?.clone(),
        api_key,
        credentials.gemini_model.clone(),
        context.to_string(),
    ))))
}

/// Scores and orders `posts`. Every input post is present in the output:
/// posts without an analysis carry [`PostAnalysis::failed`].
pub async fn rank_posts(
    posts: &[PostSummary],
    analyzer: Option<&dyn PostAnalyzer>,
) -> Vec<AnalyzedPost> {
    if posts.is_empty() {
        return Vec::new();
    }

    let analyses = match analyzer {
        Some(analyzer) => match analyzer.analyze(posts).await {
            Ok(analyses) => analyses,
            Err(e) => {
                warn!(error = %e, posts = posts.len(), "Ranking failed, using fallback");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let mut slots: Vec<Option<PostAnalysis>> = vec![None; posts.len()];
    for (idx, mut analysis) in analyses {
        match slots.get_mut(idx) {
            Some(slot) if slot.is_none() => {
                analysis.relevance_score = analysis.relevance_score.min(10);
                analysis.engagement_potential = analysis.engagement_potential.min(10);
                *slot = Some(analysis);
            }
            _ => debug!(index = idx, "Ignoring duplicate or out-of-range analysis"),
        }
    }

    let mut ranked: Vec<AnalyzedPost> = posts
        .iter()
        .zip(slots)
        .map(|(post, analysis)| AnalyzedPost {
            post: post.clone(),
            analysis: analysis.unwrap_or_else(PostAnalysis::failed),
            priority_rank: 0,
        })
        .collect();

    // sort_by is stable, ties keep input order
    ranked.sort_by(|a, b| {
        b.analysis
            .priority_score()
            .total_cmp(&a.analysis.priority_score())
    });
    for (i, post) in ranked.iter_mut().enumerate() {
        post.priority_rank = i + 1;
    }
    ranked
}
