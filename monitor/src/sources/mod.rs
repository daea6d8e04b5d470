pub mod official;
pub mod rapidapi;
pub mod scripted;

pub use official::OfficialApiSource;
pub use rapidapi::RapidApiSource;
pub use scripted::ScriptedPostSource;

use crate::config::Credentials;
use once_cell::sync::OnceCell;
use reqwest::Client;
use shared_models::error::{ModelError, Result};
use shared_models::PostSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSourceKind {
    OfficialApi,
    RapidApi,
}

/// First provider whose credentials are present, in preference order.
pub fn probe_post_source(credentials: &Credentials) -> Option<PostSourceKind> {
    const PROBES: [(PostSourceKind, fn(&Credentials) -> bool); 2] = [
        (PostSourceKind::OfficialApi, has_bearer_token),
        (PostSourceKind::RapidApi, has_rapidapi_key),
    ];
    PROBES
        .iter()
        .find(|(_, available)| available(credentials))
        .map(|(kind, _)| *kind)
}

fn has_bearer_token(credentials: &Credentials) -> bool {
    credentials.twitter_bearer_token.is_some()
}

fn has_rapidapi_key(credentials: &Credentials) -> bool {
    credentials.rapidapi_key.is_some()
}

pub fn build_post_source(credentials: &Credentials) -> Result<Arc<dyn PostSource>> {
    let client = http_client()?.clone();
    match probe_post_source(credentials) {
        Some(PostSourceKind::OfficialApi) => {
            info!("Using official X API v2");
            let token = credentials.twitter_bearer_token.clone().unwrap_or_default();
            Ok(Arc::new(OfficialApiSource::new(client, token)))
        }
        Some(PostSourceKind::RapidApi) => {
            info!(host = %credentials.rapidapi_host, "Using RapidAPI");
            let key = credentials.rapidapi_key.clone().unwrap_or_default();
            Ok(Arc::new(RapidApiSource::new(
                client,
                key,
                credentials.rapidapi_host.clone(),
            )))
        }
        None => Err(ModelError::Config(
            "No post source credentials found. Set TWITTER_BEARER_TOKEN or RAPIDAPI_KEY".into(),
        )),
    }
}

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared HTTP client for every outbound provider call.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("trend-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ModelError::Network(format!("Failed to create HTTP client: {}", e)))
    })
}

/// Provider counters arrive as numbers, numeric strings, or not at all.
pub(crate) fn lenient_count(value: Option<&serde_json::Value>) -> u64 {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().replace(',', "").parse().unwrap_or(0),
        _ => 0,
    }
}
