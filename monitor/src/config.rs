use serde::{Deserialize, Serialize};
use shared_models::error::{ModelError, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_RAPIDAPI_HOST: &str = "twitter-api45.p.rapidapi.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Monitoring rules. Loaded from a JSON file; every field has a default so a
/// partial file (or no file at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keywords: Vec<String>,
    pub followed_accounts: Vec<String>,
    /// Engagement per hour.
    pub rapid_growth_threshold: f64,
    /// Total engagement.
    pub absolute_threshold: u64,
    /// Informational; the external scheduler owns the cadence.
    pub check_interval_minutes: u32,
    pub max_results: usize,
    pub history_path: PathBuf,
    pub alerted_path: PathBuf,
    pub analysis_context: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keywords: vec![
                "AI".to_string(),
                "GPT".to_string(),
                "LLM".to_string(),
                "data analytics".to_string(),
            ],
            followed_accounts: Vec::new(),
            rapid_growth_threshold: 1000.0,
            absolute_threshold: 5000,
            check_interval_minutes: 15,
            max_results: 100,
            history_path: PathBuf::from("engagement_history.json"),
            alerted_path: PathBuf::from("alerted_tweets.json"),
            analysis_context: "We build AI products for enterprise knowledge work and want to \
                               join conversations where our experience is genuinely useful."
                .to_string(),
        }
    }
}

impl Config {
    /// Reads `path` if it exists, otherwise returns the defaults. A file that
    /// exists but does not parse is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            ModelError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            ModelError::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Resolves the path from an explicit argument, then `CONFIG_PATH`, then
    /// the default, and loads and validates it.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var("CONFIG_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(&path)?.validate()
    }

    pub fn validate(mut self) -> Result<Self> {
        macro_rules! ensure {
            ($cond:expr, $msg:literal) => {
                if !$cond {
                    return Err(ModelError::Config($msg.into()));
                }
            };
        }

        self.keywords.retain(|k| !k.trim().is_empty());
        self.followed_accounts.retain(|a| !a.trim().is_empty());
        for account in self.followed_accounts.iter_mut() {
            *account = account.trim().trim_start_matches('@').to_string();
        }

        ensure!(
            !self.keywords.is_empty() || !self.followed_accounts.is_empty(),
            "no keywords or followed accounts configured"
        );
        ensure!(
            self.rapid_growth_threshold.is_finite() && self.rapid_growth_threshold > 0.0,
            "rapid_growth_threshold must be > 0"
        );
        ensure!(self.absolute_threshold > 0, "absolute_threshold must be > 0");
        ensure!(
            (1..=100).contains(&self.max_results),
            "max_results must be in 1..=100"
        );

        Ok(self)
    }

    /// Places relative state files under `dir`.
    pub fn with_state_dir(mut self, dir: &Path) -> Self {
        if self.history_path.is_relative() {
            self.history_path = dir.join(&self.history_path);
        }
        if self.alerted_path.is_relative() {
            self.alerted_path = dir.join(&self.alerted_path);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Secrets and provider endpoints. Only ever read from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub twitter_bearer_token: Option<String>,
    pub rapidapi_key: Option<String>,
    pub rapidapi_host: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from: String,
    pub ses_smtp: Option<SmtpSettings>,
    pub smtp: Option<SmtpSettings>,
    pub notify_email: Option<String>,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Credentials {
    pub fn from_env() -> Self {
        let ses_smtp = match (non_empty("SES_SMTP_USERNAME"), non_empty("SES_SMTP_PASSWORD")) {
            (Some(username), Some(password)) => {
                let region = non_empty("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string());
                Some(SmtpSettings {
                    host: format!("email-smtp.{}.amazonaws.com", region),
                    port: 587,
                    username,
                    password,
                    from: non_empty("SES_FROM_EMAIL")
                        .unwrap_or_else(|| "noreply@example.com".to_string()),
                })
            }
            _ => None,
        };

        let smtp = match (non_empty("SMTP_USER"), non_empty("SMTP_PASSWORD")) {
            (Some(username), Some(password)) => {
                let port = match non_empty("SMTP_PORT").map(|p| p.parse::<u16>()) {
                    Some(Ok(port)) => port,
                    Some(Err(e)) => {
                        warn!(error = %e, "Invalid SMTP_PORT, falling back to 587");
                        587
                    }
                    None => 587,
                };
                Some(SmtpSettings {
                    host: non_empty("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                    port,
                    from: non_empty("SMTP_FROM").unwrap_or_else(|| username.clone()),
                    username,
                    password,
                })
            }
            _ => None,
        };

        Self {
            twitter_bearer_token: non_empty("TWITTER_BEARER_TOKEN"),
            rapidapi_key: non_empty("RAPIDAPI_KEY"),
            rapidapi_host: non_empty("RAPIDAPI_HOST")
                .unwrap_or_else(|| DEFAULT_RAPIDAPI_HOST.to_string()),
            gemini_api_key: non_empty("GOOGLE_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")),
            gemini_model: non_empty("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            sendgrid_api_key: non_empty("SENDGRID_API_KEY"),
            sendgrid_from: non_empty("SENDGRID_FROM_EMAIL")
                .unwrap_or_else(|| "noreply@example.com".to_string()),
            ses_smtp,
            smtp,
            notify_email: non_empty("NOTIFY_EMAIL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.keywords.len(), 4);
        assert_eq!(config.absolute_threshold, 5000);
        assert_eq!(config.rapid_growth_threshold, 1000.0);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"keywords": ["rust"], "absolute_threshold": 42}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.keywords, vec!["rust".to_string()]);
        assert_eq!(config.absolute_threshold, 42);
        assert_eq!(config.max_results, 100);
    }

    #[test]
    fn unparseable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ModelError::Config(_))));
    }

    #[test]
    fn nothing_to_scan_is_rejected() {
        let config = Config {
            keywords: vec!["  ".into()],
            followed_accounts: vec![],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ModelError::Config(_))));
    }

    #[test]
    fn account_handles_are_normalized() {
        let config = Config {
            followed_accounts: vec![" @someone ".into()],
            ..Config::default()
        }
        .validate()
        .unwrap();
        assert_eq!(config.followed_accounts, vec!["someone".to_string()]);
    }

    #[test]
    fn state_dir_only_moves_relative_paths() {
        let config = Config {
            alerted_path: PathBuf::from("/abs/alerted.json"),
            ..Config::default()
        }
        .with_state_dir(Path::new("/var/lib/monitor"));
        assert_eq!(
            config.history_path,
            PathBuf::from("/var/lib/monitor/engagement_history.json")
        );
        assert_eq!(config.alerted_path, PathBuf::from("/abs/alerted.json"));
    }
}
