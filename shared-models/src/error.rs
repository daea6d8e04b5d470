use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Configuration Error: {0}")]
    Config(String),
    #[error("Network Error: {0}")]
    Network(String),
    #[error("Provider Error: {0}")]
    Provider(String),
    #[error("Storage Error: {0}")]
    Storage(String),
    #[error("Serialization Error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Notification Error: {0}")]
    Notification(String),
    #[error("Analysis Error: {0}")]
    Analysis(String),
    #[error("Lock Error: {0}")]
    Lock(String),
    #[error("Metrics Error: {0}")]
    Metrics(String),
}

impl From<prometheus::Error> for ModelError {
    fn from(error: prometheus::Error) -> Self {
        ModelError::Metrics(error.to_string())
    }
}

impl ModelError {
    /// Configuration and lock problems abort a run before anything is fetched.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModelError::Config(_) | ModelError::Lock(_))
    }
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
