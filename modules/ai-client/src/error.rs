use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty completion: the model returned no usable choice")]
    EmptyCompletion,
}

impl AiError {
    /// Transient server-side failures are worth exactly one retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AiError::Api { status, .. } if *status >= 500)
            || matches!(self, AiError::Network(_))
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::Parse(err.to_string())
    }
}
