use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapsError>;

#[derive(Debug, Error)]
pub enum MapsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Provider status {code}: {message}")]
    Status { code: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl MapsError {
    /// Transient failures get exactly one retry; 4xx and denied requests
    /// never do.
    pub fn is_transient(&self) -> bool {
        match self {
            MapsError::Network(_) => true,
            MapsError::Api { status, .. } => *status >= 500,
            MapsError::Status { code, .. } => {
                code == "OVER_QUERY_LIMIT" || code == "UNKNOWN_ERROR"
            }
            MapsError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for MapsError {
    fn from(err: reqwest::Error) -> Self {
        MapsError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for MapsError {
    fn from(err: serde_json::Error) -> Self {
        MapsError::Parse(err.to_string())
    }
}
