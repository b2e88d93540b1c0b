use thiserror::Error;

#[derive(Error, Debug)]
pub enum CafeScoutError {
    #[error("Unknown filter key: {0}")]
    InvalidFilterKey(String),

    #[error("Could not resolve location: {0}")]
    LocationNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
