use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Reasoning provider (OpenAI-compatible endpoint)
    pub github_token: String,
    pub model_name: String,
    pub openai_base_url: String,

    // Maps provider
    pub google_maps_api_key: String,

    // Web server
    pub host: String,
    pub port: u16,

    // Search tuning
    pub search_radius_m: u32,
    pub candidate_pool: usize,
    pub max_places: usize,
    pub max_photos: usize,

    // Conversation tuning
    pub session_capacity: usize,
    pub history_window: usize,

    // Outbound timeouts
    pub maps_timeout: Duration,
    pub reasoning_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            github_token: required_env("GITHUB_TOKEN"),
            model_name: env::var("MODEL_NAME")
                .unwrap_or_else(|_| "openai/gpt-4.1-mini".to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://models.github.ai/inference".to_string()),
            google_maps_api_key: required_env("GOOGLE_MAPS_API_KEY"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .expect("PORT must be a number"),
            search_radius_m: 1500,
            candidate_pool: 20,
            max_places: 5,
            max_photos: 1,
            session_capacity: 50,
            history_window: 6,
            maps_timeout: Duration::from_secs(5),
            reasoning_timeout: Duration::from_secs(30),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
