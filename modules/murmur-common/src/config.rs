use std::env;
use std::path::PathBuf;

use tracing::info;

/// Mirror endpoints tried in priority order when none are configured.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://nitter.net",
    "https://nitter.42l.fr",
    "https://nitter.pussthecat.org",
    "https://nitter.nixnet.services",
    "https://nitter.fdn.fr",
];

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Crawling
    pub endpoints: Vec<String>,
    pub data_file: PathBuf,
    pub screenshot_dir: PathBuf,
    pub headless: bool,

    // Reply pipeline
    pub openai_api_key: String,
    pub openai_model: String,
    pub x_bearer_token: String,
}

impl Config {
    /// Load configuration for crawling. Reply-pipeline credentials stay
    /// empty; use [`Config::reply_from_env`] when they are needed.
    pub fn from_env() -> Self {
        Self {
            endpoints: endpoints_from_env(),
            data_file: env::var("MURMUR_DATA_FILE")
                .unwrap_or_else(|_| "crawled_posts.json".to_string())
                .into(),
            screenshot_dir: env::var("MURMUR_SCREENSHOT_DIR")
                .unwrap_or_else(|_| "screenshots".to_string())
                .into(),
            headless: env::var("MURMUR_HEADLESS").map_or(true, |v| v != "false" && v != "0"),
            openai_api_key: String::new(),
            openai_model: String::new(),
            x_bearer_token: String::new(),
        }
    }

    /// Load configuration for the reply pipeline.
    /// Panics with a clear message if required credentials are missing.
    pub fn reply_from_env() -> Self {
        Self {
            openai_api_key: required_env("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
            x_bearer_token: required_env("X_BEARER_TOKEN"),
            ..Self::from_env()
        }
    }

    pub fn log_redacted(&self) {
        info!(
            endpoints = self.endpoints.len(),
            data_file = %self.data_file.display(),
            screenshot_dir = %self.screenshot_dir.display(),
            headless = self.headless,
            openai_key_set = !self.openai_api_key.is_empty(),
            x_token_set = !self.x_bearer_token.is_empty(),
            "Configuration loaded"
        );
    }
}

fn endpoints_from_env() -> Vec<String> {
    match env::var("MURMUR_ENDPOINTS") {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
