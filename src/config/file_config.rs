use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub media_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub seed_file: Option<String>,
    pub log_page_size: Option<usize>,
    pub public_base_url: Option<String>,

    // Collaborators
    pub review_generator: Option<ReviewGeneratorConfig>,
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ReviewGeneratorConfig {
    /// Base URL of an OpenAI-compatible API, e.g. "https://api.openai.com/v1".
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout_sec: Option<u64>,
}

/// A user allowed to call the API, identified by a bearer token.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UserConfig {
    pub token: String,
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
