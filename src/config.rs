//! Runtime configuration for the storymill server.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the HTTP server.
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    /// Root under which per-run working directories are created.
    pub workdir_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4200,
            db_path: PathBuf::from("storymill.db"),
            dev_mode: false,
            workdir_root: std::env::temp_dir(),
        }
    }
}

/// Settings for the external generation service. Loaded from the
/// environment; an absent credential is a fatal precondition for every
/// generation endpoint, checked before any I/O.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Transport-level timeout. Individual generation calls are not
    /// otherwise deadline-wrapped.
    pub timeout: Duration,
}

impl GenerationSettings {
    /// Read settings from the environment. Returns `None` when no credential
    /// is configured.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self {
            api_key,
            base_url: std::env::var("STORYMILL_GENERATION_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            model: std::env::var("STORYMILL_GENERATION_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            timeout: Duration::from_secs(300),
        })
    }
}
