//! Application configuration.
//!
//! Paths default under `~/Comunia/`; runtime settings come from the
//! environment with sensible local-development defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Comunia";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory (~/Comunia/)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Comunia")
}

/// Get the default database path
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("comunia.db")
}

/// Get the default blob storage root
pub fn default_blob_root() -> PathBuf {
    app_data_dir().join("blobs")
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub blob_root: PathBuf,
    pub ai_base_url: String,
    pub ai_model: String,
    pub ai_timeout_secs: u64,
    pub auth_base_url: String,
    /// Price per 1M prompt tokens, USD. Zero for local models.
    pub prompt_token_price: f64,
    /// Price per 1M completion tokens, USD. Zero for local models.
    pub completion_token_price: f64,
    pub ocr_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_var("COMUNIA_BIND_ADDR")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| "127.0.0.1:8080".parse().unwrap()),
            db_path: env_var("COMUNIA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            blob_root: env_var("COMUNIA_BLOB_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(default_blob_root),
            ai_base_url: env_var("COMUNIA_AI_URL")
                .unwrap_or_else(|| "http://localhost:11434".into()),
            ai_model: env_var("COMUNIA_AI_MODEL").unwrap_or_else(|| "llama3.2".into()),
            ai_timeout_secs: env_var("COMUNIA_AI_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
            auth_base_url: env_var("COMUNIA_AUTH_URL")
                .unwrap_or_else(|| "http://localhost:9999".into()),
            prompt_token_price: env_var("COMUNIA_PROMPT_TOKEN_PRICE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            completion_token_price: env_var("COMUNIA_COMPLETION_TOKEN_PRICE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            ocr_timeout_secs: env_var("COMUNIA_OCR_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Comunia"));
    }

    #[test]
    fn default_paths_under_app_data() {
        assert!(default_db_path().starts_with(app_data_dir()));
        assert!(default_blob_root().ends_with("blobs"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
