use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};

fn default_target_url() -> String {
    "https://metal.com/Silver/20110225392".to_string()
}

fn default_csv_dir() -> PathBuf {
    PathBuf::from("csv")
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_render_timeout_secs() -> u64 {
    10
}

fn default_ready_marker() -> String {
    crate::extract::UNIT_MARKER.to_string()
}

/// Capture settings, loaded from env vars (`.env` honored when present).
/// Every field has a default so a bare run captures the SMM silver quote
/// page into `csv/` and `screenshots/`.
#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_target_url")]
    pub target_url: String,
    #[serde(default = "default_csv_dir")]
    pub csv_dir: PathBuf,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,
    /// Text that must appear in the rendered page before it counts as ready.
    /// Empty string disables the marker check.
    #[serde(default = "default_ready_marker")]
    pub ready_marker: String,
}

impl CaptureConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_env()
    }
}

// Extension trait.
pub trait LoadFromEnv: DeserializeOwned {
    fn load_from_env() -> anyhow::Result<Self> {
        // Don't throw an error if .env file doesn't exist.
        let _ = dotenv::dotenv();
        let config =
            envy::from_env::<Self>().context("failed to load env variables into config struct")?;
        Ok(config)
    }
}

impl<T: DeserializeOwned> LoadFromEnv for T {}
