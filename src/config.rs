use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

/// Hosted agent the client talks to when nothing is configured.
pub const DEFAULT_AGENT_URL: &str = "https://millions-screeching-vultur.mastra.cloud";
pub const DEFAULT_AGENT_ID: &str = "weatherAgent";
pub const DEFAULT_THREAD_ID: u64 = 2;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub agent_url: Option<String>,
    pub agent_id: Option<String>,
    pub thread_id: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("weather-chat").join("config.json"))
    }

    pub fn agent_url(&self) -> &str {
        self.agent_url.as_deref().unwrap_or(DEFAULT_AGENT_URL)
    }

    pub fn agent_id(&self) -> &str {
        self.agent_id.as_deref().unwrap_or(DEFAULT_AGENT_ID)
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id.unwrap_or(DEFAULT_THREAD_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.agent_url(), DEFAULT_AGENT_URL);
        assert_eq!(config.agent_id(), DEFAULT_AGENT_ID);
        assert_eq!(config.thread_id(), DEFAULT_THREAD_ID);
    }

    #[test]
    fn test_overrides_are_honored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"agent_url":"http://localhost:4111","agent_id":"testAgent","thread_id":7}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.agent_url(), "http://localhost:4111");
        assert_eq!(config.agent_id(), "testAgent");
        assert_eq!(config.thread_id(), 7);
    }
}
