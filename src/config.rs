use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: PathBuf,
    pub host: String,
    pub port: u16,
    /// Enables the /api/auth/dev_login route. Never turn this on in
    /// production, tokens are normally issued by the external identity
    /// provider.
    #[serde(default)]
    pub dev_login: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("database/course.db"),
            host: "127.0.0.1".to_string(),
            port: 8080,
            dev_login: false,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
