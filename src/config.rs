use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GatorError, Result};

pub const CONFIG_FILE_NAME: &str = ".gatorconfig.json";

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "GATOR_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub db_url: String,
    #[serde(default)]
    pub current_user_name: String,
}

impl Config {
    /// The logged in user's name, if any.
    pub fn current_user(&self) -> Option<&str> {
        if self.current_user_name.is_empty() {
            None
        } else {
            Some(&self.current_user_name)
        }
    }

    /// Parse config from a JSON string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }
}

/// Reads and rewrites the config document at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `$GATOR_CONFIG` if set, otherwise `~/.gatorconfig.json`.
    pub fn default_location() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Ok(Self::new(path));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| GatorError::Config("could not resolve home directory".to_string()))?;
        Ok(Self::new(home.join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Config> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            GatorError::Config(format!("could not read {}: {}", self.path.display(), e))
        })?;
        Config::from_str(&content)
    }

    pub fn write(&self, config: &Config) -> Result<()> {
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Point the config at `name` and persist it.
    pub fn set_user(&self, config: &mut Config, name: &str) -> Result<()> {
        config.current_user_name = name.to_string();
        self.write(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_valid_config() {
        let content = r#"{"db_url": "sqlite:gator.db", "current_user_name": "alice"}"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = ConfigStore::new(temp_file.path()).read().unwrap();

        assert_eq!(config.db_url, "sqlite:gator.db");
        assert_eq!(config.current_user(), Some("alice"));
    }

    #[test]
    fn test_current_user_defaults_to_none() {
        let config = Config::from_str(r#"{"db_url": "sqlite::memory:"}"#).unwrap();
        assert_eq!(config.current_user_name, "");
        assert_eq!(config.current_user(), None);
    }

    #[test]
    fn test_read_missing_file() {
        let result = ConfigStore::new("/nonexistent/path/.gatorconfig.json").read();
        assert!(matches!(result, Err(GatorError::Config(_))));
    }

    #[test]
    fn test_read_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"this is not json {{{").unwrap();

        let result = ConfigStore::new(temp_file.path()).read();
        assert!(matches!(result, Err(GatorError::Json(_))));
    }

    #[test]
    fn test_missing_db_url_is_rejected() {
        let result = Config::from_str(r#"{"current_user_name": "alice"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_set_user_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join(CONFIG_FILE_NAME));
        let mut config = Config {
            db_url: "sqlite::memory:".to_string(),
            current_user_name: String::new(),
        };
        store.write(&config).unwrap();

        store.set_user(&mut config, "bob").unwrap();

        assert_eq!(config.current_user_name, "bob");
        let reread = store.read().unwrap();
        assert_eq!(reread, config);
    }
}
