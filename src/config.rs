use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::default_config::DEFAULT_CONFIG_TOML;
use crate::error::ConfigError;

const APP_DIR_NAME: &str = ".gemini-control-center";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub tool: ToolConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolConfig {
    pub program: String,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelsConfig {
    pub available: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_override_toml(None).unwrap_or_else(|_| Self {
            tool: ToolConfig {
                program: "gemini".to_string(),
                timeout_secs: 120,
                api_key_env: "GEMINI_API_KEY".to_string(),
            },
            models: ModelsConfig {
                available: vec!["gemini-2.5-pro".to_string(), "gemini-2.5-flash".to_string()],
            },
        })
    }
}

impl AppConfig {
    /// Loads the built-in defaults overlaid with the user's config file.
    /// `path` defaults to `~/.gemini-control-center/config.toml`; a missing
    /// file leaves the defaults untouched.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Ok(path) => path,
                Err(err) => {
                    tracing::warn!(%err, "no home directory, using built-in config");
                    return Self::from_override_toml(None);
                }
            },
        };
        let override_text = match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                None
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::from_override_toml(override_text.as_deref())
    }

    pub fn from_override_toml(override_text: Option<&str>) -> Result<Self, ConfigError> {
        let mut merged = parse_toml_table(DEFAULT_CONFIG_TOML)?;
        let override_value = parse_toml_table(override_text.unwrap_or_default())?;
        merge_toml_tables(&mut merged, override_value);
        let config: Self = merged.try_into()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::Invalid("tool.program must not be empty".to_string()));
        }
        if self.tool.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "tool.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.models.available.iter().all(|model| model.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "models.available must name at least one model".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn home_dir() -> io::Result<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "HOME is not set"))
}

pub fn app_dir() -> io::Result<PathBuf> {
    Ok(home_dir()?.join(APP_DIR_NAME))
}

pub fn default_config_path() -> io::Result<PathBuf> {
    Ok(app_dir()?.join("config.toml"))
}

/// Warning text when the tool's API key variable is unset or blank.
pub fn api_key_warning(env_name: &str) -> Option<String> {
    let present = env::var_os(env_name).is_some_and(|value| !value.is_empty());
    (!present).then(|| format!("{env_name} may not be set."))
}

fn parse_toml_table(text: &str) -> Result<toml::Value, ConfigError> {
    if text.trim().is_empty() {
        return Ok(toml::Value::Table(toml::map::Map::new()));
    }
    Ok(toml::from_str(text)?)
}

fn merge_toml_tables(base: &mut toml::Value, override_value: toml::Value) {
    match (base, override_value) {
        (toml::Value::Table(base_map), toml::Value::Table(override_map)) => {
            for (key, override_item) in override_map {
                if let Some(base_item) = base_map.get_mut(&key) {
                    merge_toml_tables(base_item, override_item);
                } else {
                    base_map.insert(key, override_item);
                }
            }
        }
        (base_slot, override_item) => {
            *base_slot = override_item;
        }
    }
}
