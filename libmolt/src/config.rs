//! Configuration management for molt

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::id_cache::DEFAULT_MAX_ENTRIES;
use crate::store::write_atomic;

pub const DEFAULT_API_BASE: &str = "https://www.moltbook.com/api/v1";
pub const DEFAULT_SUBMOLT: &str = "self";

pub const ENV_CONFIG: &str = "MOLT_CONFIG";
pub const ENV_DATA_DIR: &str = "MOLT_DATA_DIR";
pub const ENV_API_KEY: &str = "MOLTBOOK_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_submolt")]
    pub submolt: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            submolt: default_submolt(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_submolt() -> String {
    DEFAULT_SUBMOLT.to_string()
}

/// Locations of the local store files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub id_cache: PathBuf,
    pub drafts: PathBuf,
    pub bookmarks: PathBuf,
    pub scheduled: PathBuf,
}

impl StorePaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            id_cache: dir.join("id_cache.json"),
            drafts: dir.join("drafts.json"),
            bookmarks: dir.join("bookmarks.json"),
            scheduled: dir.join("scheduled.json"),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::ReadError(e).into()),
        };
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Write configuration to `path`, readable by the owner only
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;
        write_atomic(path, content.as_bytes(), 0o600)
    }

    /// API key from the config file, falling back to `MOLTBOOK_API_KEY`
    pub fn api_key(&self) -> Result<SecretString> {
        let from_file = self
            .api
            .key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        let key = match from_file {
            Some(key) => key,
            None => std::env::var(ENV_API_KEY)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    ConfigError::MissingField(format!(
                        "api.key (run 'molt auth <key>' or set {})",
                        ENV_API_KEY
                    ))
                })?,
        };
        Ok(SecretString::from(key))
    }

    /// Directory holding the local stores
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(shellexpand::tilde(&dir).to_string()));
            }
        }
        if let Some(dir) = &self.storage.data_dir {
            return Ok(PathBuf::from(shellexpand::tilde(dir).to_string()));
        }
        resolve_data_path()
    }

    pub fn store_paths(&self) -> Result<StorePaths> {
        Ok(StorePaths::in_dir(&self.data_dir()?))
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("molt").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("molt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MoltError;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.api.base_url, DEFAULT_API_BASE);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.defaults.submolt, "self");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "http://localhost:9999"

[cache]
max_entries = 10
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:9999");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.defaults.submolt, "self");
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = ").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, MoltError::Config(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api.key = Some("moltbook_sk_test".to_string());
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.api.key.as_deref(), Some("moltbook_sk_test"));
        assert_eq!(loaded.api.base_url, DEFAULT_API_BASE);
    }

    #[test]
    #[serial]
    fn test_api_key_prefers_config_file() {
        std::env::set_var(ENV_API_KEY, "from-env");
        let mut config = Config::default();
        config.api.key = Some("from-file".to_string());

        assert_eq!(config.api_key().unwrap().expose_secret(), "from-file");
        std::env::remove_var(ENV_API_KEY);
    }

    #[test]
    #[serial]
    fn test_api_key_falls_back_to_env() {
        std::env::set_var(ENV_API_KEY, "from-env");
        let config = Config::default();

        assert_eq!(config.api_key().unwrap().expose_secret(), "from-env");
        std::env::remove_var(ENV_API_KEY);
    }

    #[test]
    #[serial]
    fn test_missing_api_key_is_config_error() {
        std::env::remove_var(ENV_API_KEY);
        let config = Config::default();

        let err = config.api_key().unwrap_err();
        assert!(matches!(err, MoltError::Config(ConfigError::MissingField(_))));
        assert!(err.to_string().contains("molt auth"));
    }

    #[test]
    #[serial]
    fn test_data_dir_env_override() {
        std::env::set_var(ENV_DATA_DIR, "/tmp/molt-data-test");
        let mut config = Config::default();
        config.storage.data_dir = Some("/somewhere/else".to_string());

        assert_eq!(
            config.data_dir().unwrap(),
            PathBuf::from("/tmp/molt-data-test")
        );
        std::env::remove_var(ENV_DATA_DIR);

        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/somewhere/else"));
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        std::env::set_var(ENV_CONFIG, "/tmp/molt-test/config.toml");
        assert_eq!(
            resolve_config_path().unwrap(),
            PathBuf::from("/tmp/molt-test/config.toml")
        );
        std::env::remove_var(ENV_CONFIG);
    }

    #[test]
    fn test_store_paths_in_dir() {
        let paths = StorePaths::in_dir(Path::new("/data"));
        assert_eq!(paths.drafts, PathBuf::from("/data/drafts.json"));
        assert_eq!(paths.scheduled, PathBuf::from("/data/scheduled.json"));
        assert_eq!(paths.bookmarks, PathBuf::from("/data/bookmarks.json"));
        assert_eq!(paths.id_cache, PathBuf::from("/data/id_cache.json"));
    }
}
