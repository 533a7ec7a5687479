//! CLI configuration handling.

use anyhow::{Context, Result, bail};
use audiovault_core::AppConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the client id from the config file.
pub const CLIENT_ID_ENV: &str = "AUDIOVAULT_CLIENT_ID";

/// Environment variable overriding the redirect target from the config file.
pub const REDIRECT_URI_ENV: &str = "AUDIOVAULT_REDIRECT_URI";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Engine settings; the TOML keys sit at the top level of the file.
    #[serde(flatten)]
    pub app: AppConfig,

    /// Directory for the file token store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            data_dir: default_data_dir(),
            config_path: PathBuf::new(),
        }
    }
}

impl CliConfig {
    /// Location of the file token store.
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    /// Apply `AUDIOVAULT_*` overrides; blank values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(client_id) = lookup(CLIENT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.app.client_id = Some(client_id);
        }
        if let Some(redirect_uri) = lookup(REDIRECT_URI_ENV).filter(|v| !v.trim().is_empty()) {
            self.app.redirect_uri = Some(redirect_uri);
        }
    }
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".audiovault"))
}

/// Load configuration from `explicit`, the default location, or defaults.
///
/// An explicit path must exist; a missing default file means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file {:?} does not exist", path);
            }
            path.to_path_buf()
        }
        None => project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("audiovault.toml")),
    };

    let config = load_from_path(&config_path, |key| std::env::var(key).ok())?;

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;

    Ok(config)
}

fn load_from_path(config_path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<CliConfig> {
    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path.to_path_buf();
    config.apply_overrides(lookup);
    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "audiovault", "audiovault")
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiovault_core::StoreKind;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = load_from_path(&path, no_env).unwrap();
        assert_eq!(config.app, AppConfig::default());
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn test_file_values_and_data_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
client_id = "from-file"
redirect_uri = "http://127.0.0.1:8888/callback"
token_store = "memory"
data_dir = "/tmp/audiovault-data"
"#,
        )
        .unwrap();

        let config = load_from_path(&path, no_env).unwrap();
        assert_eq!(config.app.client_id.as_deref(), Some("from-file"));
        assert_eq!(config.app.token_store, StoreKind::Memory);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/audiovault-data"));
        assert_eq!(
            config.credentials_path(),
            PathBuf::from("/tmp/audiovault-data/credentials.json")
        );
        assert_eq!(config.app.scopes, AppConfig::default().scopes);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "client_id = \"from-file\"\n").unwrap();

        let config = load_from_path(&path, |key| match key {
            CLIENT_ID_ENV => Some("from-env".to_string()),
            REDIRECT_URI_ENV => Some("  ".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.app.client_id.as_deref(), Some("from-env"));
        assert_eq!(config.app.redirect_uri, None);
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "client_id = [").unwrap();

        let err = load_from_path(&path, no_env).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let result = load_config(Some(&dir.path().join("missing.toml")));
        assert!(result.is_err());
    }
}
