use std::path::{Path, PathBuf};

use ledgerline_email::MailConfig;
use ledgerline_import::MatchPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV: &str = "LEDGERLINE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "ledgerline.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub policy: MatchPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub email: MailConfig,
    pub reconcile: ReconcileConfig,
}

impl AppConfig {
    /// Reads the file named by `LEDGERLINE_CONFIG` (or `ledgerline.toml`),
    /// then applies environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::from_file(&path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "PORT", value: port })?;
        }
        if let Some(dir) = lookup("LEDGERLINE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LEDGERLINE_MAILDROP") {
            self.email.maildrop_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.storage.ledger_path(), PathBuf::from("data/ledger.db"));
        assert_eq!(config.email.maildrop_dir, None);
        assert_eq!(config.reconcile.policy, MatchPolicy::OneToOne);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 8080

            [email]
            maildrop_dir = "/var/mail/receipts"

            [reconcile]
            policy = "allow_reuse"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.email.maildrop_dir, Some(PathBuf::from("/var/mail/receipts")));
        assert_eq!(config.reconcile.policy, MatchPolicy::AllowReuse);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            AppConfig::from_toml("[server]\nport = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = AppConfig::from_file(Path::new("/nonexistent/ledgerline.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerline.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"/srv/ledger\"\n").unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.attachments_dir(), PathBuf::from("/srv/ledger/attachments"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::from_toml("[server]\nport = 8080\n").unwrap();
        config
            .apply_env(env(&[
                ("PORT", "9000"),
                ("LEDGERLINE_DATA_DIR", "/tmp/ll"),
                ("LEDGERLINE_MAILDROP", "/tmp/mail"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/ll"));
        assert_eq!(config.email.maildrop_dir, Some(PathBuf::from("/tmp/mail")));
    }

    #[test]
    fn invalid_port_env() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "PORT", .. }));
    }
}
