use crate::embed::EmbedOptions;
use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "METACATALOG_CONFIG";
pub const ENV_DB_PATH: &str = "METACATALOG_DB_PATH";
pub const ENV_HOST: &str = "METACATALOG_HOST";
pub const ENV_PORT: &str = "METACATALOG_PORT";
pub const ENV_SCHEMA: &str = "METACATALOG_SCHEMA";

/// Service configuration, read from YAML with environment overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    /// Schema file; the built-in schema is used when unset
    pub schema_path: Option<PathBuf>,
    pub embed: EmbedOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: "metadata.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `$METACATALOG_CONFIG`), then apply
    /// environment overrides. Without a file every field takes its default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file parses as null
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `METACATALOG_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database.path = path;
        }
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .parse()
                .map_err(|_| CatalogError::Config(format!("invalid {ENV_PORT}: '{port}'")))?;
        }
        if let Some(schema) = lookup(ENV_SCHEMA) {
            self.schema_path = Some(PathBuf::from(schema));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.database.path, "metadata.db");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.schema_path.is_none());
        assert!(!config.embed.cache_lookups);
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml(
            "server:\n  port: 9000\nembed:\n  cache_lookups: true\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.embed.cache_lookups);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_DB_PATH, ":memory:"),
            (ENV_PORT, "8181"),
            (ENV_SCHEMA, "/etc/metacatalog/schema.yaml"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.server.port, 8181);
        assert_eq!(
            config.schema_path,
            Some(PathBuf::from("/etc/metacatalog/schema.yaml"))
        );
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == ENV_PORT).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "database:\n  path: /var/lib/metadata.db\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.database.path, "/var/lib/metadata.db");

        let missing = tmp.path().join("missing.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(CatalogError::Config(_))
        ));
    }
}
