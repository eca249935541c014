//! TOML configuration.
//!
//! Loaded from `~/.config/sopdoc/config.toml` (platform config dir). Every
//! key is optional:
//!
//! ```toml
//! [database]
//! path = "/var/lib/sopdoc/sopdoc.db"
//!
//! [assembly]
//! format = "html"
//! include_table_of_contents = true
//! include_metadata = false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::assembly::{AssemblyFormat, AssemblyOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Get the config file path (~/.config/sopdoc/config.toml).
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sopdoc").join("config.toml"))
}

/// Default database location under the platform data dir.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("sopdoc").join("sopdoc.db"))
        .unwrap_or_else(|| PathBuf::from("sopdoc.db"))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SopConfig {
    pub database: DatabaseConfig,
    pub assembly: AssemblyConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Unset means [`default_database_path`].
    pub path: Option<PathBuf>,
}

/// Defaults for rendering when the caller does not say otherwise.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub format: AssemblyFormat,
    pub include_table_of_contents: bool,
    pub include_metadata: bool,
}

impl AssemblyConfig {
    pub fn options(&self) -> AssemblyOptions {
        AssemblyOptions {
            include_table_of_contents: self.include_table_of_contents,
            include_metadata: self.include_metadata,
        }
    }
}

impl SopConfig {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = config_file_path() else {
            debug!("no config directory available, using defaults");
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!("config not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load an explicit file. Missing or malformed files are errors.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Configured database path, or the platform default.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(default_database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = SopConfig::from_toml("").unwrap();
        assert_eq!(config, SopConfig::default());
        assert_eq!(config.assembly.format, AssemblyFormat::Markdown);
        assert_eq!(config.database_path(), default_database_path());
    }

    #[test]
    fn test_partial_config() {
        let config = SopConfig::from_toml(
            r#"
            [database]
            path = "/tmp/docs.db"

            [assembly]
            format = "plain_text"
            include_table_of_contents = true
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/docs.db"));
        assert_eq!(config.assembly.format, AssemblyFormat::PlainText);
        assert_eq!(
            config.assembly.options(),
            AssemblyOptions { include_table_of_contents: true, include_metadata: false }
        );
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(SopConfig::from_toml("[assembly]\nformat = \"pdf\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[assembly]\nformat = \"html\"\ninclude_metadata = true").unwrap();
        let config = SopConfig::load_from(file.path()).unwrap();
        assert_eq!(config.assembly.format, AssemblyFormat::Html);
        assert!(config.assembly.include_metadata);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[assembly\nformat = ").unwrap();
        assert!(matches!(SopConfig::load_from(bad.path()), Err(ConfigError::Parse { .. })));

        let missing = file.path().with_extension("missing");
        assert!(matches!(SopConfig::load_from(&missing), Err(ConfigError::Read { .. })));
    }
}
