use crate::constants;
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Locations for one pipeline run.
///
/// Resolved in layers: built-in defaults, then an optional TOML file, then
/// `SALES_ETL_*` environment variables. CLI flags are applied last by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub input_path: PathBuf,
    pub db_path: PathBuf,
    pub output_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(constants::DEFAULT_INPUT_PATH),
            db_path: PathBuf::from(constants::DEFAULT_DB_PATH),
            output_path: PathBuf::from(constants::DEFAULT_OUTPUT_PATH),
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
        }
    }
}

impl EtlConfig {
    /// Load configuration from `explicit` if given, else from `sales_etl.toml`
    /// when present, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(constants::DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overwrite fields from a key lookup (normally the process environment).
    /// Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        if let Some(p) = pick(constants::ENV_INPUT_PATH) {
            self.input_path = p;
        }
        if let Some(p) = pick(constants::ENV_DB_PATH) {
            self.db_path = p;
        }
        if let Some(p) = pick(constants::ENV_OUTPUT_PATH) {
            self.output_path = p;
        }
        if let Some(p) = pick(constants::ENV_LOG_DIR) {
            self.log_dir = p;
        }
    }
}
