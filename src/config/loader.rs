//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::CustodyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `chain.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "CUSTODY_RPC_URL";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// A missing file yields the defaults. `CUSTODY_RPC_URL` takes precedence
/// over the file's `chain.rpc_url`.
pub fn load_config(path: &Path) -> Result<CustodyConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        parse_config(&content)?
    } else {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        CustodyConfig::default()
    };

    if let Ok(url) = std::env::var(RPC_URL_ENV_VAR) {
        config.chain.rpc_url = url;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<CustodyConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}
