//! Engine configuration with TOML file support.
//!
//! A `serde`-deserializable
//! struct with per-field defaults, optionally loaded from a TOML file and
//! then overridden by CLI flags in the binary crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::EngineError;

fn default_max_clients() -> u16 {
    16
}

fn default_expiration_secs() -> u64 {
    60
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Configuration for the perfwatcher query engine.
///
/// Can be loaded from a TOML file via [`Config::from_toml_str`] or built
/// programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listen port. Required, no default: must come from the file or CLI.
    pub port: u16,

    /// Maximum number of concurrently admitted HTTP clients.
    #[serde(default = "default_max_clients")]
    pub max_clients: u16,

    /// How long a snapshot may be served before a refresh is due, in seconds.
    #[serde(default = "default_expiration_secs")]
    pub jsonrpc_cache_expiration_time: u64,

    /// Root of the `<host>/<plugin>/<type>` data hierarchy. Empty means `.`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Config {
    /// Parse configuration from a TOML document, then validate it.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configured ranges.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.port == 0 {
            return Err(EngineError::Config(
                "Port must be in [1, 65535]".to_string(),
            ));
        }
        if self.max_clients == 0 {
            return Err(EngineError::Config(
                "MaxClients must be in [1, 65535]".to_string(),
            ));
        }
        if !(1..=3600).contains(&self.jsonrpc_cache_expiration_time) {
            return Err(EngineError::Config(
                "JsonrpcCacheExpirationTime must be in [1, 3600]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_when_absent() {
        let cfg = Config::from_toml_str("port = 7077").unwrap();
        assert_eq!(cfg.max_clients, 16);
        assert_eq!(cfg.jsonrpc_cache_expiration_time, 60);
        assert_eq!(cfg.data_dir, PathBuf::from("."));
    }

    #[test]
    fn rejects_zero_port() {
        let err = Config::from_toml_str("port = 0").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn rejects_out_of_range_expiration() {
        let toml = "port = 7077\njsonrpc_cache_expiration_time = 9000";
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn accepts_full_explicit_config() {
        let toml = r#"
            port = 7077
            max_clients = 32
            jsonrpc_cache_expiration_time = 30
            data_dir = "/var/lib/perfwatcher"
        "#;
        let cfg = Config::from_toml_str(toml).unwrap();
        assert_eq!(cfg.port, 7077);
        assert_eq!(cfg.max_clients, 32);
        assert_eq!(cfg.jsonrpc_cache_expiration_time, 30);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/perfwatcher"));
    }
}
