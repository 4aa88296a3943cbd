//! Runtime settings.
//!
//! Settings come from an optional TOML file named by `VAULT_CONFIG`, then
//! `VAULT_HOST` / `VAULT_PORT` override the listener. Anything left out falls
//! back to the defaults below.

use std::env;
use std::fs;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::blockchain::account::STARTING_BALANCE;

/// Env var naming the TOML settings file
pub const CONFIG_PATH_ENV: &str = "VAULT_CONFIG";
const HOST_ENV: &str = "VAULT_HOST";
const PORT_ENV: &str = "VAULT_PORT";

/// Errors that can occur while loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid port {0:?}")]
    InvalidPort(String),

    #[error("Invalid printer settings: {0}")]
    InvalidPrinter(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub ledger: LedgerSettings,
    pub printer: PrinterSettings,
    pub mining: MiningSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Balance of every newly registered account
    pub starting_balance: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrinterSettings {
    /// Account credited by the background printer
    pub account: String,
    /// One-off credit granted at startup
    pub bonus: u64,
    /// Credit per tick
    pub amount: u64,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    /// Shard the proof-of-work search over all cores
    pub parallel: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5070,
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            starting_balance: STARTING_BALANCE,
        }
    }
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            account: "SecretPrinter".to_string(),
            bonus: 100,
            amount: 50,
            interval_secs: 30,
        }
    }
}

impl PrinterSettings {
    /// Period between two credits
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Rejects settings the printer cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.trim().is_empty() {
            return Err(ConfigError::InvalidPrinter("account must not be empty".to_string()));
        }
        if self.amount == 0 {
            return Err(ConfigError::InvalidPrinter("amount must be positive".to_string()));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidPrinter(
                "interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Loads settings from the file named by `VAULT_CONFIG` (if any) plus env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(contents)?;
        settings.printer.validate()?;
        Ok(settings)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.bind_address(), ("127.0.0.1".to_string(), 5070));
        assert_eq!(settings.ledger.starting_balance, 1000);
        assert_eq!(settings.printer.account, "SecretPrinter");
        assert_eq!(settings.printer.bonus, 100);
        assert_eq!(settings.printer.amount, 50);
        assert_eq!(settings.printer.interval(), Duration::from_secs(30));
        assert!(!settings.mining.parallel);
    }

    #[test]
    fn test_partial_toml() {
        let settings = Settings::from_toml_str(
            r#"
            [server]
            port = 9000

            [printer]
            amount = 5

            [mining]
            parallel = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.printer.amount, 5);
        assert_eq!(settings.printer.interval_secs, 30);
        assert!(settings.mining.parallel);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Settings::from_toml_str("[server]\nport = \"high\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Settings::from_file("/nonexistent/vault.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_invalid_printer_settings() {
        for contents in [
            "[printer]\ninterval_secs = 0",
            "[printer]\namount = 0",
            "[printer]\naccount = \"\"",
        ] {
            assert!(matches!(
                Settings::from_toml_str(contents),
                Err(ConfigError::InvalidPrinter(_))
            ));
        }
        assert!(Settings::default().printer.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| match key {
                "VAULT_HOST" => Some("0.0.0.0".to_string()),
                "VAULT_PORT" => Some("8080".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.bind_address(), ("0.0.0.0".to_string(), 8080));

        let result = settings.apply_overrides(|key| (key == "VAULT_PORT").then(|| "x".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidPort(_))));
    }
}
