//! Configuration Module
//!
//! This module defines all configuration structures for the nonce service.
//! Configuration is loaded from TOML files and parsed using serde.

use crate::AccountState;
use serde::Deserialize;
use std::fs;

/// Main configuration structure
///
/// Loaded from a TOML file (e.g., config/default.toml).
///
/// # Example TOML
/// ```toml
/// [api]
/// host = "127.0.0.1"
/// port = 8545
///
/// [[ledger.accounts]]
/// address = "0x0000000000000000000000000000000000000001"
/// balance = "0x3e8"
/// nonce = 100
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on (e.g., 8545)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// In-memory ledger seed
///
/// Accounts listed here start with the given canonical nonce; any other
/// account starts at zero.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub accounts: Vec<AccountState>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
