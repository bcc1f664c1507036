//! Configuration Module
//!
//! This module defines all configuration structures for the balance service.
//! Configuration is loaded from TOML files and parsed using serde.

use serde::Deserialize;
use std::fs;

/// Main configuration structure
///
/// # Example TOML
/// ```toml
/// [provider]
/// ws_url = "ws://127.0.0.1:8546"
///
/// [api]
/// host = "127.0.0.1"
/// port = 8645
///
/// [[watch]]
/// token = "ETH"
/// owner = "0x00000000219ab540356cBB839Cbe05303d7705Fa"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub api: ApiConfig,
    /// Pairs watched from startup until shutdown
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// Node connection configuration
///
/// # Fields
/// - `ws_url`: Websocket JSON-RPC endpoint; must support `eth_subscribe`
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub ws_url: String,
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// A (token, owner) pair to keep fresh
///
/// `token` is either `"ETH"` for the native currency or a token contract address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchConfig {
    pub token: String,
    pub owner: String,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
