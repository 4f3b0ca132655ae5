use std::{
    net::{IpAddr, SocketAddr},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::{Level, level_filters::LevelFilter};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum LogLevel {
    #[serde(rename = "trace")]
    Trace,
    #[serde(rename = "debug")]
    Debug,
    #[default]
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl From<LogLevel> for Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        LevelFilter::from_level(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// IP address to listen on for DNS queries.
    #[serde(default = "default_server_ip")]
    pub ip: String,
    /// Port to listen on for DNS queries.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Logging level for the server.
    #[serde(default)]
    pub log_level: LogLevel,
}

impl ServerConfig {
    /// Address both listeners bind to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.ip.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_server_ip(),
            port: default_server_port(),
            log_level: LogLevel::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// resolv.conf style file listing the upstream nameservers.
    #[serde(default = "default_resolv_conf")]
    pub resolv_conf: String,
    /// Delay between starting successive nameservers. Zero selects the default.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u32,
    /// Advertise a large EDNS0 payload on UDP queries sent upstream.
    #[serde(default)]
    pub edns0: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolv_conf: default_resolv_conf(),
            interval_ms: default_interval_ms(),
            edns0: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found")]
    NotFound,
    #[error("failed to decode config: {0}")]
    Decode(String),
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),
}

fn decode_from_path(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound)?;
    let config: Config =
        toml::from_str(&content).map_err(|e| ConfigError::Decode(e.message().into()))?;
    Ok(config)
}

/// Load the config for the dns server, writing the default one if none exists.
pub fn load_config(config_path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let config_path = config_path.as_ref();
    match decode_from_path(config_path) {
        Ok(cfg) => Ok(cfg),
        Err(ConfigError::NotFound) => create_default_config(config_path),
        Err(e) => Err(e.into()),
    }
}

pub fn create_default_config(config_path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let cfg = Config::default();

    let toml_str = toml::to_string_pretty(&cfg)?;

    std::fs::write(config_path, toml_str)?;

    Ok(cfg)
}

fn default_server_ip() -> String {
    "0.0.0.0".into()
}

fn default_server_port() -> u16 {
    53
}

fn default_resolv_conf() -> String {
    "/etc/resolv.conf".into()
}

fn default_interval_ms() -> u32 {
    200
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
