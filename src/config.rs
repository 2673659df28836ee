//! Configuration for the server and client binaries.
//!
//! The server accepts command-line arguments and an optional TOML
//! configuration file. CLI arguments take precedence over config file values.
//! The client is configured from the command line only.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::parser::{contains_line_break, DEFAULT_SERVER_NAME, DEFAULT_SERVER_NUMBER};
use crate::protocol::{Identity, MAX_MESSAGE_SIZE};

pub const DEFAULT_PORT: u16 = 5555;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(version)]
#[command(about = "Replies to each client with its name, its number and their sum", long_about = None)]
pub struct ServerArgs {
    /// TCP port to listen on
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Name reported to clients
    #[arg(long)]
    pub name: Option<String>,

    /// Number added to each client's number
    #[arg(long, allow_hyphen_values = true)]
    pub number: Option<i64>,

    /// Maximum number of sessions served at once
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// How long a session waits for its request, in milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// How long shutdown waits for in-flight sessions, in milliseconds
    #[arg(long)]
    pub drain_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Listener and session limits
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            read_timeout_ms: default_read_timeout_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

/// The server's name and number
#[derive(Debug, Deserialize)]
pub struct IdentitySection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_number")]
    pub number: i64,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            name: default_name(),
            number: default_number(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_connections() -> usize {
    1024
}

fn default_read_timeout_ms() -> u64 {
    5_000
}

fn default_drain_timeout_ms() -> u64 {
    1_000
}

fn default_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

fn default_number() -> i64 {
    DEFAULT_SERVER_NUMBER
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub identity: Identity,
    pub max_connections: usize,
    pub read_timeout: Duration,
    pub drain_timeout: Duration,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ServerArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point to, if any.
    pub fn from_args(cli: ServerArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents).map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            identity: Identity {
                name: cli.name.unwrap_or(toml_config.identity.name),
                number: cli.number.unwrap_or(toml_config.identity.number),
            },
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            read_timeout: Duration::from_millis(
                cli.read_timeout_ms
                    .unwrap_or(toml_config.server.read_timeout_ms),
            ),
            drain_timeout: Duration::from_millis(
                cli.drain_timeout_ms
                    .unwrap_or(toml_config.server.drain_timeout_ms),
            ),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        };
        config.validate()?;
        Ok(config)
    }

    /// `host:port` string handed to the resolver.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.name.is_empty() || contains_line_break(&self.identity.name) {
            return Err(ConfigError::Invalid(format!(
                "server name {:?} must be a non-empty single line",
                self.identity.name
            )));
        }
        if self.identity.max_response_len() > MAX_MESSAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "server name of {} bytes does not fit a {MAX_MESSAGE_SIZE}-byte response",
                self.identity.name.len()
            )));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "read_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let toml_config = TomlConfig::default();
        Config {
            host: toml_config.server.host,
            port: toml_config.server.port,
            identity: Identity::default(),
            max_connections: toml_config.server.max_connections,
            read_timeout: Duration::from_millis(toml_config.server.read_timeout_ms),
            drain_timeout: Duration::from_millis(toml_config.server.drain_timeout_ms),
            log_level: toml_config.logging.level,
        }
    }
}

/// Command-line arguments for the client
#[derive(Parser, Debug, Clone)]
#[command(name = "client")]
#[command(version)]
#[command(about = "Sends a name and a number read from stdin, then prints the server's reply", long_about = None)]
pub struct ClientArgs {
    /// Name sent to the server
    #[arg(default_value = "Client of Computer Networks")]
    pub name: String,

    /// Server host
    #[arg(default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// How long to wait for the server's reply, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl ClientArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {1}", .0.display())]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {1}", .0.display())]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5555);
        assert_eq!(config.server.read_timeout_ms, 5_000);
        assert_eq!(config.identity.name, "Server of Computer Networks");
        assert_eq!(config.identity.number, 50);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 6000
            max_connections = 8
            drain_timeout_ms = 250

            [identity]
            name = "Test Server"
            number = -3

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.max_connections, 8);
        assert_eq!(config.server.read_timeout_ms, 5_000);
        assert_eq!(config.server.drain_timeout_ms, 250);
        assert_eq!(config.identity.name, "Test Server");
        assert_eq!(config.identity.number, -3);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_positional_port() {
        let args = ServerArgs::try_parse_from(["server", "6001"]).unwrap();
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.port, 6001);
        assert_eq!(config.listen_address(), "0.0.0.0:6001");
        assert_eq!(config.identity, Identity::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let path = std::env::temp_dir().join(format!("sum-exchange-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[server]\nport = 7000\nread_timeout_ms = 100\n[identity]\nnumber = 9\n",
        )
        .unwrap();

        let args = ServerArgs::try_parse_from([
            "server",
            "--config",
            path.to_str().unwrap(),
            "--number",
            "-4",
        ])
        .unwrap();
        let config = Config::from_args(args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.read_timeout, Duration::from_millis(100));
        assert_eq!(config.identity.number, -4);
        assert_eq!(config.identity.name, "Server of Computer Networks");
    }

    #[test]
    fn test_missing_config_file() {
        let args =
            ServerArgs::try_parse_from(["server", "--config", "/nonexistent/server.toml"]).unwrap();
        match Config::from_args(args) {
            Err(ConfigError::FileRead(path, _)) => {
                assert_eq!(path, PathBuf::from("/nonexistent/server.toml"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_identity_name() {
        let args = ServerArgs::try_parse_from(["server", "--name", ""]).unwrap();
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::Invalid(_))
        ));

        let long_name = "x".repeat(510);
        let args = ServerArgs::try_parse_from(["server", "--name", long_name.as_str()]).unwrap();
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_identity_name_at_response_limit() {
        // "50" plus a 20-byte sum plus three line feeds
        let name = "x".repeat(MAX_MESSAGE_SIZE - 2 - 20 - 3);
        let args = ServerArgs::try_parse_from(["server", "--name", name.as_str()]).unwrap();
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.identity.max_response_len(), MAX_MESSAGE_SIZE);

        let name = "x".repeat(MAX_MESSAGE_SIZE - 2 - 20 - 2);
        let args = ServerArgs::try_parse_from(["server", "--name", name.as_str()]).unwrap();
        assert!(matches!(
            Config::from_args(args),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_explicit_log_level_overrides_file() {
        let path =
            std::env::temp_dir().join(format!("sum-exchange-log-{}.toml", std::process::id()));
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config_path = path.to_str().unwrap();
        let args = ServerArgs::try_parse_from(["server", "--config", config_path]).unwrap();
        assert_eq!(Config::from_args(args).unwrap().log_level, "debug");

        let args = ServerArgs::try_parse_from([
            "server",
            "--config",
            config_path,
            "--log-level",
            "info",
        ])
        .unwrap();
        let config = Config::from_args(args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_client_args() {
        let args = ClientArgs::try_parse_from(["client", "Client A", "localhost", "6002"]).unwrap();
        assert_eq!(args.name, "Client A");
        assert_eq!(args.host, "localhost");
        assert_eq!(args.port, 6002);
        assert_eq!(args.timeout(), Duration::from_secs(5));

        let args = ClientArgs::try_parse_from(["client"]).unwrap();
        assert_eq!(args.name, "Client of Computer Networks");
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 5555);
    }
}
