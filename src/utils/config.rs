//! Configuration management for the mesh chat node.
//!
//! This module provides TOML-based configuration with support for multiple
//! configuration sources (default, file-based, environment variables) and
//! validation of configuration parameters.

use crate::console::Lang;
use crate::network::PeerId;
use crate::utils::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "irc-node.toml";

/// Environment variable prefix for configuration
pub const ENV_PREFIX: &str = "IRC_NODE";

/// Complete configuration for a node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Who this node is
    pub node: IdentityConfig,
    /// Listener and peer connections
    pub network: NetworkConfig,
    /// Membership reconciliation
    pub gossip: GossipConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// User-facing identity of the node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Nickname announced to the mesh
    pub nickname: String,
    /// Language of console messages
    pub language: Lang,
}

/// Network and transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host to bind the listener to
    pub listen_host: String,
    /// Host other nodes reach this one at; defaults to `listen_host`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_host: Option<String>,
    /// Port to listen on (0 picks an ephemeral port)
    pub listen_port: u16,
    /// Peers known at startup, as `host:port`
    pub seed_peers: Vec<String>,
    /// Bound on connecting to a peer and exchanging one envelope, in milliseconds
    pub connection_timeout_ms: u64,
    /// Largest inbound envelope accepted, in bytes
    pub max_recv_size: usize,
    /// Pending connection queue length of the listener
    pub listen_backlog: u32,
}

/// Membership reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Publish self state and known channels once the listener is up
    pub announce_on_start: bool,
    /// Publish self state again whenever a new peer appears
    pub announce_on_discovery: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let nickname = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "anonymous".to_string());

        Self {
            nickname,
            language: Lang::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_host: crate::defaults::DEFAULT_HOST.to_string(),
            advertise_host: None,
            listen_port: crate::defaults::DEFAULT_PORT,
            seed_peers: Vec::new(),
            connection_timeout_ms: crate::defaults::DEFAULT_CONNECTION_TIMEOUT_MS,
            max_recv_size: crate::MAX_MESSAGE_SIZE,
            listen_backlog: crate::defaults::DEFAULT_LISTEN_BACKLOG,
        }
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            announce_on_start: true,
            announce_on_discovery: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Connection timeout as a duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Host part of the node identity announced to the mesh
    pub fn advertised_host(&self) -> &str {
        self.advertise_host.as_deref().unwrap_or(&self.listen_host)
    }

    /// Parse the seed list
    ///
    /// # Errors
    ///
    /// Returns an error naming the first seed that is not `host:port`
    pub fn seed_peer_ids(&self) -> Result<Vec<PeerId>> {
        self.seed_peers.iter().map(|seed| seed.parse()).collect()
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with multiple sources (default, file, environment)
    ///
    /// # Arguments
    ///
    /// * `config_file` - Optional path to configuration file
    ///
    /// # Returns
    ///
    /// Configuration with values merged from multiple sources
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_file {
            config = config.merge(Self::from_file(path)?);
        } else {
            let default_locations = [
                PathBuf::from(DEFAULT_CONFIG_FILE),
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("irc-node")
                    .join(DEFAULT_CONFIG_FILE),
            ];

            for location in &default_locations {
                if location.exists() {
                    log::debug!("Using configuration file {}", location.display());
                    config = config.merge(Self::from_file(location)?);
                    break;
                }
            }
        }

        config = config.merge_from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path where to save the configuration
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Merge this configuration with another, preferring values from other
    ///
    /// Sections are replaced whole; a file that omits a section gets the
    /// defaults for it at parse time.
    pub fn merge(mut self, other: Self) -> Self {
        self.node = other.node;
        self.network = other.network;
        self.gossip = other.gossip;
        self.logging = other.logging;
        self
    }

    /// Merge configuration from environment variables
    fn merge_from_env(mut self) -> Result<Self> {
        if let Ok(nickname) = std::env::var(format!("{ENV_PREFIX}_NICKNAME")) {
            self.node.nickname = nickname;
        }

        let port_var = format!("{ENV_PREFIX}_NETWORK_LISTEN_PORT");
        if let Ok(port) = std::env::var(&port_var) {
            self.network.listen_port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: port_var,
                value: port,
            })?;
        }

        if let Ok(host) = std::env::var(format!("{ENV_PREFIX}_NETWORK_ADVERTISE_HOST")) {
            self.network.advertise_host = Some(host);
        }

        if let Ok(level) = std::env::var(format!("{ENV_PREFIX}_LOGGING_LEVEL")) {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.node.nickname.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "node.nickname".to_string(),
            }
            .into());
        }

        if self.network.listen_host.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "network.listen_host".to_string(),
            }
            .into());
        }

        // Peers cannot dial a wildcard address
        let field = if self.network.advertise_host.is_some() {
            "network.advertise_host"
        } else {
            "network.listen_host"
        };
        let advertised = self.network.advertised_host().trim();
        if advertised.is_empty() {
            return Err(invalid(field, advertised));
        }
        if advertised
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_unspecified())
        {
            return Err(invalid(field, advertised));
        }

        if self.network.connection_timeout_ms == 0 {
            return Err(invalid("network.connection_timeout_ms", "0"));
        }

        if self.network.max_recv_size == 0 {
            return Err(invalid("network.max_recv_size", "0"));
        }

        if self.network.listen_backlog == 0 {
            return Err(invalid("network.listen_backlog", "0"));
        }

        for seed in &self.network.seed_peers {
            if seed.parse::<PeerId>().is_err() {
                return Err(invalid("network.seed_peers", seed));
            }
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => return Err(invalid("logging.level", other)),
        }

        Ok(())
    }

    /// Get the configuration as a pretty-printed TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::ParseError {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn invalid(field: &str, value: &str) -> crate::utils::NodeError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.listen_port, crate::defaults::DEFAULT_PORT);
        assert_eq!(config.network.max_recv_size, crate::MAX_MESSAGE_SIZE);
        assert!(config.gossip.announce_on_start);
    }

    #[test]
    fn test_config_serialization() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("listen_port"));
        assert!(toml_str.contains("announce_on_discovery"));
        assert!(toml_str.contains("language = \"en\""));
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = NodeConfig::default();
        config.node.nickname = "alice".to_string();
        config.network.seed_peers = vec!["127.0.0.1:7000".to_string()];
        let temp_file = NamedTempFile::new().unwrap();

        config.save(temp_file.path()).unwrap();
        let loaded_config = NodeConfig::from_file(temp_file.path()).unwrap();

        assert_eq!(loaded_config.node.nickname, "alice");
        assert_eq!(loaded_config.network.seed_peers, config.network.seed_peers);
        assert_eq!(
            loaded_config.network.seed_peer_ids().unwrap(),
            vec![PeerId::new("127.0.0.1", 7000)]
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "[node]\nnickname = \"bob\"\nlanguage = \"fr\"\n\n[network]\nlisten_port = 7001\n",
        )
        .unwrap();

        let config = NodeConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.node.language, Lang::Fr);
        assert_eq!(config.network.listen_port, 7001);
        assert_eq!(config.network.listen_host, crate::defaults::DEFAULT_HOST);
        assert!(config.gossip.announce_on_discovery);
    }

    #[test]
    fn test_missing_file() {
        assert!(NodeConfig::from_file("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = NodeConfig::default();
        assert!(config.validate().is_ok());

        config.network.connection_timeout_ms = 0;
        assert!(config.validate().is_err());

        config = NodeConfig::default();
        config.network.seed_peers = vec!["no-port".to_string()];
        assert!(config.validate().is_err());

        config = NodeConfig::default();
        config.node.nickname = "  ".to_string();
        assert!(config.validate().is_err());

        config = NodeConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config = NodeConfig::default();
        config.network.listen_port = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wildcard_listen_needs_advertise_host() {
        let mut config = NodeConfig::default();
        config.network.listen_host = "0.0.0.0".to_string();
        assert!(matches!(
            config.validate(),
            Err(crate::utils::NodeError::Config(ConfigError::InvalidValue { ref field, .. }))
                if field == "network.listen_host"
        ));

        config.network.advertise_host = Some("192.168.1.20".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.network.advertised_host(), "192.168.1.20");

        config.network.advertise_host = Some("::".to_string());
        assert!(config.validate().is_err());

        config.network.advertise_host = Some(" ".to_string());
        assert!(config.validate().is_err());

        config.network.advertise_host = Some("node-a.lan".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_advertise_host_defaults_to_listen_host() {
        let config = NodeConfig::default();
        assert_eq!(config.network.advertise_host, None);
        assert_eq!(config.network.advertised_host(), crate::defaults::DEFAULT_HOST);
        assert!(!config.to_toml_string().unwrap().contains("advertise_host"));
    }

    #[test]
    fn test_config_merge() {
        let mut config1 = NodeConfig::default();
        let mut config2 = NodeConfig::default();

        config1.network.listen_port = 4001;
        config2.network.listen_port = 4002;

        let merged = config1.merge(config2);
        assert_eq!(merged.network.listen_port, 4002);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("IRC_NODE_NETWORK_LISTEN_PORT", "9999");

        let config = NodeConfig::default().merge_from_env().unwrap();
        assert_eq!(config.network.listen_port, 9999);

        std::env::remove_var("IRC_NODE_NETWORK_LISTEN_PORT");
    }
}
