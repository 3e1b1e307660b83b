//! Server configuration
//!
//! Loads the immutable server configuration from `config.toml` with
//! environment overrides. The managed root is fixed for the lifetime of
//! the process and handed to every component explicitly.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Locations searched for `config.toml`, in order.
const CONFIG_PATHS: [&str; 2] = [
    "rax-drive/config", // Docker production: /app/rax-drive/config.toml
    "config",           // Local development: ./config.toml
];

/// Server configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address the HTTP listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory managed by the drive; every logical path is relative to it
    #[serde(default = "default_server_root")]
    pub server_root: String,

    /// Maximum request body size in MB
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,

    /// Lowercase extensions accepted by uploads; empty accepts everything
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_server_root() -> String {
    "uploads".to_string()
}

fn default_max_upload_mb() -> u64 {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            server_root: default_server_root(),
            max_upload_mb: default_max_upload_mb(),
            allowed_extensions: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml with `RAX_DRIVE_*` environment overrides.
    ///
    /// A missing file is not an error; the defaults above apply.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        for path in CONFIG_PATHS {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix("RAX_DRIVE"))
            .build()?;

        let mut config: ServerConfig = settings.try_deserialize()?;
        config.normalize_extensions();
        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted at `root`, listening on an ephemeral loopback port.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            server_root: root.into().to_string_lossy().to_string(),
            ..Self::default()
        }
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.server_root.trim().is_empty() {
            return Err(ConfigError::Message("server_root cannot be empty".into()));
        }

        if self.max_upload_mb == 0 {
            return Err(ConfigError::Message(
                "max_upload_mb must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn normalize_extensions(&mut self) {
        for ext in &mut self.allowed_extensions {
            *ext = ext.trim().trim_start_matches('.').to_lowercase();
        }
        self.allowed_extensions.retain(|ext| !ext.is_empty());
    }

    /// Get bind address and port as socket address
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get server root as PathBuf
    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    /// Get maximum request body size in bytes
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}
