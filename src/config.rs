use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub resources: ResourceConfig,
    pub printer: PrinterConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Root that bare content paths are resolved against.
    pub root: PathBuf,
    /// Where job payloads are staged before submission to CUPS.
    pub spool_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinterConfig {
    pub name: String,
    pub fallback_names: Vec<String>,
    pub use_mock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("PORT")
                .unwrap_or_else(|| "8765".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
        };

        let resources = ResourceConfig {
            root: var("RESOURCE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./www")),
            spool_path: var("SPOOL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("print_bridge")),
        };

        let printer = PrinterConfig {
            name: var("PRINTER_NAME").unwrap_or_default(),
            fallback_names: var("PRINTER_FALLBACK")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            use_mock: var("USE_MOCK_PRINTER")
                .unwrap_or_else(|| "false".to_string())
                .parse()
                .unwrap_or(false),
        };

        let raw_timeout = var("REMOTE_FETCH_TIMEOUT_SECS").unwrap_or_else(|| "30".to_string());
        let fetch = FetchConfig {
            timeout_secs: raw_timeout
                .parse()
                .map_err(|_| ConfigError::InvalidFetchTimeout {
                    value: raw_timeout.clone(),
                })?,
        };

        let config = Config {
            server,
            resources,
            printer,
            fetch,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::InvalidFetchTimeout {
                value: "0".to_string(),
            });
        }

        if self.resources.root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidResourceRoot {
                path: String::new(),
            });
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| ConfigError::InvalidPort)
    }
}
