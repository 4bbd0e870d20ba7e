//! Configuration management for the Portainer MCP server.

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::error::{Error, Result};

/// Command-line arguments for the Portainer MCP server.
#[derive(Parser, Debug, Clone)]
#[command(name = "portainer-mcp")]
#[command(author = "Portainer MCP Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server exposing Portainer stacks over HTTP/SSE")]
pub struct Args {
    /// Portainer base URL, e.g. http://portainer:9000
    #[arg(long, env = "PORTAINER_URL")]
    pub portainer_url: Option<String>,

    /// Portainer API key, sent as X-API-Key
    #[arg(long, env = "PORTAINER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Address to bind the HTTP listener to
    #[arg(long, default_value = "0.0.0.0", env = "MCP_HOST")]
    pub host: IpAddr,

    /// HTTP port
    #[arg(short, long, default_value = "8000", env = "MCP_PORT")]
    pub port: u16,

    /// Timeout for each Portainer call, in seconds
    #[arg(long, default_value = "10", env = "PORTAINER_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long, env = "MCP_DEBUG")]
    pub debug: bool,
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// Portainer base URL
    pub portainer_url: String,
    /// Portainer API key
    pub api_key: String,
    /// Bind address
    pub host: IpAddr,
    /// HTTP port
    pub port: u16,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Debug mode
    pub debug: bool,
}

impl Config {
    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check required values and their formats.
    pub fn validate(&self) -> Result<()> {
        if self.portainer_url.trim().is_empty() {
            return Err(Error::Config("PORTAINER_URL is required".to_string()));
        }
        let url = reqwest::Url::parse(&self.portainer_url)
            .map_err(|e| Error::Config(format!("PORTAINER_URL is not a valid URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "PORTAINER_URL must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("PORTAINER_API_KEY is required".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "PORTAINER_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("portainer_url", &self.portainer_url)
            .field("api_key", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("timeout_secs", &self.timeout_secs)
            .field("debug", &self.debug)
            .finish()
    }
}

impl TryFrom<Args> for Config {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self> {
        let config = Self {
            portainer_url: args
                .portainer_url
                .ok_or_else(|| Error::Config("PORTAINER_URL is required".to_string()))?,
            api_key: args
                .api_key
                .ok_or_else(|| Error::Config("PORTAINER_API_KEY is required".to_string()))?,
            host: args.host,
            port: args.port,
            timeout_secs: args.timeout_secs,
            debug: args.debug,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portainer_url: String::new(),
            api_key: String::new(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            timeout_secs: 10,
            debug: false,
        }
    }
}
