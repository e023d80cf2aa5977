//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::util::rate_limit::INPUT_RATE_LIMIT;
use crate::util::time::DEFAULT_TICK_RATE;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Obstacles placed at the start of each session
    pub obstacle_count: usize,
    /// Seed for obstacle layouts; random when unset
    pub obstacle_seed: Option<u64>,

    /// Snapshots buffered per socket before it is dropped
    pub outbound_buffer: usize,
    /// Time allowed for a single socket send
    pub send_timeout: Duration,
    /// Inbound messages allowed per socket per second
    pub input_rate_limit: u32,

    /// Allowed client origins for CORS; any origin when unset
    pub client_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            tick_rate: DEFAULT_TICK_RATE,
            obstacle_count: 5,
            obstacle_seed: None,
            outbound_buffer: 64,
            send_timeout: Duration::from_millis(1000),
            input_rate_limit: INPUT_RATE_LIMIT,
            client_origin: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?
        } else if let Ok(addr) = env::var("SERVER_ADDR") {
            addr.parse().map_err(|_| ConfigError::InvalidAddress)?
        } else {
            defaults.server_addr
        };

        let tick_rate = parse_var("TICK_RATE", defaults.tick_rate)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }

        let outbound_buffer = parse_var("OUTBOUND_BUFFER", defaults.outbound_buffer)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::Invalid("OUTBOUND_BUFFER"));
        }

        Ok(Self {
            server_addr,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            tick_rate,
            obstacle_count: parse_var("OBSTACLE_COUNT", defaults.obstacle_count)?,
            obstacle_seed: match env::var("OBSTACLE_SEED") {
                Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid("OBSTACLE_SEED"))?),
                Err(_) => None,
            },
            outbound_buffer,
            send_timeout: Duration::from_millis(parse_var(
                "SEND_TIMEOUT_MS",
                defaults.send_timeout.as_millis() as u64,
            )?),
            input_rate_limit: parse_var("INPUT_RATE_LIMIT", defaults.input_rate_limit)?,
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Read an optional variable, keeping the default when it is unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
