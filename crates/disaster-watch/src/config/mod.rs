use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::reports::verification::{ConfidencePolicy, PolicyError};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub verification: ConfidencePolicy,
    pub proximity: ProximityConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = ConfidencePolicy::default();
        let high_min_yes = read_u32("REPORT_HIGH_CONFIDENCE_MIN_YES", defaults.high_min_yes)?;
        let medium_min_yes =
            read_u32("REPORT_MEDIUM_CONFIDENCE_MIN_YES", defaults.medium_min_yes)?;
        let verification = ConfidencePolicy::new(high_min_yes, medium_min_yes)
            .map_err(ConfigError::InvalidConfidencePolicy)?;

        let proximity = ProximityConfig {
            default_radius_km: read_radius("REPORT_DEFAULT_RADIUS_KM", 10.0)?,
            max_radius_km: read_radius("REPORT_MAX_RADIUS_KM", 500.0)?,
        };
        if proximity.default_radius_km > proximity.max_radius_km {
            return Err(ConfigError::InvalidRadius {
                variable: "REPORT_DEFAULT_RADIUS_KM",
            });
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            verification,
            proximity,
        })
    }
}

fn read_u32(variable: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidCount { variable }),
        Err(_) => Ok(default),
    }
}

fn read_radius(variable: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value = match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidRadius { variable })?,
        Err(_) => default,
    };

    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidRadius { variable })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Radius bounds applied to nearby-report lookups at the HTTP edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityConfig {
    pub default_radius_km: f64,
    pub max_radius_km: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 10.0,
            max_radius_km: 500.0,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCount { variable: &'static str },
    InvalidRadius { variable: &'static str },
    InvalidConfidencePolicy(PolicyError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCount { variable } => {
                write!(f, "{variable} must be a non-negative integer")
            }
            ConfigError::InvalidRadius { variable } => {
                write!(
                    f,
                    "{variable} must be a positive number of kilometres within the configured maximum"
                )
            }
            ConfigError::InvalidConfidencePolicy(err) => {
                write!(f, "invalid confidence thresholds: {err}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidConfidencePolicy(err) => Some(err),
            ConfigError::InvalidPort
            | ConfigError::InvalidCount { .. }
            | ConfigError::InvalidRadius { .. } => None,
        }
    }
}
