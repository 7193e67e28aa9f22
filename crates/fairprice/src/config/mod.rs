use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::valuation::{
    CoefficientTable, CoefficientTableError, MultiplierBounds, ValuationOptions,
};

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
    pub valuation: ValuationConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            valuation: ValuationConfig::load()?,
        })
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

/// Default valuation options and the coefficient table source.
#[derive(Debug, Clone)]
pub struct ValuationConfig {
    pub defaults: ValuationOptions,
    /// JSON coefficient table replacing the built-in one.
    pub coefficients_path: Option<PathBuf>,
}

impl ValuationConfig {
    fn load() -> Result<Self, ConfigError> {
        let base = ValuationOptions::default();
        let bounds = MultiplierBounds {
            min: parse_var("VALUATION_MULTIPLIER_MIN")?.unwrap_or(base.multiplier_bounds.min),
            max: parse_var("VALUATION_MULTIPLIER_MAX")?.unwrap_or(base.multiplier_bounds.max),
        };

        let defaults = ValuationOptions {
            filter_outliers: flag_var("VALUATION_FILTER_OUTLIERS")?
                .unwrap_or(base.filter_outliers),
            outlier_sigma: parse_var("VALUATION_OUTLIER_SIGMA")?.unwrap_or(base.outlier_sigma),
            min_comparables: parse_var("VALUATION_MIN_COMPARABLES")?
                .unwrap_or(base.min_comparables),
            confidence_level: parse_var("VALUATION_CONFIDENCE_LEVEL")?
                .unwrap_or(base.confidence_level),
            multiplier_bounds: bounds,
            reference_year: parse_var("VALUATION_REFERENCE_YEAR")?
                .unwrap_or(base.reference_year),
            ..base
        };
        defaults
            .validate()
            .map_err(|error| ConfigError::InvalidValuation {
                reason: error.to_string(),
            })?;

        let coefficients_path = env::var("VALUATION_COEFFICIENTS")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            defaults,
            coefficients_path,
        })
    }

    pub fn coefficient_table(&self) -> Result<CoefficientTable, CoefficientTableError> {
        match &self.coefficients_path {
            Some(path) => CoefficientTable::from_path(path),
            None => Ok(CoefficientTable::default()),
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(None),
    }
}

fn flag_var(key: &'static str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue { key, value }),
        },
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str, value: String },
    InvalidValuation { reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{key} has an unparseable value '{value}'")
            }
            ConfigError::InvalidValuation { reason } => {
                write!(f, "valuation defaults are invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidValue { .. }
            | ConfigError::InvalidValuation { .. } => None,
        }
    }
}
