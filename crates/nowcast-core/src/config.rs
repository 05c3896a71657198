use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{AppError, ConfigError};

type Result<T> = std::result::Result<T, AppError>;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds the location cache)
    pub config_dir: PathBuf,

    /// Weather and IP geolocation services
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Device geolocation settings
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// wttr.in style base URL; queries are appended as `{base}{query}?format=j1`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// IP geolocation endpoint returning JSON with city/region/country
    #[serde(default = "default_ip_geolocation_url")]
    pub ip_geolocation_url: String,

    /// Timeout applied to every HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a resolved location stays usable
    #[serde(default = "default_location_ttl_minutes")]
    pub location_ttl_minutes: u64,
}

fn default_base_url() -> String {
    "https://wttr.in/".to_string()
}

fn default_ip_geolocation_url() -> String {
    "https://ipapi.co/json/".to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_location_ttl_minutes() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ip_geolocation_url: default_ip_geolocation_url(),
            request_timeout_secs: default_request_timeout_secs(),
            location_ttl_minutes: default_location_ttl_minutes(),
        }
    }
}

/// Where device coordinates come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationProvider {
    /// Ask the platform location service (GeoClue on Linux)
    #[default]
    System,
    /// Use `latitude`/`longitude` from this file
    Fixed,
    /// Skip device geolocation and go straight to IP lookup
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub provider: GeolocationProvider,

    /// Upper bound on the device location prompt
    #[serde(default = "default_location_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

fn default_location_timeout_secs() -> u64 {
    10
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: GeolocationProvider::default(),
            timeout_secs: default_location_timeout_secs(),
            latitude: None,
            longitude: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nowcast");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load()?.into_validated()
    }

    /// Validate, logging warnings and turning errors into `ConfigError::Invalid`
    pub fn into_validated(self) -> Result<(Self, ValidationResult)> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_url(&self.weather.base_url, "weather.base_url", &mut result);
        Self::validate_url(
            &self.weather.ip_geolocation_url,
            "weather.ip_geolocation_url",
            &mut result,
        );

        if !self.weather.base_url.ends_with('/') {
            result.add_warning(
                "weather.base_url",
                "Base URL should end with '/' so queries append as a path segment",
            );
        }

        Self::validate_timeout(
            self.weather.request_timeout_secs,
            "weather.request_timeout_secs",
            &mut result,
        );
        Self::validate_timeout(
            self.location.timeout_secs,
            "location.timeout_secs",
            &mut result,
        );

        if self.weather.location_ttl_minutes == 0 {
            result.add_error(
                "weather.location_ttl_minutes",
                "Location TTL must be greater than 0",
            );
        } else if self.weather.location_ttl_minutes > 1440 {
            result.add_warning(
                "weather.location_ttl_minutes",
                "Location TTL is more than 24 hours",
            );
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_error("location.latitude", "Latitude must be within -90..=90");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_error(
                        "location.longitude",
                        "Longitude must be within -180..=180",
                    );
                }
            }
            (None, None) => {
                if self.location.provider == GeolocationProvider::Fixed {
                    result.add_error(
                        "location",
                        "Fixed provider requires both latitude and longitude",
                    );
                }
            }
            _ => {
                result.add_error(
                    "location",
                    "Latitude and longitude must be set together",
                );
            }
        }

        result
    }

    fn validate_timeout(secs: u64, field_name: &str, result: &mut ValidationResult) {
        if secs == 0 {
            result.add_error(field_name, "Timeout must be greater than 0");
        } else if secs > 60 {
            result.add_warning(field_name, "Timeout is unusually long (>60s)");
        }
    }

    /// Validate a URL field
    fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Path of the SQLite file holding the location cache
    pub fn cache_db_path(&self) -> PathBuf {
        self.config_dir.join("nowcast.db")
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("platform config directory".into()))?
            .join("nowcast");

        Ok(config_dir.join("config.toml"))
    }
}
