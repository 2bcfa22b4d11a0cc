use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable overriding `forecast.service_key`
pub const SERVICE_KEY_ENV: &str = "NALSSI_SERVICE_KEY";
/// Environment variable overriding `geocoder.api_key`
pub const GEOCODER_KEY_ENV: &str = "NALSSI_GEOCODER_KEY";

/// Capacity the favorites cache enforces. Mirrors `nalssi_weather::FAVORITES_CAPACITY`.
const FAVORITES_CAPACITY: usize = 6;

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

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub favorites: FavoritesConfig,

    /// Fixed position used as "current location"
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Short-range forecast service root
    #[serde(default = "default_forecast_url")]
    pub base_url: String,

    /// Data portal service key (can be set via NALSSI_SERVICE_KEY)
    #[serde(default)]
    pub service_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Rows requested per call; one issuance for one cell fits in 1000
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_forecast_url() -> String {
    "https://apis.data.go.kr/1360000/VilageFcstInfoService_2.0".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> u32 {
    1000
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_url(),
            service_key: None,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,

    /// REST API key (can be set via NALSSI_GEOCODER_KEY)
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_geocoder_url() -> String {
    "https://dapi.kakao.com/v2/local".to_string()
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritesConfig {
    /// Directory holding the favorites store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Advisory only: the favorites cache always holds at most six entries,
    /// and any other value is reported as a validation warning.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nalssi")
        .join("data")
}

fn default_capacity() -> usize {
    FAVORITES_CAPACITY
}

impl Default for FavoritesConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from an explicit path without environment overrides.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Replace keys with non-empty values from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty(SERVICE_KEY_ENV) {
            tracing::debug!("Using forecast service key from {}", SERVICE_KEY_ENV);
            self.forecast.service_key = Some(key);
        }
        if let Some(key) = non_empty(GEOCODER_KEY_ENV) {
            tracing::debug!("Using geocoder key from {}", GEOCODER_KEY_ENV);
            self.geocoder.api_key = Some(key);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        validate_url(&self.forecast.base_url, "forecast.base_url", &mut result);
        validate_url(&self.geocoder.base_url, "geocoder.base_url", &mut result);

        if is_blank(&self.forecast.service_key) {
            result.add_warning(
                "forecast.service_key",
                format!("Service key not set (set it here or via {})", SERVICE_KEY_ENV),
            );
        }
        if is_blank(&self.geocoder.api_key) {
            result.add_warning(
                "geocoder.api_key",
                "Geocoder key not set - place search will be unavailable",
            );
        }

        if self.forecast.timeout_secs == 0 {
            result.add_error("forecast.timeout_secs", "Timeout must be greater than 0");
        } else if self.forecast.timeout_secs > 120 {
            result.add_warning(
                "forecast.timeout_secs",
                "Timeout is unusually long (>120 seconds)",
            );
        }

        if self.forecast.page_size == 0 {
            result.add_error("forecast.page_size", "Page size must be greater than 0");
        }

        if self.favorites.capacity != FAVORITES_CAPACITY {
            result.add_warning(
                "favorites.capacity",
                format!(
                    "Favorites are always capped at {}; configured value is ignored",
                    FAVORITES_CAPACITY
                ),
            );
        }

        if self.favorites.data_dir.is_file() {
            result.add_error(
                "favorites.data_dir",
                format!(
                    "Path is not a directory: {}",
                    self.favorites.data_dir.display()
                ),
            );
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_error("location.latitude", "Latitude must be within -90..=90");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_error("location.longitude", "Longitude must be within -180..=180");
                }
            }
            (None, None) => {}
            _ => result.add_warning(
                "location",
                "Both latitude and longitude are needed; fixed location ignored",
            ),
        }

        result
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("nalssi");

        Ok(config_dir.join("config.toml"))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        // Missing keys are only warnings
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.iter().any(|w| w.field == "forecast.service_key"));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.forecast.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "forecast.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.geocoder.base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.forecast.timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "forecast.timeout_secs"));
    }

    #[test]
    fn test_capacity_change_is_warning() {
        let mut config = Config::default();
        config.favorites.capacity = 10;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "favorites.capacity"));
    }

    #[test]
    fn test_default_capacity_matches_cache() {
        let config = Config::default();
        assert_eq!(config.favorites.capacity, 6);
        let result = config.validate();
        assert!(!result.warnings.iter().any(|w| w.field == "favorites.capacity"));
    }

    #[test]
    fn test_location_bounds() {
        let mut config = Config::default();
        config.location.latitude = Some(95.0);
        config.location.longitude = Some(127.0);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "location.latitude"));

        config.location.longitude = None;
        config.location.latitude = Some(37.5);
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "location"));
    }

    #[test]
    fn test_overrides_replace_keys() {
        let mut config = Config::default();
        config.forecast.service_key = Some("from-file".to_string());

        config.apply_overrides(|name| match name {
            SERVICE_KEY_ENV => Some("from-env".to_string()),
            GEOCODER_KEY_ENV => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.forecast.service_key.as_deref(), Some("from-env"));
        assert_eq!(config.geocoder.api_key, None);
    }

    #[test]
    fn test_load_creates_default_then_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nalssi").join("config.toml");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.forecast.page_size, 1000);

        let mut edited = created;
        edited.forecast.service_key = Some("abc".to_string());
        edited.location.latitude = Some(37.5665);
        edited.location.longitude = Some(126.978);
        edited.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.forecast.service_key.as_deref(), Some("abc"));
        assert_eq!(loaded.location.latitude, Some(37.5665));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[forecast]\nservice_key = \"k\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.forecast.service_key.as_deref(), Some("k"));
        assert_eq!(config.forecast.timeout_secs, 10);
        assert_eq!(config.geocoder.base_url, "https://dapi.kakao.com/v2/local");
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
