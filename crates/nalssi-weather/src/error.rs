//! Forecast pipeline error types.

use thiserror::Error;

use crate::types::LocationError;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// Missing or empty credential. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider error {code}: {message}")]
    Provider { code: String, message: String },

    #[error("No forecast data: {0}")]
    NoData(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid forecast stamp: {0}")]
    InvalidStamp(String),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),
}

impl WeatherError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "An API key is missing. Check your settings.".to_string()
            }
            Self::Transport(e) if e.is_timeout() => {
                "The forecast request timed out. Please try again.".to_string()
            }
            Self::Transport(_) => "Network error. Check your connection.".to_string(),
            Self::Provider { code, .. } => format!("Forecast service error ({})", code),
            Self::NoData(_) => "No forecast is available for this place.".to_string(),
            Self::Decode(_) => "Received an unexpected forecast response.".to_string(),
            Self::InvalidStamp(_) => "Forecast data is malformed.".to_string(),
            Self::Location(e) => format!("Could not determine your location: {}", e),
        }
    }

    /// Whether a caller-level retry can help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = WeatherError::Configuration("service key".into());
        assert!(err.user_message().contains("key"));

        let err = WeatherError::Provider {
            code: "22".into(),
            message: "LIMITED_NUMBER_OF_SERVICE_REQUESTS_EXCEEDS_ERROR".into(),
        };
        assert!(err.user_message().contains("22"));

        let err = WeatherError::NoData("empty".into());
        assert!(err.user_message().contains("No forecast"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(!WeatherError::Configuration("x".into()).is_retryable());
        assert!(!WeatherError::NoData("x".into()).is_retryable());
        assert!(!WeatherError::Decode("x".into()).is_retryable());
        assert!(!WeatherError::Provider {
            code: "99".into(),
            message: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_location_error_conversion() {
        let err: WeatherError = LocationError::PermissionDenied.into();
        assert!(matches!(
            err,
            WeatherError::Location(LocationError::PermissionDenied)
        ));
    }
}
