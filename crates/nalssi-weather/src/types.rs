use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// Two coordinates closer than this on both axes are the same place (~11 m).
pub const COORDINATE_EPSILON: f64 = 0.0001;

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Approximate equality used for favorites matching.
    ///
    /// Not transitive: a chain of points each within epsilon of the next can
    /// drift arbitrarily far.
    pub fn is_near(&self, other: &Coordinate) -> bool {
        (self.latitude - other.latitude).abs() < COORDINATE_EPSILON
            && (self.longitude - other.longitude).abs() < COORDINATE_EPSILON
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Cell of the provider's 5 km Lambert grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

/// Forecast categories the normaliser cares about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ForecastCategory {
    /// Hourly temperature
    Temperature,
    /// Daily maximum
    DailyMax,
    /// Daily minimum
    DailyMin,
    Other(String),
}

impl ForecastCategory {
    pub fn from_code(code: &str) -> Self {
        match code {
            "TMP" => Self::Temperature,
            "TMX" => Self::DailyMax,
            "TMN" => Self::DailyMin,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Temperature => "TMP",
            Self::DailyMax => "TMX",
            Self::DailyMin => "TMN",
            Self::Other(code) => code,
        }
    }
}

/// Fixed-width `YYYYMMDDHHmm` key.
///
/// Ordering is plain string ordering, which matches chronological ordering
/// only because every part is zero-padded to its full width. The constructor
/// enforces that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForecastStamp(String);

impl ForecastStamp {
    pub fn new(date: &str, time: &str) -> Result<Self, WeatherError> {
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WeatherError::InvalidStamp(format!(
                "date must be YYYYMMDD, got {:?}",
                date
            )));
        }
        if time.len() != 4 || !time.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WeatherError::InvalidStamp(format!(
                "time must be HHmm, got {:?}",
                time
            )));
        }
        Ok(Self(format!("{}{}", date, time)))
    }

    pub fn date(&self) -> &str {
        &self.0[..8]
    }

    pub fn time(&self) -> &str {
        &self.0[8..]
    }

    /// Hour component, `0..=23` for well-formed provider data.
    pub fn hour(&self) -> u32 {
        self.0[8..10].parse().unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ForecastStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the provider's time series.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastItem {
    pub issued: ForecastStamp,
    pub category: ForecastCategory,
    pub valid: ForecastStamp,
    /// Raw decimal string as sent by the provider
    pub value: String,
    pub cell: GridCell,
}

impl ForecastItem {
    /// Parsed value; malformed provider data yields NaN.
    pub fn numeric_value(&self) -> f64 {
        self.value.trim().parse().unwrap_or(f64::NAN)
    }
}

/// Hourly temperature entry, `time` formatted as `HH:MM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyTemperature {
    pub time: String,
    pub temp: f64,
}

/// Normalised forecast handed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSummary {
    pub location: String,
    pub current_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    /// Always exactly [`crate::normalize::HOURLY_ENTRIES`] entries
    pub hourly_temps: Vec<HourlyTemperature>,
}

/// Saved location in the favorites collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    pub id: String,
    pub original_location_name: String,
    pub display_title: String,
    pub coordinate: Coordinate,
    pub created_at: DateTime<Utc>,
}

/// Result of [`crate::FavoritesCache::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
    pub added: FavoriteEntry,
    /// Oldest entry dropped to stay within capacity
    pub evicted: Option<FavoriteEntry>,
}

/// Geolocation failures, mirroring the browser `{code, message}` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Geolocation is not supported")]
    Unsupported,
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
}

impl LocationError {
    pub fn code(&self) -> u16 {
        match self {
            Self::Unsupported => 0,
            Self::PermissionDenied => 1,
            Self::ServiceUnavailable => 2,
            Self::Timeout => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_near_within_epsilon() {
        let a = Coordinate::new(37.5665, 126.9780);
        let b = Coordinate::new(37.56655, 126.97805);
        assert!(a.is_near(&b));
        assert!(b.is_near(&a));
    }

    #[test]
    fn test_is_near_outside_epsilon() {
        let a = Coordinate::new(37.5665, 126.9780);
        assert!(!a.is_near(&Coordinate::new(37.5667, 126.9780)));
        assert!(!a.is_near(&Coordinate::new(37.5665, 126.9782)));
    }

    #[test]
    fn test_is_near_not_transitive() {
        let a = Coordinate::new(37.0, 127.0);
        let b = Coordinate::new(37.00006, 127.0);
        let c = Coordinate::new(37.00012, 127.0);
        assert!(a.is_near(&b));
        assert!(b.is_near(&c));
        assert!(!a.is_near(&c));
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(37.5, 127.0).is_valid());
        assert!(!Coordinate::new(91.0, 127.0).is_valid());
        assert!(!Coordinate::new(37.5, -181.0).is_valid());
    }

    #[test]
    fn test_category_codes() {
        assert_eq!(ForecastCategory::from_code("TMP"), ForecastCategory::Temperature);
        assert_eq!(ForecastCategory::from_code("TMX"), ForecastCategory::DailyMax);
        assert_eq!(ForecastCategory::from_code("TMN"), ForecastCategory::DailyMin);
        assert_eq!(
            ForecastCategory::from_code("SKY"),
            ForecastCategory::Other("SKY".to_string())
        );
        assert_eq!(ForecastCategory::from_code("SKY").code(), "SKY");
    }

    #[test]
    fn test_stamp_rejects_bad_width() {
        assert!(ForecastStamp::new("2024011", "1400").is_err());
        assert!(ForecastStamp::new("20240115", "140").is_err());
        assert!(ForecastStamp::new("2024O115", "1400").is_err());
    }

    #[test]
    fn test_stamp_orders_across_dates() {
        let late = ForecastStamp::new("20240115", "2300").unwrap();
        let next_day = ForecastStamp::new("20240116", "0000").unwrap();
        assert!(late < next_day);
        assert_eq!(next_day.date(), "20240116");
        assert_eq!(next_day.time(), "0000");
        assert_eq!(late.hour(), 23);
    }

    #[test]
    fn test_numeric_value_parses_decimal() {
        let item = ForecastItem {
            issued: ForecastStamp::new("20240115", "1100").unwrap(),
            category: ForecastCategory::Temperature,
            valid: ForecastStamp::new("20240115", "1400").unwrap(),
            value: "21.3".to_string(),
            cell: GridCell { x: 60, y: 127 },
        };
        assert_eq!(item.numeric_value(), 21.3);

        let broken = ForecastItem {
            value: "n/a".to_string(),
            ..item
        };
        assert!(broken.numeric_value().is_nan());
    }

    #[test]
    fn test_location_error_codes() {
        assert_eq!(LocationError::Unsupported.code(), 0);
        assert_eq!(LocationError::PermissionDenied.code(), 1);
        assert_eq!(LocationError::ServiceUnavailable.code(), 2);
        assert_eq!(LocationError::Timeout.code(), 3);
    }
}
