// Position source for "current location" lookups.
//
// There is no platform geolocation backend; the position comes from
// configuration or is reported as unavailable.
use crate::types::{Coordinate, LocationError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocationSource {
    fixed: Option<Coordinate>,
}

impl LocationSource {
    pub fn fixed(coordinate: Coordinate) -> Self {
        Self {
            fixed: Some(coordinate),
        }
    }

    pub fn unavailable() -> Self {
        Self { fixed: None }
    }

    /// Builds a source from optional configured latitude/longitude.
    pub fn from_config(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Self::fixed(Coordinate::new(latitude, longitude)),
            _ => Self::unavailable(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.fixed.is_some()
    }

    pub async fn current_position(&self) -> Result<Coordinate, LocationError> {
        match self.fixed {
            Some(coordinate) if coordinate.is_valid() => Ok(coordinate),
            Some(coordinate) => {
                tracing::warn!("Configured location {:?} is out of range", coordinate);
                Err(LocationError::Unsupported)
            }
            None => Err(LocationError::ServiceUnavailable),
        }
    }
}
