//! Short-range forecast pipeline for nalssi
//!
//! Projects coordinates onto the provider's 5 km grid, queries the latest
//! available issuance, and normalises the response into a fixed-shape
//! [`WeatherSummary`]. Also holds the bounded favorites collection and the
//! slot-driven refresh scheduler.

pub mod clock;
pub mod error;
pub mod favorites;
pub mod geocode;
pub mod grid;
pub mod location;
pub mod normalize;
pub mod provider;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod types;

pub use error::WeatherError;
pub use favorites::{FavoritesCache, FAVORITES_CAPACITY, FAVORITES_KEY};
pub use geocode::{AddressMatch, Geocoder, UNKNOWN_REGION};
pub use location::LocationSource;
pub use normalize::normalize;
pub use provider::ForecastClient;
pub use scheduler::{RefreshScheduler, SchedulerState};
pub use service::WeatherService;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use types::*;
