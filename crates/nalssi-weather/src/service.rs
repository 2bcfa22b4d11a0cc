//! Forecast pipeline entry point: fetch, normalise, and refresh favorites.

use chrono::NaiveDateTime;

use crate::clock::provider_now;
use crate::error::WeatherError;
use crate::favorites::FavoritesCache;
use crate::normalize::normalize_at;
use crate::provider::ForecastClient;
use crate::storage::KeyValueStore;
use crate::types::{Coordinate, FavoriteEntry, WeatherSummary};

/// Outcome of refreshing one favorite.
pub type FavoriteRefresh = (FavoriteEntry, Result<WeatherSummary, WeatherError>);

pub struct WeatherService<S: KeyValueStore> {
    client: ForecastClient,
    favorites: FavoritesCache<S>,
}

impl<S: KeyValueStore> WeatherService<S> {
    pub fn new(client: ForecastClient, favorites: FavoritesCache<S>) -> Self {
        Self { client, favorites }
    }

    pub fn client(&self) -> &ForecastClient {
        &self.client
    }

    pub fn favorites(&self) -> &FavoritesCache<S> {
        &self.favorites
    }

    /// Fetch and normalise the forecast at `coordinate`, labelled `label`.
    pub async fn summary_for(
        &self,
        coordinate: &Coordinate,
        label: &str,
    ) -> Result<WeatherSummary, WeatherError> {
        self.summary_at(coordinate, label, provider_now()).await
    }

    /// Same as [`Self::summary_for`] at an explicit provider wall time.
    pub async fn summary_at(
        &self,
        coordinate: &Coordinate,
        label: &str,
        now: NaiveDateTime,
    ) -> Result<WeatherSummary, WeatherError> {
        let items = self.client.fetch_forecast_at(coordinate, now).await?;
        normalize_at(&items, label, now)
    }

    /// Refresh every favorite, in collection order.
    ///
    /// Each entry is fetched on its own; a failure is reported for that
    /// entry and the rest still run.
    pub async fn refresh_favorites(&self) -> Vec<FavoriteRefresh> {
        self.refresh_favorites_at(provider_now()).await
    }

    pub async fn refresh_favorites_at(&self, now: NaiveDateTime) -> Vec<FavoriteRefresh> {
        let entries = self.favorites.all();
        tracing::info!("Refreshing {} favorites", entries.len());

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = self
                .summary_at(&entry.coordinate, &entry.display_title, now)
                .await;
            if let Err(e) = &result {
                tracing::warn!("Refresh failed for {}: {}", entry.display_title, e);
            }
            results.push((entry, result));
        }
        results
    }
}
