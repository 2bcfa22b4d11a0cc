//! Address search and reverse lookup against a Kakao-style local API.
//!
//! Place names only ever become labels; any failure in the reverse lookup
//! degrades to [`UNKNOWN_REGION`].

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::error::WeatherError;
use crate::provider::{truncate, MAX_ERROR_BODY};
use crate::types::Coordinate;

const GEOCODER_API_BASE: &str = "https://dapi.kakao.com/v2/local";

/// Label used when a coordinate cannot be named.
pub const UNKNOWN_REGION: &str = "Unknown location";

/// Legal district first, then administrative district.
const REGION_TYPE_PREFERENCE: [&str; 2] = ["B", "H"];

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct AddressSearchResponse {
    meta: Meta,
    #[serde(default)]
    documents: Vec<AddressDocument>,
}

#[derive(Debug, Deserialize)]
struct AddressDocument {
    address_name: String,
    /// Longitude as a decimal string
    x: String,
    /// Latitude as a decimal string
    y: String,
}

#[derive(Debug, Deserialize)]
struct RegionResponse {
    #[serde(default)]
    documents: Vec<RegionDocument>,
}

#[derive(Debug, Deserialize)]
struct RegionDocument {
    region_type: String,
    address_name: String,
}

#[derive(Debug, Deserialize)]
struct CoordAddressResponse {
    #[serde(default)]
    documents: Vec<CoordAddressDocument>,
}

#[derive(Debug, Deserialize)]
struct CoordAddressDocument {
    address: Option<NamedAddress>,
    road_address: Option<NamedAddress>,
}

#[derive(Debug, Deserialize)]
struct NamedAddress {
    address_name: String,
}

/// One candidate for a free-text address query.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressMatch {
    pub coordinate: Coordinate,
    pub matched_name: String,
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl Geocoder {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: GEOCODER_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn auth_header(&self) -> Result<String, WeatherError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(format!("KakaoAK {}", key)),
            _ => Err(WeatherError::Configuration(
                "geocoder API key is not set".to_string(),
            )),
        }
    }

    /// Resolve free text to candidate coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn resolve_address(&self, text: &str) -> Result<Vec<AddressMatch>, WeatherError> {
        let response: AddressSearchResponse = self
            .get_json(
                "/search/address.json",
                &[("query", text), ("analyze_type", "similar")],
            )
            .await?;

        if response.meta.total_count == 0 || response.documents.is_empty() {
            return Err(WeatherError::NoData(format!("no address matches {:?}", text)));
        }

        let matches = response
            .documents
            .into_iter()
            .filter_map(|doc| {
                match (doc.y.trim().parse::<f64>(), doc.x.trim().parse::<f64>()) {
                    (Ok(latitude), Ok(longitude)) => Some(AddressMatch {
                        coordinate: Coordinate::new(latitude, longitude),
                        matched_name: doc.address_name,
                    }),
                    _ => {
                        tracing::warn!("Skipping address with bad coordinates: {}", doc.address_name);
                        None
                    }
                }
            })
            .collect();

        Ok(matches)
    }

    /// Human-readable region for a coordinate, or [`UNKNOWN_REGION`].
    pub async fn resolve_region_name(&self, coordinate: &Coordinate) -> String {
        match self.lookup_region_name(coordinate).await {
            Ok(Some(name)) => {
                tracing::info!("Reverse geocoded to: {}", name);
                name
            }
            Ok(None) => UNKNOWN_REGION.to_string(),
            Err(e) => {
                tracing::debug!("Reverse geocode failed: {}", e);
                UNKNOWN_REGION.to_string()
            }
        }
    }

    async fn lookup_region_name(
        &self,
        coordinate: &Coordinate,
    ) -> Result<Option<String>, WeatherError> {
        let x = coordinate.longitude.to_string();
        let y = coordinate.latitude.to_string();

        let regions: RegionResponse = self
            .get_json(
                "/geo/coord2regioncode.json",
                &[
                    ("x", x.as_str()),
                    ("y", y.as_str()),
                    ("input_coord", "WGS84"),
                    ("output_coord", "WGS84"),
                ],
            )
            .await?;

        let district = REGION_TYPE_PREFERENCE.iter().find_map(|kind| {
            regions
                .documents
                .iter()
                .find(|doc| doc.region_type == *kind)
        });
        if let Some(district) = district {
            return Ok(Some(district.address_name.clone()));
        }

        let addresses: CoordAddressResponse = self
            .get_json(
                "/geo/coord2address.json",
                &[("x", x.as_str()), ("y", y.as_str()), ("input_coord", "WGS84")],
            )
            .await?;

        Ok(addresses.documents.into_iter().next().and_then(|doc| {
            doc.address
                .or(doc.road_address)
                .map(|address| address.address_name)
        }))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let auth = self.auth_header()?;

        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", auth)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            tracing::warn!("Geocoder returned HTTP {}", status);
            return Err(WeatherError::Provider {
                code: status.as_u16().to_string(),
                message: truncate(&text, MAX_ERROR_BODY),
            });
        }

        response
            .json()
            .await
            .map_err(|e| WeatherError::Decode(format!("geocoder JSON parse error: {}", e)))
    }
}
