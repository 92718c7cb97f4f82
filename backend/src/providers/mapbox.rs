use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::GeoPoint;

use super::{DirectionsProvider, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com/directions/v5/mapbox";

/// Mapbox Directions API, profile `cycling` by default.
pub struct MapboxDirections {
    client: Client,
    base_url: String,
    profile: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<[f64; 2]>,
}

impl MapboxDirections {
    pub fn new(
        token: impl Into<String>,
        profile: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: profile.into(),
            token: token.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_url(&self, waypoints: &[GeoPoint]) -> String {
        let coordinates = waypoints
            .iter()
            .map(|p| format!("{},{}", p.lon, p.lat))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/{}/{}?geometries=geojson&overview=full&access_token={}",
            self.base_url.trim_end_matches('/'),
            self.profile,
            coordinates,
            self.token
        )
    }
}

#[async_trait]
impl DirectionsProvider for MapboxDirections {
    async fn route_through(&self, waypoints: &[GeoPoint]) -> Result<Vec<GeoPoint>, ProviderError> {
        if waypoints.len() < 2 {
            return Ok(Vec::new());
        }

        tracing::debug!("requesting {} directions through {} waypoints", self.profile, waypoints.len());
        // The URL carries the access token; keep it out of error messages.
        let response = self
            .client
            .get(self.request_url(waypoints))
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Http(e.without_url()))?;
        decode_geometry(&bytes)
    }
}

/// Coordinates of the first route, converted from `[lon, lat]` pairs.
fn decode_geometry(bytes: &[u8]) -> Result<Vec<GeoPoint>, ProviderError> {
    let response: DirectionsResponse = serde_json::from_slice(bytes)?;
    let path = response
        .routes
        .into_iter()
        .next()
        .and_then(|route| route.geometry)
        .map(|geometry| {
            geometry
                .coordinates
                .into_iter()
                .map(|[lon, lat]| GeoPoint::new(lat, lon))
                .collect()
        })
        .unwrap_or_default();
    Ok(path)
}
