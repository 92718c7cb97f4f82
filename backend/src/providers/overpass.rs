use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::GeoPoint;

use super::{PoiFeature, PoiProvider, ProviderError, TagQuery};
use crate::geometry::BoundingBox;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// OpenStreetMap Overpass API client.
pub struct OverpassClient {
    client: Client,
    url: String,
    query_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<LatLon>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

impl OverpassClient {
    pub fn new(
        url: impl Into<String>,
        http_timeout: Duration,
        query_timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(http_timeout)
            .user_agent(concat!("refuel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            query_timeout_secs,
        })
    }
}

#[async_trait]
impl PoiProvider for OverpassClient {
    async fn features_in(
        &self,
        bbox: BoundingBox,
        tags: &[TagQuery],
    ) -> Result<Vec<PoiFeature>, ProviderError> {
        let query = build_query(&bbox, tags, self.query_timeout_secs);
        tracing::debug!("overpass query for {} tags in {:?}", tags.len(), bbox);

        let response = self.client.post(&self.url).body(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("overpass answered {status}");
            return Err(ProviderError::Status(status));
        }

        let bytes = response.bytes().await?;
        let features = decode_elements(&bytes)?;
        tracing::info!("overpass returned {} features", features.len());
        Ok(features)
    }
}

/// One union query, a node and a way clause per tag, with way centers.
pub fn build_query(bbox: &BoundingBox, tags: &[TagQuery], timeout_secs: u64) -> String {
    let area = format!(
        "{},{},{},{}",
        bbox.min_lat, bbox.min_lon, bbox.max_lat, bbox.max_lon
    );
    let mut query = format!("[out:json][timeout:{timeout_secs}];(\n");
    for tag in tags {
        let _ = writeln!(query, "  node[\"{}\"=\"{}\"]({area});", tag.key, tag.value);
        let _ = writeln!(query, "  way[\"{}\"=\"{}\"]({area});", tag.key, tag.value);
    }
    query.push_str(");\nout center;");
    query
}

fn decode_elements(bytes: &[u8]) -> Result<Vec<PoiFeature>, ProviderError> {
    let response: OverpassResponse = serde_json::from_slice(bytes)?;
    let features = response
        .elements
        .into_iter()
        .filter_map(|element| {
            let point = match (element.kind.as_str(), element.lat, element.lon) {
                ("node", Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
                _ => None,
            };
            let center = element.center.map(|c| GeoPoint::new(c.lat, c.lon));
            if point.is_none() && center.is_none() {
                return None;
            }
            Some(PoiFeature {
                id: element.id.to_string(),
                point,
                center,
                tags: element.tags,
            })
        })
        .collect();
    Ok(features)
}
