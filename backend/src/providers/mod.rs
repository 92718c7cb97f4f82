//! External data sources consumed by discovery and augmentation.
//!
//! Both are traits so the algorithms can run against deterministic in-memory
//! providers in tests and offline tools.

pub mod cache;
pub mod mapbox;
pub mod overpass;

use std::collections::HashMap;

use async_trait::async_trait;
use shared::GeoPoint;

use crate::geometry::BoundingBox;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid provider response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// One `key=value` tag the POI provider should match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagQuery {
    pub key: String,
    pub value: String,
}

impl TagQuery {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A feature returned by the POI provider.
///
/// Point features carry `point`; areas and ways carry their `center`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiFeature {
    pub id: String,
    pub point: Option<GeoPoint>,
    pub center: Option<GeoPoint>,
    pub tags: HashMap<String, String>,
}

impl PoiFeature {
    /// The coordinate used to represent this feature, if any.
    pub fn position(&self) -> Option<&GeoPoint> {
        self.point.as_ref().or(self.center.as_ref())
    }
}

#[async_trait]
pub trait PoiProvider: Send + Sync {
    /// All features inside `bbox` matching at least one of `tags`.
    async fn features_in(
        &self,
        bbox: BoundingBox,
        tags: &[TagQuery],
    ) -> Result<Vec<PoiFeature>, ProviderError>;
}

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Travel path through 2 or 3 ordered waypoints (entry, POI, optional exit).
    ///
    /// An empty result means the provider found no path.
    async fn route_through(&self, waypoints: &[GeoPoint]) -> Result<Vec<GeoPoint>, ProviderError>;
}
