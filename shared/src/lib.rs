use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A single position of a route, as read from or written to a GPX file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ele: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            time: None,
        }
    }

    pub fn with_elevation(mut self, ele: f64) -> Self {
        self.ele = Some(ele);
        self
    }

    /// True when both coordinates differ by less than `tolerance` degrees.
    pub fn same_position(&self, other: &GeoPoint, tolerance: f64) -> bool {
        (self.lat - other.lat).abs() < tolerance && (self.lon - other.lon).abs() < tolerance
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub points: Vec<GeoPoint>,
}

impl Route {
    pub fn new(name: impl Into<String>, points: Vec<GeoPoint>) -> Self {
        Self {
            name: Some(name.into()),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A point of interest found near a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePoi {
    pub id: String,
    pub name: String,
    pub category: String,
    pub location: GeoPoint,
    pub distance_from_route_km: f64,
    pub distance_along_route_km: f64,
    #[serde(default)]
    pub selected: bool,
}

/// A user-facing POI category and the provider tags (`key=value`) it searches for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub id: String,
    pub label: String,
    pub enabled: bool,
    pub provider_tags: BTreeSet<String>,
}

impl CategoryFilter {
    pub fn new(id: &str, label: &str, enabled: bool, tags: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            enabled,
            provider_tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    /// Built-in categories: water (enabled), stores and food.
    pub fn defaults() -> Vec<CategoryFilter> {
        vec![
            CategoryFilter::new(
                "water",
                "Water Supply",
                true,
                &[
                    "amenity=drinking_water",
                    "man_made=water_well",
                    "amenity=water_point",
                ],
            ),
            CategoryFilter::new(
                "store",
                "Stores",
                false,
                &["shop=convenience", "shop=supermarket", "shop=general"],
            ),
            CategoryFilter::new(
                "food",
                "Food / Resto",
                false,
                &["amenity=restaurant", "amenity=cafe", "amenity=fast_food"],
            ),
        ]
    }

    /// Provider tags split into `(key, value)`; entries without `=` are skipped.
    pub fn tag_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.provider_tags
            .iter()
            .filter_map(|tag| tag.split_once('='))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteStats {
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub point_count: usize,
    pub has_elevation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteComparison {
    pub original: RouteStats,
    pub modified: RouteStats,
    pub added_distance_km: f64,
    pub added_elevation_gain_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub stats: RouteStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteSummary>,
    pub filters: Vec<CategoryFilter>,
    pub max_deviation_km: f64,
    pub candidates: Vec<CandidatePoi>,
    pub selected_count: usize,
    pub has_modified_route: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviationRequest {
    pub max_deviation_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub route: Route,
    pub comparison: RouteComparison,
    pub gpx_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

pub fn default_max_deviation_km() -> f64 {
    5.0
}
