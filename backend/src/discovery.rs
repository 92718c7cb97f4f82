use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use shared::{CandidatePoi, CategoryFilter, GeoPoint};

use crate::error::RouteError;
use crate::geometry::{
    BoundingBox, cumulative_distance_to, min_distance_to_route, nearest_point_index,
};
use crate::providers::{PoiFeature, PoiProvider, TagQuery};

pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Find POIs of the enabled categories within `max_deviation_km` of the route.
///
/// The provider is queried once with a bounding box around the whole route; the
/// exact per-feature distance filter is applied afterwards. Results are unique by
/// provider id and sorted by distance along the route. Nothing is requested when
/// the route is empty or no category is enabled.
pub async fn fetch_candidates(
    provider: &dyn PoiProvider,
    route: &[GeoPoint],
    filters: &[CategoryFilter],
    max_deviation_km: f64,
) -> Result<Vec<CandidatePoi>, RouteError> {
    if !max_deviation_km.is_finite() || max_deviation_km < 0.0 {
        return Err(RouteError::Validation(format!(
            "invalid deviation distance {max_deviation_km}"
        )));
    }

    let enabled: Vec<&CategoryFilter> = filters.iter().filter(|f| f.enabled).collect();
    let Some(bbox) = BoundingBox::around_route(route, max_deviation_km) else {
        return Ok(Vec::new());
    };
    if enabled.is_empty() {
        return Ok(Vec::new());
    }

    let tags = tag_queries(&enabled);
    tracing::info!(
        "searching {} categories ({} tags) within {:.1} km of a {}-point route",
        enabled.len(),
        tags.len(),
        max_deviation_km,
        route.len()
    );

    let features = provider.features_in(bbox, &tags).await.map_err(|err| {
        tracing::error!("POI discovery failed: {err}");
        RouteError::Network(err)
    })?;

    let candidates = shape_candidates(route, &enabled, max_deviation_km, features);
    tracing::info!("{} candidates kept after distance filter", candidates.len());
    Ok(candidates)
}

/// Distinct tag queries of the enabled filters, in filter order.
fn tag_queries(enabled: &[&CategoryFilter]) -> Vec<TagQuery> {
    let mut seen = HashSet::new();
    enabled
        .iter()
        .flat_map(|filter| filter.tag_pairs())
        .filter(|pair| seen.insert(*pair))
        .map(|(key, value)| TagQuery::new(key, value))
        .collect()
}

/// Turn raw provider features into sorted, filtered candidates.
pub fn shape_candidates(
    route: &[GeoPoint],
    enabled: &[&CategoryFilter],
    max_deviation_km: f64,
    features: Vec<PoiFeature>,
) -> Vec<CandidatePoi> {
    if route.is_empty() {
        return Vec::new();
    }

    let mut seen_ids = HashSet::new();
    let unique: Vec<PoiFeature> = features
        .into_iter()
        .filter(|feature| seen_ids.insert(feature.id.clone()))
        .collect();

    let mut candidates: Vec<CandidatePoi> = unique
        .into_par_iter()
        .filter_map(|feature| {
            let location = feature.position()?.clone();
            let distance_from_route_km = min_distance_to_route(&location, route);
            if distance_from_route_km > max_deviation_km {
                return None;
            }

            let nearest = nearest_point_index(&location, route)?;
            let distance_along_route_km = cumulative_distance_to(nearest, route);
            let category = category_label(&feature.tags, enabled);
            let name = display_name(&feature.tags, &category, &feature.id);

            Some(CandidatePoi {
                id: feature.id,
                name,
                category,
                location,
                distance_from_route_km,
                distance_along_route_km,
                selected: false,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.distance_along_route_km.total_cmp(&b.distance_along_route_km));
    candidates
}

fn category_label(tags: &HashMap<String, String>, enabled: &[&CategoryFilter]) -> String {
    enabled
        .iter()
        .find(|filter| {
            filter
                .tag_pairs()
                .any(|(key, value)| tags.get(key).is_some_and(|v| v == value))
        })
        .map(|filter| filter.label.clone())
        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())
}

fn display_name(tags: &HashMap<String, String>, category: &str, id: &str) -> String {
    ["name", "name:en", "operator"]
        .iter()
        .filter_map(|key| tags.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{category} #{id}"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::providers::ProviderError;

    fn route() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(45.0, 5.0),
            GeoPoint::new(45.0, 5.05),
            GeoPoint::new(45.0, 5.1),
        ]
    }

    fn feature(id: &str, lat: f64, lon: f64, tags: &[(&str, &str)]) -> PoiFeature {
        PoiFeature {
            id: id.to_string(),
            point: Some(GeoPoint::new(lat, lon)),
            center: None,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    struct StaticPois {
        features: Vec<PoiFeature>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PoiProvider for StaticPois {
        async fn features_in(
            &self,
            _bbox: BoundingBox,
            _tags: &[TagQuery],
        ) -> Result<Vec<PoiFeature>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.features.clone())
        }
    }

    struct FailingPois;

    #[async_trait]
    impl PoiProvider for FailingPois {
        async fn features_in(
            &self,
            _bbox: BoundingBox,
            _tags: &[TagQuery],
        ) -> Result<Vec<PoiFeature>, ProviderError> {
            Err(ProviderError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn filters_sorts_and_deduplicates() {
        let filters = CategoryFilter::defaults();
        let enabled: Vec<&CategoryFilter> = filters.iter().filter(|f| f.enabled).collect();
        let features = vec![
            feature("3", 45.001, 5.1, &[("amenity", "drinking_water")]),
            feature("1", 45.001, 5.0, &[("amenity", "drinking_water"), ("name", "Fontaine")]),
            feature("1", 45.5, 5.0, &[("amenity", "drinking_water")]),
            feature("2", 45.3, 5.05, &[("amenity", "drinking_water")]),
        ];

        let candidates = shape_candidates(&route(), &enabled, 2.0, features);
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(candidates[0].name, "Fontaine");
        assert_eq!(candidates[0].distance_along_route_km, 0.0);
        assert_eq!(candidates[1].name, "Water Supply #3");
        assert!(candidates.iter().all(|c| c.distance_from_route_km <= 2.0));
        assert!(candidates.iter().all(|c| !c.selected));
    }

    #[test]
    fn uses_way_center_and_skips_positionless_features() {
        let filters = CategoryFilter::defaults();
        let enabled: Vec<&CategoryFilter> = filters.iter().collect();
        let mut way = feature("10", 0.0, 0.0, &[("shop", "supermarket")]);
        way.point = None;
        way.center = Some(GeoPoint::new(45.002, 5.05));
        let mut nowhere = feature("11", 0.0, 0.0, &[("shop", "general")]);
        nowhere.point = None;

        let candidates = shape_candidates(&route(), &enabled, 1.0, vec![way, nowhere]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].category, "Stores");
        assert_eq!(candidates[0].location, GeoPoint::new(45.002, 5.05));
    }

    #[test]
    fn name_fallback_order() {
        let mut tags = HashMap::new();
        tags.insert("operator".to_string(), "Commune".to_string());
        assert_eq!(display_name(&tags, "Water Supply", "7"), "Commune");
        tags.insert("name:en".to_string(), "Town fountain".to_string());
        assert_eq!(display_name(&tags, "Water Supply", "7"), "Town fountain");
        tags.insert("name".to_string(), "".to_string());
        assert_eq!(display_name(&tags, "Water Supply", "7"), "Town fountain");
        assert_eq!(display_name(&HashMap::new(), "Stores", "8"), "Stores #8");
    }

    #[test]
    fn unmatched_tags_are_unknown_category() {
        let filters = CategoryFilter::defaults();
        let enabled: Vec<&CategoryFilter> = filters.iter().collect();
        let mut tags = HashMap::new();
        tags.insert("amenity".to_string(), "bench".to_string());
        assert_eq!(category_label(&tags, &enabled), UNKNOWN_CATEGORY);
    }

    #[test]
    fn tag_queries_are_distinct() {
        let a = CategoryFilter::new("a", "A", true, &["amenity=cafe", "shop=bakery"]);
        let b = CategoryFilter::new("b", "B", true, &["amenity=cafe"]);
        let queries = tag_queries(&[&a, &b]);
        assert_eq!(queries.len(), 2);
    }

    #[tokio::test]
    async fn no_enabled_filters_skips_provider() {
        let provider = StaticPois {
            features: vec![feature("1", 45.0, 5.0, &[("amenity", "drinking_water")])],
            calls: AtomicUsize::new(0),
        };
        let mut filters = CategoryFilter::defaults();
        filters.iter_mut().for_each(|f| f.enabled = false);

        let result = fetch_candidates(&provider, &route(), &filters, 5.0).await.unwrap();
        assert!(result.is_empty());
        let result = fetch_candidates(&provider, &[], &CategoryFilter::defaults(), 5.0)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_a_network_error() {
        let result = fetch_candidates(&FailingPois, &route(), &CategoryFilter::defaults(), 5.0).await;
        assert!(matches!(result, Err(RouteError::Network(_))));
    }

    #[tokio::test]
    async fn negative_deviation_is_rejected() {
        let result = fetch_candidates(&FailingPois, &route(), &CategoryFilter::defaults(), -1.0).await;
        assert!(matches!(result, Err(RouteError::Validation(_))));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_within_deviation_and_sorted(
                offsets in prop::collection::vec((-0.05f64..0.05, -0.05f64..0.15), 0..40),
                max_deviation in 0.1f64..5.0
            ) {
                let filters = CategoryFilter::defaults();
                let enabled: Vec<&CategoryFilter> = filters.iter().collect();
                let features = offsets
                    .iter()
                    .enumerate()
                    .map(|(i, (dlat, lon))| {
                        feature(&i.to_string(), 45.0 + dlat, 5.0 + lon, &[("amenity", "cafe")])
                    })
                    .collect();

                let candidates = shape_candidates(&route(), &enabled, max_deviation, features);
                for candidate in &candidates {
                    prop_assert!(candidate.distance_from_route_km <= max_deviation);
                }
                for pair in candidates.windows(2) {
                    prop_assert!(pair[0].distance_along_route_km <= pair[1].distance_along_route_km);
                }
            }
        }
    }
}
