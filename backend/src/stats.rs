use shared::{GeoPoint, Route, RouteComparison, RouteStats};

use crate::geometry::path_length_km;

pub fn total_distance_km(route: &Route) -> f64 {
    path_length_km(&route.points)
}

/// Sum of positive elevation steps, in the unit of the route's elevations.
///
/// Only pairs where both points carry an elevation contribute.
pub fn total_elevation_gain(route: &Route) -> f64 {
    elevation_gain(&route.points)
}

fn elevation_gain(points: &[GeoPoint]) -> f64 {
    let mut total_ascent = 0.0;
    for window in points.windows(2) {
        if let (Some(prev), Some(curr)) = (window[0].ele, window[1].ele) {
            let diff = curr - prev;
            if diff > 0.0 {
                total_ascent += diff;
            }
        }
    }
    total_ascent
}

pub fn route_stats(route: &Route) -> RouteStats {
    RouteStats {
        distance_km: total_distance_km(route),
        elevation_gain_m: total_elevation_gain(route),
        point_count: route.points.len(),
        has_elevation: route.points.iter().any(|p| p.ele.is_some()),
    }
}

pub fn compare(original: &Route, modified: &Route) -> RouteComparison {
    let original = route_stats(original);
    let modified = route_stats(modified);
    RouteComparison {
        added_distance_km: modified.distance_km - original.distance_km,
        added_elevation_gain_m: modified.elevation_gain_m - original.elevation_gain_m,
        original,
        modified,
    }
}
