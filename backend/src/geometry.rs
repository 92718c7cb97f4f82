use shared::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;
/// Flat conversion used for search boxes, on both axes.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance between two points (haversine).
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Index of the route point closest to `point`. Ties go to the lowest index.
///
/// Returns `None` for an empty route.
pub fn nearest_point_index(point: &GeoPoint, route: &[GeoPoint]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in route.iter().enumerate() {
        let distance = distance_km(point, candidate);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Smallest distance from `point` to any vertex of `route`, `f64::INFINITY` when empty.
pub fn min_distance_to_route(point: &GeoPoint, route: &[GeoPoint]) -> f64 {
    route
        .iter()
        .map(|candidate| distance_km(point, candidate))
        .fold(f64::INFINITY, f64::min)
}

/// Path length from the first point up to `route[index]`.
pub fn cumulative_distance_to(index: usize, route: &[GeoPoint]) -> f64 {
    let end = index.saturating_add(1).min(route.len());
    path_length_km(&route[..end])
}

pub fn path_length_km(path: &[GeoPoint]) -> f64 {
    path.windows(2).map(|w| distance_km(&w[0], &w[1])).sum()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Box around every route point, widened by `margin_km` on each side.
    ///
    /// The margin uses 1 degree ≈ 111 km for latitude and longitude alike, which
    /// understates the longitude margin away from the equator. Callers filter on
    /// exact distance afterwards.
    pub fn around_route(route: &[GeoPoint], margin_km: f64) -> Option<Self> {
        let first = route.first()?;
        let mut bbox = BoundingBox {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lon: first.lon,
            max_lon: first.lon,
        };
        for point in &route[1..] {
            bbox.min_lat = bbox.min_lat.min(point.lat);
            bbox.max_lat = bbox.max_lat.max(point.lat);
            bbox.min_lon = bbox.min_lon.min(point.lon);
            bbox.max_lon = bbox.max_lon.max(point.lon);
        }

        let margin_deg = margin_km.max(0.0) / KM_PER_DEGREE;
        Some(BoundingBox {
            min_lat: bbox.min_lat - margin_deg,
            max_lat: bbox.max_lat + margin_deg,
            min_lon: bbox.min_lon - margin_deg,
            max_lon: bbox.max_lon + margin_deg,
        })
    }
}
