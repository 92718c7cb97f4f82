//! Route augmentation: weave detours to selected POIs into a route.
//!
//! Every selected POI is attached to the route point nearest to it. Walking the
//! route in order, each original point is emitted followed by the detours
//! attached to it, either a path from the directions provider or, when that is
//! missing or fails, the POI location itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use shared::{CandidatePoi, GeoPoint, Route};
use thiserror::Error;

use crate::geometry::nearest_point_index;
use crate::providers::DirectionsProvider;

/// Two points closer than this on both axes are the same seam point.
pub const SEAM_TOLERANCE_DEG: f64 = 1e-6;
pub const MODIFIED_SUFFIX: &str = "(Modified)";
const UNNAMED_ROUTE: &str = "Route";

#[derive(Debug, Error)]
pub enum AugmentError {
    #[error("cannot insert {0} selected POIs into an empty route")]
    EmptyRoute(usize),
    #[error("POI {0} has no usable location")]
    InvalidLocation(String),
}

pub struct RouteAugmenter {
    directions: Option<Arc<dyn DirectionsProvider>>,
    concurrency: usize,
}

struct DetourRequest<'a> {
    index: usize,
    entry: &'a GeoPoint,
    poi: &'a CandidatePoi,
    exit: Option<&'a GeoPoint>,
}

struct Detour {
    points: Vec<GeoPoint>,
    routed: bool,
}

impl RouteAugmenter {
    pub fn new(directions: Option<Arc<dyn DirectionsProvider>>) -> Self {
        Self {
            directions,
            concurrency: 1,
        }
    }

    /// Straight insertion only.
    pub fn offline() -> Self {
        Self::new(None)
    }

    /// Allow up to `limit` directions requests in flight. Values below 1 mean 1.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn has_directions(&self) -> bool {
        self.directions.is_some()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Build a new route through every selected candidate.
    ///
    /// Unselected candidates are ignored; with nothing selected the original route
    /// is returned as is. Directions failures never fail the call, the affected
    /// POI falls back to straight insertion. Requests may run concurrently but
    /// points are always assembled in route order.
    pub async fn generate(
        &self,
        original: &Route,
        candidates: &[CandidatePoi],
    ) -> Result<Route, AugmentError> {
        let selected: Vec<&CandidatePoi> = candidates.iter().filter(|poi| poi.selected).collect();
        if selected.is_empty() {
            tracing::debug!("no POI selected, route left unchanged");
            return Ok(original.clone());
        }
        if original.points.is_empty() {
            return Err(AugmentError::EmptyRoute(selected.len()));
        }

        let groups = group_by_insertion_index(&original.points, &selected)?;
        tracing::info!(
            "generating detours for {} POIs at {} route points (directions: {}, concurrency: {})",
            selected.len(),
            groups.len(),
            self.has_directions(),
            self.concurrency
        );

        let requests: Vec<DetourRequest<'_>> = groups
            .iter()
            .flat_map(|(&index, pois)| {
                pois.iter().map(move |&poi| DetourRequest {
                    index,
                    entry: &original.points[index],
                    poi,
                    exit: original.points.get(index + 1),
                })
            })
            .collect();

        let fetches: Vec<BoxFuture<'_, Detour>> =
            requests.iter().map(|request| self.detour(request).boxed()).collect();
        let detours: Vec<Detour> = stream::iter(fetches)
            .buffered(self.concurrency)
            .collect()
            .await;

        let routed = detours.iter().filter(|detour| detour.routed).count();
        let extra: usize = detours.iter().map(|detour| detour.points.len()).sum();
        let mut points = Vec::with_capacity(original.points.len() + extra);
        let mut pending = requests.iter().zip(detours).peekable();
        for (index, point) in original.points.iter().enumerate() {
            points.push(point.clone());
            while let Some((_, detour)) = pending.next_if(|(request, _)| request.index == index) {
                points.extend(detour.points);
            }
        }

        tracing::info!(
            "modified route has {} points (was {}), {} routed detours, {} straight insertions",
            points.len(),
            original.points.len(),
            routed,
            requests.len() - routed
        );

        Ok(Route {
            name: Some(modified_name(original.name.as_deref())),
            points,
        })
    }

    async fn detour(&self, request: &DetourRequest<'_>) -> Detour {
        let Some(directions) = &self.directions else {
            return straight(request);
        };

        let mut waypoints = vec![request.entry.clone(), request.poi.location.clone()];
        if let Some(exit) = request.exit {
            waypoints.push(exit.clone());
        }

        match directions.route_through(&waypoints).await {
            Ok(path) => {
                let points = trim_seams(path, request.entry, request.exit);
                if points.is_empty() {
                    tracing::debug!("no path to POI {}, inserting it directly", request.poi.id);
                    straight(request)
                } else {
                    Detour {
                        points,
                        routed: true,
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    "directions to POI {} from point {} failed: {err}",
                    request.poi.id,
                    request.index
                );
                straight(request)
            }
        }
    }
}

fn straight(request: &DetourRequest<'_>) -> Detour {
    Detour {
        points: vec![request.poi.location.clone()],
        routed: false,
    }
}

/// Selected POIs keyed by nearest route index, each group ordered by distance
/// along the route. The sort is stable so equal distances keep input order.
fn group_by_insertion_index<'a>(
    route: &[GeoPoint],
    selected: &[&'a CandidatePoi],
) -> Result<BTreeMap<usize, Vec<&'a CandidatePoi>>, AugmentError> {
    let mut groups: BTreeMap<usize, Vec<&'a CandidatePoi>> = BTreeMap::new();
    for &poi in selected {
        if !poi.location.lat.is_finite() || !poi.location.lon.is_finite() {
            return Err(AugmentError::InvalidLocation(poi.id.clone()));
        }
        let index = nearest_point_index(&poi.location, route)
            .ok_or(AugmentError::EmptyRoute(selected.len()))?;
        groups.entry(index).or_default().push(poi);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.distance_along_route_km.total_cmp(&b.distance_along_route_km));
    }
    Ok(groups)
}

/// Drop a leading point equal to `entry` and a trailing point equal to `exit`.
fn trim_seams(path: Vec<GeoPoint>, entry: &GeoPoint, exit: Option<&GeoPoint>) -> Vec<GeoPoint> {
    let mut inner = path.as_slice();
    if let Some((first, rest)) = inner.split_first() {
        if first.same_position(entry, SEAM_TOLERANCE_DEG) {
            inner = rest;
        }
    }
    if let (Some(exit), Some((last, rest))) = (exit, inner.split_last()) {
        if last.same_position(exit, SEAM_TOLERANCE_DEG) {
            inner = rest;
        }
    }
    inner.to_vec()
}

fn modified_name(name: Option<&str>) -> String {
    let base = name.filter(|name| !name.trim().is_empty()).unwrap_or(UNNAMED_ROUTE);
    format!("{base} {MODIFIED_SUFFIX}")
}
