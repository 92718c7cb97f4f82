use shared::{
    CandidatePoi, CategoryFilter, Route, RouteComparison, RouteSummary, SessionSnapshot,
};

use crate::error::RouteError;
use crate::stats::{compare, route_stats};

/// Largest accepted deviation radius. Wider search boxes around long routes
/// outrun the Overpass query timeout.
pub const MAX_DEVIATION_LIMIT_KM: f64 = 50.0;

/// Application state of one user: loaded route, filters, candidates and the
/// derived modified route.
///
/// `revision` changes whenever the route, the search parameters (filters and
/// deviation), the candidate list or the selection changes, so async work started from an older state can detect that its result
/// no longer applies.
#[derive(Debug, Clone)]
pub struct Session {
    route: Option<Route>,
    file_name: Option<String>,
    filters: Vec<CategoryFilter>,
    default_deviation_km: f64,
    max_deviation_km: f64,
    candidates: Vec<CandidatePoi>,
    modified: Option<Route>,
    revision: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(shared::default_max_deviation_km())
    }
}

impl Session {
    pub fn new(default_deviation_km: f64) -> Self {
        Self {
            route: None,
            file_name: None,
            filters: CategoryFilter::defaults(),
            default_deviation_km,
            max_deviation_km: default_deviation_km,
            candidates: Vec::new(),
            modified: None,
            revision: 0,
        }
    }

    /// Replace the loaded route. Candidates and the modified route are cleared.
    pub fn load_route(
        &mut self,
        route: Route,
        file_name: Option<String>,
    ) -> Result<RouteSummary, RouteError> {
        if route.is_empty() {
            return Err(RouteError::EmptyRoute);
        }
        tracing::info!(
            "loaded route {:?} with {} points",
            route.name.as_deref().unwrap_or("<unnamed>"),
            route.points.len()
        );
        self.route = Some(route);
        self.file_name = file_name;
        self.candidates.clear();
        self.modified = None;
        self.bump();
        self.route_summary().ok_or(RouteError::NoRouteLoaded)
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn require_route(&self) -> Result<&Route, RouteError> {
        self.route.as_ref().ok_or(RouteError::NoRouteLoaded)
    }

    pub fn route_summary(&self) -> Option<RouteSummary> {
        self.route.as_ref().map(|route| RouteSummary {
            name: route.name.clone(),
            file_name: self.file_name.clone(),
            stats: route_stats(route),
        })
    }

    pub fn filters(&self) -> &[CategoryFilter] {
        &self.filters
    }

    pub fn toggle_filter(&mut self, id: &str) -> Result<&[CategoryFilter], RouteError> {
        let filter = self
            .filters
            .iter_mut()
            .find(|filter| filter.id == id)
            .ok_or_else(|| RouteError::Validation(format!("unknown category filter '{id}'")))?;
        filter.enabled = !filter.enabled;
        tracing::debug!("category {} enabled: {}", filter.id, filter.enabled);
        self.bump();
        Ok(&self.filters)
    }

    pub fn max_deviation_km(&self) -> f64 {
        self.max_deviation_km
    }

    /// Accepts finite values in `(0, MAX_DEVIATION_LIMIT_KM]`.
    pub fn set_max_deviation(&mut self, km: f64) -> Result<f64, RouteError> {
        if !km.is_finite() || km <= 0.0 || km > MAX_DEVIATION_LIMIT_KM {
            return Err(RouteError::Validation(format!(
                "deviation must be greater than 0 and at most {MAX_DEVIATION_LIMIT_KM} km, got {km}"
            )));
        }
        if km != self.max_deviation_km {
            self.max_deviation_km = km;
            self.bump();
        }
        Ok(km)
    }

    pub fn candidates(&self) -> &[CandidatePoi] {
        &self.candidates
    }

    pub fn set_candidates(&mut self, candidates: Vec<CandidatePoi>) {
        self.candidates = candidates;
        self.modified = None;
        self.bump();
    }

    /// Flip the selection of one candidate; the modified route becomes stale.
    pub fn toggle_candidate(&mut self, id: &str) -> Result<&CandidatePoi, RouteError> {
        let index = self
            .candidates
            .iter()
            .position(|poi| poi.id == id)
            .ok_or_else(|| RouteError::Validation(format!("unknown POI '{id}'")))?;
        self.modified = None;
        self.bump();
        let poi = &mut self.candidates[index];
        poi.selected = !poi.selected;
        Ok(poi)
    }

    pub fn selected_count(&self) -> usize {
        self.candidates.iter().filter(|poi| poi.selected).count()
    }

    pub fn set_modified_route(&mut self, route: Route) {
        self.modified = Some(route);
    }

    pub fn modified_route(&self) -> Option<&Route> {
        self.modified.as_ref()
    }

    pub fn comparison(&self) -> Option<RouteComparison> {
        match (&self.route, &self.modified) {
            (Some(original), Some(modified)) => Some(compare(original, modified)),
            _ => None,
        }
    }

    /// The route to hand to the export surface.
    ///
    /// With `prefer_modified` the modified route is used when one exists,
    /// otherwise the original.
    pub fn export_route(&self, prefer_modified: bool) -> Result<&Route, RouteError> {
        let original = self.require_route()?;
        Ok(match (&self.modified, prefer_modified) {
            (Some(modified), true) => modified,
            _ => original,
        })
    }

    /// Back to defaults with nothing loaded.
    pub fn reset(&mut self) {
        let revision = self.revision;
        *self = Self::new(self.default_deviation_km);
        self.revision = revision;
        self.bump();
        tracing::info!("session reset");
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            route: self.route_summary(),
            filters: self.filters.clone(),
            max_deviation_km: self.max_deviation_km,
            candidates: self.candidates.clone(),
            selected_count: self.selected_count(),
            has_modified_route: self.modified.is_some(),
        }
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use shared::GeoPoint;

    use super::*;

    fn route() -> Route {
        Route::new(
            "Loop",
            vec![GeoPoint::new(45.0, 5.0), GeoPoint::new(45.01, 5.01)],
        )
    }

    fn candidate(id: &str) -> CandidatePoi {
        CandidatePoi {
            id: id.to_string(),
            name: id.to_string(),
            category: "Water Supply".to_string(),
            location: GeoPoint::new(45.005, 5.0),
            distance_from_route_km: 0.5,
            distance_along_route_km: 0.0,
            selected: false,
        }
    }

    #[test]
    fn load_rejects_empty_route() {
        let mut session = Session::default();
        assert!(matches!(
            session.load_route(Route::default(), None),
            Err(RouteError::EmptyRoute)
        ));
        assert!(session.route().is_none());
    }

    #[test]
    fn load_replaces_route_and_clears_derived_state() {
        let mut session = Session::default();
        session.load_route(route(), Some("a.gpx".into())).unwrap();
        session.set_candidates(vec![candidate("1")]);
        session.set_modified_route(route());

        let summary = session.load_route(route(), Some("b.gpx".into())).unwrap();
        assert_eq!(summary.file_name.as_deref(), Some("b.gpx"));
        assert_eq!(summary.stats.point_count, 2);
        assert!(session.candidates().is_empty());
        assert!(session.modified_route().is_none());
    }

    #[test]
    fn deviation_bounds() {
        let mut session = Session::default();
        assert_eq!(session.max_deviation_km(), 5.0);
        assert_eq!(session.set_max_deviation(12.5).unwrap(), 12.5);
        for bad in [0.0, -1.0, 50.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                session.set_max_deviation(bad),
                Err(RouteError::Validation(_))
            ));
        }
        assert_eq!(session.max_deviation_km(), 12.5);
        assert!(session.set_max_deviation(MAX_DEVIATION_LIMIT_KM).is_ok());
    }

    #[test]
    fn search_parameter_changes_bump_revision() {
        let mut session = Session::default();
        let start = session.revision();

        session.set_max_deviation(5.0).unwrap();
        assert_eq!(session.revision(), start);
        session.set_max_deviation(2.0).unwrap();
        let after_deviation = session.revision();
        assert_ne!(after_deviation, start);
        assert!(session.set_max_deviation(-3.0).is_err());
        assert_eq!(session.revision(), after_deviation);

        session.toggle_filter("food").unwrap();
        let after_filter = session.revision();
        assert_ne!(after_filter, after_deviation);
        assert!(session.toggle_filter("fuel").is_err());
        assert_eq!(session.revision(), after_filter);
    }

    #[test]
    fn toggle_filter_flips_and_rejects_unknown() {
        let mut session = Session::default();
        let filters = session.toggle_filter("store").unwrap();
        assert!(filters.iter().find(|f| f.id == "store").unwrap().enabled);
        session.toggle_filter("store").unwrap();
        assert!(!session.filters()[1].enabled);
        assert!(session.toggle_filter("fuel").is_err());
    }

    #[test]
    fn toggling_candidates_counts_and_invalidates() {
        let mut session = Session::default();
        session.load_route(route(), None).unwrap();
        session.set_candidates(vec![candidate("1"), candidate("2")]);
        session.set_modified_route(route());
        let before = session.revision();

        assert!(session.toggle_candidate("2").unwrap().selected);
        assert_eq!(session.selected_count(), 1);
        assert!(session.modified_route().is_none());
        assert_ne!(session.revision(), before);

        assert!(!session.toggle_candidate("2").unwrap().selected);
        assert_eq!(session.selected_count(), 0);
        assert!(matches!(
            session.toggle_candidate("404"),
            Err(RouteError::Validation(_))
        ));
    }

    #[test]
    fn export_prefers_modified_when_asked() {
        let mut session = Session::default();
        assert!(matches!(
            session.export_route(true),
            Err(RouteError::NoRouteLoaded)
        ));

        session.load_route(route(), None).unwrap();
        assert_eq!(session.export_route(true).unwrap().name.as_deref(), Some("Loop"));

        let mut modified = route();
        modified.name = Some("Loop (Modified)".into());
        session.set_modified_route(modified);
        assert_eq!(
            session.export_route(true).unwrap().name.as_deref(),
            Some("Loop (Modified)")
        );
        assert_eq!(session.export_route(false).unwrap().name.as_deref(), Some("Loop"));
        assert!(session.comparison().is_some());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut session = Session::new(8.0);
        session.load_route(route(), None).unwrap();
        session.toggle_filter("food").unwrap();
        session.set_max_deviation(20.0).unwrap();
        session.set_candidates(vec![candidate("1")]);
        let before = session.revision();

        session.reset();
        let snapshot = session.snapshot();
        assert!(snapshot.route.is_none());
        assert_eq!(snapshot.max_deviation_km, 8.0);
        assert_eq!(snapshot.filters, CategoryFilter::defaults());
        assert!(snapshot.candidates.is_empty());
        assert!(!snapshot.has_modified_route);
        assert!(session.revision() > before);
    }
}
