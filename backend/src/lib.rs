pub mod augment;
pub mod config;
pub mod discovery;
pub mod error;
pub mod geometry;
pub mod gpx_export;
pub mod gpx_import;
pub mod providers;
pub mod session;
pub mod session_handlers;
pub mod stats;

use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::augment::RouteAugmenter;
use crate::config::AppConfig;
use crate::providers::cache::CachedDirections;
use crate::providers::mapbox::MapboxDirections;
use crate::providers::overpass::OverpassClient;
use crate::providers::{DirectionsProvider, PoiProvider, ProviderError};
use crate::session::Session;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    pub pois: Arc<dyn PoiProvider>,
    pub augmenter: Arc<RouteAugmenter>,
}

impl AppState {
    pub fn new(
        pois: Arc<dyn PoiProvider>,
        augmenter: RouteAugmenter,
        default_deviation_km: f64,
    ) -> Self {
        Self {
            session: Arc::new(RwLock::new(Session::new(default_deviation_km))),
            pois,
            augmenter: Arc::new(augmenter),
        }
    }

    /// Wire the HTTP providers described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let pois = OverpassClient::new(
            config.overpass_url.clone(),
            config.http_timeout,
            config.overpass_timeout_secs,
        )?;
        let directions = directions_from_config(config)?;
        let augmenter = RouteAugmenter::new(directions).with_concurrency(config.detour_concurrency);
        Ok(Self::new(
            Arc::new(pois),
            augmenter,
            config.default_max_deviation_km,
        ))
    }
}

/// Mapbox directions behind an optional LRU cache, or `None` without a token.
pub fn directions_from_config(
    config: &AppConfig,
) -> Result<Option<Arc<dyn DirectionsProvider>>, ProviderError> {
    let Some(token) = &config.mapbox_token else {
        tracing::warn!("MAPBOX_TOKEN not set, detours use straight insertion");
        return Ok(None);
    };

    let mapbox: Arc<dyn DirectionsProvider> = Arc::new(MapboxDirections::new(
        token.clone(),
        config.mapbox_profile.clone(),
        config.http_timeout,
    )?);
    let directions: Arc<dyn DirectionsProvider> = match NonZeroUsize::new(config.directions_cache_size) {
        Some(capacity) => Arc::new(CachedDirections::new(mapbox, capacity)),
        None => mapbox,
    };
    Ok(Some(directions))
}

/// Largest accepted GPX upload.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/session",
            get(session_handlers::get_session).delete(session_handlers::reset_session),
        )
        .route("/api/session/route", post(session_handlers::load_route))
        .route(
            "/api/session/filters/:id/toggle",
            post(session_handlers::toggle_filter),
        )
        .route("/api/session/deviation", put(session_handlers::set_deviation))
        .route("/api/session/pois", post(session_handlers::discover_pois))
        .route(
            "/api/session/pois/:id/toggle",
            post(session_handlers::toggle_poi),
        )
        .route(
            "/api/session/route/modified",
            post(session_handlers::generate_modified),
        )
        .route("/api/session/export", get(session_handlers::export_route))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
