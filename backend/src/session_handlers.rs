// Handlers for the session API: one loaded route, its candidates and the
// generated detour route.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{
    ApiError, CandidatePoi, CategoryFilter, DeviationRequest, RouteResponse, RouteSummary,
    SessionSnapshot,
};
use time::OffsetDateTime;

use crate::discovery::fetch_candidates;
use crate::error::RouteError;
use crate::gpx_export::{encode_route_as_gpx, encode_route_as_gpx_base64, export_file_name};
use crate::gpx_import::parse_route;
use crate::stats::compare;
use crate::AppState;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub const GPX_CONTENT_TYPE: &str = "application/gpx+xml";

#[derive(Debug, Default, Deserialize)]
pub struct LoadRouteParams {
    pub file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    pub modified: Option<bool>,
}

/// POST /api/session/route - Load a GPX document (raw body)
pub async fn load_route(
    State(state): State<AppState>,
    Query(params): Query<LoadRouteParams>,
    body: String,
) -> ApiResult<Json<RouteSummary>> {
    let route = parse_route(&body).map_err(api_error)?;
    let mut session = state.session.write().await;
    session
        .load_route(route, params.file_name)
        .map(Json)
        .map_err(api_error)
}

/// GET /api/session - Current session state
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.read().await.snapshot())
}

/// POST /api/session/filters/:id/toggle - Enable or disable a category
pub async fn toggle_filter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<CategoryFilter>>> {
    let mut session = state.session.write().await;
    session
        .toggle_filter(&id)
        .map(|filters| Json(filters.to_vec()))
        .map_err(api_error)
}

/// PUT /api/session/deviation - Change the search radius
pub async fn set_deviation(
    State(state): State<AppState>,
    Json(req): Json<DeviationRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.session.write().await;
    session
        .set_max_deviation(req.max_deviation_km)
        .map_err(api_error)?;
    Ok(Json(session.snapshot()))
}

/// POST /api/session/pois - Run discovery for the loaded route
///
/// The session lock is not held during the provider call. On failure the
/// previous candidates stay in place.
pub async fn discover_pois(State(state): State<AppState>) -> ApiResult<Json<Vec<CandidatePoi>>> {
    let (route, filters, max_deviation_km, revision) = {
        let session = state.session.read().await;
        let route = session.require_route().map_err(api_error)?.clone();
        (
            route,
            session.filters().to_vec(),
            session.max_deviation_km(),
            session.revision(),
        )
    };

    let candidates = fetch_candidates(
        state.pois.as_ref(),
        &route.points,
        &filters,
        max_deviation_km,
    )
    .await
    .map_err(api_error)?;

    let mut session = state.session.write().await;
    if session.revision() != revision {
        return Err(api_error(RouteError::SessionChanged));
    }
    session.set_candidates(candidates);
    Ok(Json(session.candidates().to_vec()))
}

/// POST /api/session/pois/:id/toggle - Select or unselect a candidate
pub async fn toggle_poi(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CandidatePoi>> {
    let mut session = state.session.write().await;
    session
        .toggle_candidate(&id)
        .map(|poi| Json(poi.clone()))
        .map_err(api_error)
}

/// POST /api/session/route/modified - Generate the detour route
///
/// The result is stored only once generation has finished and only if the
/// session did not change meanwhile.
pub async fn generate_modified(State(state): State<AppState>) -> ApiResult<Json<RouteResponse>> {
    let (original, candidates, revision) = {
        let session = state.session.read().await;
        let route = session.require_route().map_err(api_error)?.clone();
        (route, session.candidates().to_vec(), session.revision())
    };

    let modified = state
        .augmenter
        .generate(&original, &candidates)
        .await
        .map_err(|err| api_error(err.into()))?;
    let comparison = compare(&original, &modified);
    let gpx_base64 = encode_route_as_gpx_base64(&modified).map_err(api_error)?;

    let mut session = state.session.write().await;
    if session.revision() != revision {
        return Err(api_error(RouteError::SessionChanged));
    }
    session.set_modified_route(modified.clone());

    Ok(Json(RouteResponse {
        route: modified,
        comparison,
        gpx_base64,
    }))
}

/// GET /api/session/export - Download the route as GPX
///
/// `modified` defaults to true and falls back to the original route when no
/// modified route exists.
pub async fn export_route(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> ApiResult<impl IntoResponse> {
    let session = state.session.read().await;
    let route = session
        .export_route(params.modified.unwrap_or(true))
        .map_err(api_error)?;
    let gpx = encode_route_as_gpx(route).map_err(api_error)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(OffsetDateTime::now_utc())
    );

    Ok((
        [
            (header::CONTENT_TYPE, GPX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        gpx,
    ))
}

/// DELETE /api/session - Forget everything
pub async fn reset_session(State(state): State<AppState>) -> StatusCode {
    state.session.write().await.reset();
    StatusCode::NO_CONTENT
}

/// Convert RouteError to API error response
fn api_error(err: RouteError) -> (StatusCode, Json<ApiError>) {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!("request failed: {err}");
    } else {
        tracing::debug!("request rejected: {err}");
    }
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
