use axum::http::StatusCode;
use thiserror::Error;

use crate::augment::AugmentError;
use crate::gpx_import::ParseError;
use crate::providers::ProviderError;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid GPX file: {0}")]
    Parse(#[from] ParseError),
    #[error("no valid route found in GPX file")]
    EmptyRoute,
    #[error("no route loaded")]
    NoRouteLoaded,
    #[error("session changed while the request was running, retry")]
    SessionChanged,
    #[error("POI provider request failed: {0}")]
    Network(#[from] ProviderError),
    #[error("{0}")]
    Validation(String),
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("route augmentation failed: {0}")]
    Augment(#[from] AugmentError),
    #[error("failed to read route file: {0}")]
    Io(#[from] std::io::Error),
}

impl RouteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RouteError::Parse(_) => StatusCode::BAD_REQUEST,
            RouteError::EmptyRoute | RouteError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RouteError::NoRouteLoaded | RouteError::SessionChanged => StatusCode::CONFLICT,
            RouteError::Network(_) => StatusCode::BAD_GATEWAY,
            RouteError::Gpx(_) | RouteError::Augment(_) | RouteError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            RouteError::Parse(ParseError::NotGpx).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RouteError::EmptyRoute.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(RouteError::NoRouteLoaded.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            RouteError::Network(ProviderError::Unavailable("down".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RouteError::Augment(AugmentError::EmptyRoute(1)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
