use crate::cultivar::CatalogError;
use crate::review_generator::ReviewGenerationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

impl CatalogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogError::Store(_) | CatalogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CatalogError::ReviewGeneration(ReviewGenerationError::NotConfigured) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CatalogError::ReviewGeneration(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            CatalogError::NotFound(_) => "not_found",
            CatalogError::Validation(_) => "validation",
            CatalogError::Store(_) => "store",
            CatalogError::Storage(_) => "storage",
            CatalogError::ReviewGeneration(_) => "review_generation",
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        super::metrics::record_error(self.error_type(), status.as_u16());
        (
            status,
            Json(serde_json::json!({"error": self.to_string()})),
        )
            .into_response()
    }
}

/// A plain 400 for malformed request input.
pub fn bad_request(message: impl Into<String>) -> Response {
    let message = message.into();
    warn!("Bad request: {}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}
