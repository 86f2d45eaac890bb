use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors crossing the HTTP boundary. Everything internal flows as `anyhow`;
/// handlers convert to one of these so every failure leaves the service as
/// the same `{ "success": false, "error": ... }` envelope.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream rejected our API key. Kept distinct so operators see a
    /// configuration problem instead of a generic failure.
    #[error("Upstream API key was rejected - check TMDB_API_KEY")]
    UpstreamAuth,

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Collapse an `anyhow` chain from the fetch pipeline, special-casing
    /// upstream authentication failures.
    pub fn from_upstream(err: anyhow::Error) -> Self {
        let text = format!("{err:#}");
        if text.contains("401") || text.to_lowercase().contains("invalid api key") {
            AppError::UpstreamAuth
        } else {
            AppError::Upstream(text)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamAuth | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_401_maps_to_auth_error() {
        let err = anyhow::anyhow!("https://example/search -> 401 Unauthorized");
        assert!(matches!(AppError::from_upstream(err), AppError::UpstreamAuth));
    }

    #[test]
    fn other_upstream_errors_stay_generic() {
        let err = anyhow::anyhow!("connection reset by peer");
        assert!(matches!(AppError::from_upstream(err), AppError::Upstream(_)));
    }
}
