//! Request-boundary error taxonomy.
//!
//! Internal plumbing (store, config, detector) returns `anyhow::Result`;
//! handlers convert failures into [`AppError`] which knows its status code and
//! how to render itself as JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("User not found.")]
    NotFound,

    #[error("Incorrect password.")]
    InvalidCredentials,

    #[error(
        "You have reached your maximum login attempts ({limit}) for this week. Please try again next week."
    )]
    RateLimited { limit: u32 },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    /// Surfaced verbatim to the caller.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::InvalidCredentials | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::RateLimited { .. } => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render in the `{success, message}` shape used by the login endpoint.
    pub fn into_login_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_failure_kind() {
        assert_eq!(AppError::NotFound.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::RateLimited { limit: 3 }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::BadRequest("No image uploaded".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rate_limit_message_names_the_limit() {
        let msg = AppError::RateLimited { limit: 3 }.to_string();
        assert_eq!(
            msg,
            "You have reached your maximum login attempts (3) for this week. Please try again next week."
        );
    }

    #[test]
    fn anyhow_errors_keep_their_context_chain() {
        let err = anyhow::anyhow!("disk full").context("Failed to save users");
        let app: AppError = err.into();
        assert_eq!(app.to_string(), "Failed to save users: disk full");
    }
}
