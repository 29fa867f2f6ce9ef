//! The HTTP error envelope.
//!
//! Every error leaves the daemon as
//! `{"error": {"code", "message", "details?"}}` with the status mapped
//! from the domain error kind. Infrastructure errors collapse to 500
//! and log the underlying cause; clients only ever see `internal`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use pf_domain::error::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::NotFound(_) | Error::ExerciseNotFound(_) | Error::ProviderNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        Error::BadRequest(_) | Error::SpecInvalid(_) => StatusCode::BAD_REQUEST,
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::Conflict(_) | Error::SessionNotActive { .. } => StatusCode::CONFLICT,
        Error::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::ProviderTimeout(_)
        | Error::Provider { .. }
        | Error::Cancelled
        | Error::Io(_)
        | Error::Json(_)
        | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let code = self.0.code();

        // Infrastructure detail stays in the log, not the wire.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            match &self.0 {
                Error::ProviderTimeout(_) | Error::Provider { .. } | Error::Cancelled => {
                    self.0.to_string()
                }
                _ => "internal error".to_string(),
            }
        } else {
            self.0.to_string()
        };

        let details = match &self.0 {
            Error::CooldownActive { remaining_seconds } => Some(serde_json::json!({
                "cooldown_remaining": remaining_seconds,
            })),
            _ => None,
        };

        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message,
                "details": details,
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_contract() {
        assert_eq!(status_for(&Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&Error::ExerciseNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::SpecInvalid("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::CooldownActive {
                remaining_seconds: 9
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&Error::SessionNotActive {
                session_id: "s".into(),
                status: "completed".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&Error::Forbidden("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&Error::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
