use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// No result was obtained from the node or backend at all. Always safe
    /// to retry the same attempt from scratch.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("A step is already in flight for this session")]
    StepInFlight,

    #[error("Session is resolved and must be settled first")]
    SessionResolved,

    /// The last step ended without a known outcome and no reconciliation
    /// has succeeded since. Refresh, then step again.
    #[error("Last step outcome is unknown; refresh before stepping again")]
    ReconcileRequired,

    #[error("No active session: {0}")]
    NoActiveSession(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transport failures leave the chain state unknown to the caller.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }
}

impl ErrorDetail {
    /// Rebuilds the error a remote backend reported.
    pub fn into_app_error(self) -> AppError {
        match self.code.as_str() {
            "TRANSPORT_ERROR" => AppError::Transport(self.message),
            "STEP_IN_FLIGHT" => AppError::StepInFlight,
            "SESSION_RESOLVED" => AppError::SessionResolved,
            "RECONCILE_REQUIRED" => AppError::ReconcileRequired,
            "NO_ACTIVE_SESSION" => AppError::NoActiveSession(self.message),
            "NOT_FOUND" => AppError::NotFound(self.message),
            "BAD_REQUEST" => AppError::BadRequest(self.message),
            "DECODE_ERROR" => AppError::Decode(self.message),
            _ => AppError::Internal(self.message),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Transport(ref msg) => (
                StatusCode::BAD_GATEWAY,
                "TRANSPORT_ERROR",
                format!("Could not reach the chain, try again: {}", msg),
            ),
            AppError::StepInFlight => (
                StatusCode::CONFLICT,
                "STEP_IN_FLIGHT",
                "A step is already being resolved".to_string(),
            ),
            AppError::SessionResolved => (
                StatusCode::CONFLICT,
                "SESSION_RESOLVED",
                "Settle the finished game before starting another".to_string(),
            ),
            AppError::ReconcileRequired => (
                StatusCode::CONFLICT,
                "RECONCILE_REQUIRED",
                "Refresh the session before stepping again".to_string(),
            ),
            AppError::NoActiveSession(ref msg) => (
                StatusCode::CONFLICT,
                "NO_ACTIVE_SESSION",
                msg.clone(),
            ),
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
            }
            AppError::Decode(ref msg) => (
                StatusCode::BAD_GATEWAY,
                "DECODE_ERROR",
                msg.clone(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_maps_to_bad_gateway() {
        let response = AppError::Transport("connection reset".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn in_flight_step_maps_to_conflict() {
        let response = AppError::StepInFlight.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn only_transport_is_transport() {
        assert!(AppError::Transport("x".into()).is_transport());
        assert!(!AppError::BadRequest("x".into()).is_transport());
    }

    #[test]
    fn remote_error_codes_round_trip() {
        let detail = ErrorDetail {
            code: "TRANSPORT_ERROR".to_string(),
            message: "timed out".to_string(),
            details: None,
        };
        assert!(detail.into_app_error().is_transport());
        let detail = ErrorDetail {
            code: "STEP_IN_FLIGHT".to_string(),
            message: String::new(),
            details: None,
        };
        assert!(matches!(detail.into_app_error(), AppError::StepInFlight));
        let detail = ErrorDetail {
            code: "RECONCILE_REQUIRED".to_string(),
            message: String::new(),
            details: None,
        };
        assert!(matches!(
            detail.into_app_error(),
            AppError::ReconcileRequired
        ));
    }
}
