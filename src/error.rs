use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    services::scenario_provider::ScenarioError,
    state::{pvp_match::MatchError, registry::RegistryError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Stats collaborator is unavailable.
    #[error("stats store unavailable")]
    Unavailable(#[source] StorageError),
    /// No scenario could be produced for a round.
    #[error("scenario unavailable")]
    ScenarioUnavailable(#[source] ScenarioError),
    /// Caller identity is missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Request conflicts with what was already recorded.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyRecorded { .. } => ServiceError::Conflict(err.to_string()),
            StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

impl From<ScenarioError> for ServiceError {
    fn from(err: ScenarioError) -> Self {
        ServiceError::ScenarioUnavailable(err)
    }
}

impl From<MatchError> for ServiceError {
    fn from(err: MatchError) -> Self {
        let message = err.to_string();
        match err {
            MatchError::NotParticipant(_) | MatchError::RoundNotFound(_) => {
                ServiceError::NotFound(message)
            }
            MatchError::DuplicateDecision(_)
            | MatchError::RoundClosed(_)
            | MatchError::RoundAlreadyExists(_) => ServiceError::Conflict(message),
            MatchError::InvalidTransition(_)
            | MatchError::NotInProgress(_)
            | MatchError::NotCurrentRound { .. }
            | MatchError::RoundNotDecided(_)
            | MatchError::ScoreAlreadyApplied(_)
            | MatchError::NoRoundsLeft(_)
            | MatchError::RoundsRemaining { .. } => ServiceError::InvalidState(message),
        }
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        ServiceError::Conflict(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A collaborator is unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::ScenarioUnavailable(source) => {
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
