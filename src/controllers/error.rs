use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::ValidationErrors;

use crate::services::auth::AuthError;
use crate::services::ledger::LedgerError;
use crate::store::StoreError;

/// Error body every handler returns: `{"error": ..., plus optional details}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(ValidationErrors),
    InvalidSeats(Vec<String>),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    SeatsTaken(Vec<String>),
    Busy(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::InvalidSeats(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::SeatsTaken(_) | ApiError::Busy(_) | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(message)
            | ApiError::Unauthorized(message)
            | ApiError::Forbidden(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message) => json!({ "error": message }),
            ApiError::Validation(errors) => json!({
                "error": "validation failed",
                "details": errors.field_errors().iter().map(|(field, errs)| {
                    let messages: Vec<String> = errs
                        .iter()
                        .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string()))
                        .collect();
                    (field.to_string(), messages)
                }).collect::<std::collections::BTreeMap<_, _>>(),
            }),
            ApiError::InvalidSeats(seats) => json!({
                "error": "invalid seat codes",
                "invalidSeats": seats,
            }),
            ApiError::SeatsTaken(seats) => json!({
                "error": "some of the selected seats are already taken",
                "unavailableSeats": seats,
            }),
            ApiError::Busy(message) => json!({ "error": message, "retry": true }),
            ApiError::Internal(message) => {
                tracing::error!("internal error: {}", message);
                json!({ "error": "internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::EmptySelection => ApiError::BadRequest(err.to_string()),
            LedgerError::InvalidFormat(seats) => ApiError::InvalidSeats(seats),
            LedgerError::SeatsUnavailable(seats) => ApiError::SeatsTaken(seats),
            LedgerError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            LedgerError::Conflict { .. } => ApiError::Busy(err.to_string()),
            LedgerError::StorageFailure(message) => ApiError::Internal(message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Conflict { .. } => ApiError::Busy(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken => ApiError::Unauthorized(err.to_string()),
            AuthError::Hashing(_) | AuthError::Signing(_) => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_outcomes_map_to_statuses() {
        let cases = [
            (LedgerError::EmptySelection, StatusCode::BAD_REQUEST),
            (LedgerError::InvalidFormat(vec!["Z9".into()]), StatusCode::BAD_REQUEST),
            (LedgerError::SeatsUnavailable(vec!["A1".into()]), StatusCode::CONFLICT),
            (LedgerError::NotFound { entity: "showtime", id: 3 }, StatusCode::NOT_FOUND),
            (LedgerError::Conflict { showtime_id: 3 }, StatusCode::CONFLICT),
            (LedgerError::StorageFailure("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn taken_seats_are_listed_in_the_body() {
        let response = ApiError::from(LedgerError::SeatsUnavailable(vec!["A1".into(), "A2".into()])).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["unavailableSeats"], json!(["A1", "A2"]));
    }
}
