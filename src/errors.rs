use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Request-scoped failures. Nothing here is fatal to the process; every
/// variant renders as a structured JSON body `{"detail", "code"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials or missing token")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    /// State conflicts: wrong-status transition, duplicate review, full
    /// booking overlap on a unique key. 400-class per API convention.
    #[error("{0}")]
    Conflict(String),

    /// Delete blocked by dependent rows (FK RESTRICT).
    #[error("cannot delete object: there are related records")]
    Protected { blocked_by: Vec<String> },

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Protected { .. } => "protected",
            ApiError::Database(_) | ApiError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Protected { .. } => StatusCode::CONFLICT,
            ApiError::Database(diesel::result::Error::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else if status == StatusCode::NOT_FOUND {
            "not found".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({ "detail": detail, "code": self.code() });
        if let ApiError::Protected { blocked_by } = &self {
            body["blocked_by"] = json!(blocked_by);
        }

        (status, Json(body)).into_response()
    }
}

impl From<deadpool_diesel::InteractError> for ApiError {
    fn from(err: deadpool_diesel::InteractError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<deadpool_diesel::postgres::PoolError> for ApiError {
    fn from(err: deadpool_diesel::postgres::PoolError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// True when the error is a violation of the named unique constraint (or of
/// any unique constraint when `constraint` is empty).
pub fn is_unique_violation(err: &diesel::result::Error, constraint: &str) -> bool {
    use diesel::result::{DatabaseErrorKind, Error};
    match err {
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            constraint.is_empty() || info.constraint_name() == Some(constraint)
        }
        _ => false,
    }
}

pub fn is_foreign_key_violation(err: &diesel::result::Error) -> bool {
    use diesel::result::{DatabaseErrorKind, Error};
    matches!(
        err,
        Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_per_api_convention() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Protected { blocked_by: vec![] }.status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn missing_row_is_a_not_found_not_a_server_error() {
        let err = ApiError::from(diesel::result::Error::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
