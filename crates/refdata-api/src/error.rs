//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "HTTP error mapping with localized message keys."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use refdata_domain::messages::{
    ERROR_AUTHENTICATION_REQUIRED, ERROR_CONSTRAINT_VIOLATED, ERROR_INTERNAL,
    ERROR_REFERENCE_VIOLATED, ERROR_UNAUTHORIZED,
};
use refdata_domain::{DomainError, EntityKind};
use refdata_persistence::PersistenceError;
use refdata_rights::RightsError;
use refdata_security::SecurityError;
use serde::Serialize;
use tracing::error;

/// Failure returned by a handler, rendered as `{messageKey, message}`.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    status: StatusCode,
    message_key: String,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message_key: String,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            message_key: message_key.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message_key, message)
    }

    pub fn not_found(entity: EntityKind, id: impl Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            entity.not_found_key(),
            format!("{entity} {id} not found"),
        )
    }

    /// 400 for a referenced entity that does not exist.
    pub fn unknown_reference(entity: EntityKind, id: impl Display) -> Self {
        Self::bad_request(entity.not_found_key(), format!("{entity} {id} not found"))
    }

    pub fn authentication_required() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ERROR_AUTHENTICATION_REQUIRED,
            "bearer token required",
        )
    }

    pub fn forbidden(right: &str) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            ERROR_UNAUTHORIZED,
            format!("missing right {right}"),
        )
    }

    pub fn internal(err: impl Display) -> Self {
        error!(error = %err, "request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ERROR_INTERNAL,
            "internal server error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message_key(&self) -> &str {
        &self.message_key
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            message_key: self.message_key,
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = match err {
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::Validation { .. } | DomainError::Duplicate { .. } => {
                StatusCode::BAD_REQUEST
            }
        };
        Self::new(status, err.message_key(), err.to_string())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::UniqueViolation(message) => {
                Self::bad_request(ERROR_CONSTRAINT_VIOLATED, message)
            }
            PersistenceError::ForeignKeyViolation(message) => {
                Self::bad_request(ERROR_REFERENCE_VIOLATED, message)
            }
            PersistenceError::Domain(err) => err.into(),
            other => Self::internal(other),
        }
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::Unauthorized { right } => Self::forbidden(&right),
            SecurityError::Persistence(err) => err.into(),
            other => Self::new(
                StatusCode::UNAUTHORIZED,
                ERROR_AUTHENTICATION_REQUIRED,
                other.to_string(),
            ),
        }
    }
}

impl From<RightsError> for ApiError {
    fn from(err: RightsError) -> Self {
        match err {
            RightsError::Persistence(err) => err.into(),
            other => Self::internal(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_keys() {
        let err: ApiError = DomainError::not_found(EntityKind::SupervisoryNode, "x").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.message_key(),
            "referenceData.error.supervisoryNode.notFound"
        );

        let err: ApiError = DomainError::validation("some.key", "bad").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message_key(), "some.key");
    }

    #[test]
    fn security_errors_map_to_auth_statuses() {
        let err: ApiError = SecurityError::InvalidToken.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err: ApiError = SecurityError::Unauthorized {
            right: "USERS_MANAGE".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.message_key(), ERROR_UNAUTHORIZED);
    }

    #[test]
    fn constraint_violations_are_client_errors() {
        let err: ApiError = PersistenceError::UniqueViolation("code".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err: ApiError = PersistenceError::ForeignKeyViolation("fk".into()).into();
        assert_eq!(err.message_key(), ERROR_REFERENCE_VIOLATED);
    }
}
