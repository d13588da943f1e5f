use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use printshop_auth::{AccessErrorCode, AuthError, TenantAccessError};
use printshop_core::DomainError;

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            AccessErrorCode::AuthInvalidCredentials.as_str(),
            "invalid email or password",
        ),
        AuthError::ActivationInvalid => json_error(
            StatusCode::BAD_REQUEST,
            AccessErrorCode::ActivationInvalid.as_str(),
            "activation link is invalid or has expired",
        ),
        AuthError::Session(e) => json_error(StatusCode::UNAUTHORIZED, e.code().as_str(), e.to_string()),
        AuthError::Domain(e) => domain_error_to_response(e),
        AuthError::Internal(msg) => {
            tracing::error!(error = %msg, "auth internal error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
    }
}

pub fn tenant_error_to_response(err: TenantAccessError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, err.code().as_str(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
