//! Login, logout, session introspection, refresh and activation.
//!
//! All of these live under the public `/api/auth` prefix; the gate lets them
//! through and each handler decides for itself.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use printshop_auth::{
    AccessErrorCode, ActivationRequest, AuthError, CredentialStore, LoginRequest, Session,
    sanitize_return_path, views_for,
};

use crate::app::{AppState, errors};
use crate::context::SessionContext;
use crate::cookie::{ResponseCredentials, read_session_token};

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
        .route("/refresh", post(refresh))
        .route("/activate", post(activate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginQuery {
    pub callback_url: Option<String>,
}

fn session_body(session: &Session, backend_token: Option<String>) -> serde_json::Value {
    serde_json::json!({
        "session": session,
        "backendToken": backend_token,
        "expiresAt": session.expires_at(),
        "dashboard": session.role_name().dashboard_path(),
    })
}

fn with_cookie(store: &ResponseCredentials, status: StatusCode, body: serde_json::Value) -> axum::response::Response {
    let mut headers = HeaderMap::new();
    store.apply(&mut headers);
    (status, headers, Json(body)).into_response()
}

/// POST /api/auth/login
pub async fn login(
    Extension(state): Extension<AppState>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    let outcome = match state.authenticator.login(&body, Utc::now()) {
        Ok(outcome) => outcome,
        Err(e) => return errors::auth_error_to_response(e),
    };

    let store = ResponseCredentials::new(state.issuer.clone(), state.cookies, &headers);
    if let Err(e) = store.persist(&outcome.session) {
        tracing::error!(error = %e, "failed to sign session cookie");
        return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error");
    }

    let session = &outcome.session;
    let redirect_to = if session.is_active() {
        sanitize_return_path(query.callback_url.as_deref(), session.role_name().dashboard_path())
            .to_string()
    } else {
        "/login?reason=deactivated".to_string()
    };

    let mut body = session_body(session, store.backend_token());
    body["redirectTo"] = serde_json::Value::String(redirect_to);
    with_cookie(&store, StatusCode::OK, body)
}

/// POST /api/auth/logout. Safe to repeat.
pub async fn logout(Extension(state): Extension<AppState>, headers: HeaderMap) -> axum::response::Response {
    let store = ResponseCredentials::new(state.issuer.clone(), state.cookies, &headers);
    store.clear();
    with_cookie(&store, StatusCode::OK, serde_json::json!({ "status": "signed_out" }))
}

/// GET /api/auth/session. "No session" is a normal answer, not an error.
pub async fn session(session: Option<Extension<SessionContext>>) -> impl IntoResponse {
    match session {
        Some(Extension(ctx)) => Json(serde_json::json!({
            "session": ctx.session(),
            "navigation": views_for(ctx.session().role_name()),
        })),
        None => Json(serde_json::json!({ "session": null })),
    }
}

/// POST /api/auth/refresh
pub async fn refresh(Extension(state): Extension<AppState>, headers: HeaderMap) -> axum::response::Response {
    let Some(raw) = read_session_token(&headers) else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            AccessErrorCode::SessionAbsent.as_str(),
            "no session to refresh",
        );
    };

    let outcome = match state.authenticator.refresh(&raw, Utc::now()) {
        Ok(outcome) => outcome,
        Err(AuthError::Session(e)) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                AccessErrorCode::RefreshDenied.as_str(),
                e.to_string(),
            );
        }
        Err(e) => return errors::auth_error_to_response(e),
    };

    let store = ResponseCredentials::new(state.issuer.clone(), state.cookies, &headers);
    if let Err(e) = store.persist(&outcome.session) {
        tracing::error!(error = %e, "failed to sign refreshed session");
        return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error");
    }
    with_cookie(&store, StatusCode::OK, session_body(&outcome.session, store.backend_token()))
}

/// POST /api/auth/activate
pub async fn activate(
    Extension(state): Extension<AppState>,
    Json(body): Json<ActivationRequest>,
) -> axum::response::Response {
    match state.authenticator.activate(&body, Utc::now()) {
        Ok(account) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "active",
                "email": account.email,
            })),
        )
            .into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
