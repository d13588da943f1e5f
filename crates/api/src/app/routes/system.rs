use axum::{extract::Query, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use printshop_auth::sanitize_return_path;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn landing() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "printshop",
        "login": "/login",
        "dashboard": "/dashboard",
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPageQuery {
    pub reason: Option<String>,
    pub callback_url: Option<String>,
}

/// The login entry point. Echoes why the user landed here and where they
/// go afterwards; off-site callbacks are replaced with the dashboard root.
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> impl IntoResponse {
    let message = match query.reason.as_deref() {
        Some("deactivated") => Some("Your account has been deactivated. Contact your administrator."),
        Some("expired") => Some("Your session has expired. Please sign in again."),
        _ => None,
    };
    let callback = sanitize_return_path(query.callback_url.as_deref(), "/dashboard");

    Json(serde_json::json!({
        "page": "login",
        "reason": query.reason,
        "message": message,
        "callbackUrl": callback,
    }))
}
