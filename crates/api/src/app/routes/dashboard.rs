//! Dashboard pages.
//!
//! The gate has already checked the real role against the section, so these
//! handlers only describe what to render. Navigation is always built from
//! the real role; impersonation is applied client-side.

use axum::{
    extract::{Extension, OriginalUri},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use printshop_auth::{canonical_path, views_for};

use crate::app::errors;
use crate::context::SessionContext;

/// GET /dashboard. Also where role-mismatched requests land.
pub async fn home(session: Option<Extension<SessionContext>>) -> axum::response::Response {
    let Some(Extension(ctx)) = session else {
        return missing_session();
    };
    let role = ctx.session().role_name();
    Json(serde_json::json!({
        "view": "dashboard",
        "role": role,
        "home": role.dashboard_path(),
        "identity": ctx.session().identity(),
        "navigation": views_for(role),
    }))
    .into_response()
}

/// GET /dashboard/*section
///
/// The view is named by the same canonical path the gate judged, never by the
/// raw capture.
pub async fn section(
    session: Option<Extension<SessionContext>>,
    OriginalUri(uri): OriginalUri,
) -> axum::response::Response {
    let Some(Extension(ctx)) = session else {
        return missing_session();
    };
    let role = ctx.session().role_name();
    let path = canonical_path(uri.path());
    let navigation = views_for(role);
    let active = navigation
        .iter()
        .filter(|item| path == item.path || path.starts_with(&format!("{}/", item.path)))
        .max_by_key(|item| item.path.len())
        .map(|item| item.label.clone());

    Json(serde_json::json!({
        "view": path,
        "role": role,
        "identity": ctx.session().identity(),
        "active": active,
        "navigation": navigation,
    }))
    .into_response()
}

// Unreachable behind the gate; kept so a misconfigured policy fails closed.
fn missing_session() -> axum::response::Response {
    errors::json_error(StatusCode::UNAUTHORIZED, "SESSION_ABSENT", "authentication required")
}
