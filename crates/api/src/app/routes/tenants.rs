//! Tenant lookups, scoped to the caller's tenant.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use printshop_auth::{TenantDirectory, TenantScope};
use printshop_core::TenantId;

use crate::app::{AppState, errors};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tenants))
        .route("/:id", get(get_tenant))
}

/// GET /api/tenants: every tenant for super admins, otherwise only the
/// caller's own.
pub async fn list_tenants(
    Extension(state): Extension<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> impl IntoResponse {
    let scope = ctx.scope();
    let visible = scope.filter(state.tenants.list(), |t| t.tenant_id);
    Json(serde_json::json!({
        "scope": match scope {
            TenantScope::All => "all",
            TenantScope::Tenant(_) => "tenant",
        },
        "tenants": visible,
    }))
}

/// GET /api/tenants/:id
pub async fn get_tenant(
    Extension(state): Extension<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let tenant_id = TenantId::from_uuid(id);

    // Isolation is checked before existence so other tenants' ids are not probed.
    if let Err(e) = ctx.scope().ensure_access(tenant_id) {
        tracing::warn!(
            subject_id = %ctx.session().subject_id(),
            requested = %tenant_id,
            "cross-tenant lookup refused"
        );
        return errors::tenant_error_to_response(e);
    }

    match state.tenants.get(&tenant_id) {
        Some(tenant) => (StatusCode::OK, Json(tenant)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "tenant not found"),
    }
}
