//! Platform administration. Mounted under `/api/admin`, which the route
//! policy restricts to super admins; handlers re-check the real session
//! before mutating anything.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use printshop_auth::{
    AccessErrorCode, Account, AccountDirectory, AccountStatus, Identity, RoleName, Tenant,
    TenantDirectory,
};
use printshop_core::{SubjectId, TenantId};

use crate::app::{AppState, errors};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/impersonation-targets", get(impersonation_targets))
        .route("/accounts", post(invite_account))
        .route("/tenants", post(create_tenant))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationTarget {
    pub subject_id: SubjectId,
    pub tenant_id: Option<TenantId>,
    pub identity: Identity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteAccountRequest {
    pub email: String,
    pub display_name: String,
    pub role: RoleName,
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    pub business_name: String,
    pub owner_email: String,
}

fn require_super_admin(ctx: &SessionContext) -> Result<(), axum::response::Response> {
    if ctx.session().role_name().is_super_admin() && ctx.session().is_active() {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            AccessErrorCode::NotAuthorizedForRole.as_str(),
            "super admin required",
        ))
    }
}

/// GET /api/admin/impersonation-targets
///
/// Active accounts an admin may view the dashboard as. Super admins are
/// never listed.
pub async fn impersonation_targets(
    Extension(state): Extension<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(resp) = require_super_admin(&ctx) {
        return resp;
    }

    let targets: Vec<ImpersonationTarget> = state
        .accounts
        .list()
        .into_iter()
        .filter(|a| a.status == AccountStatus::Active && !a.role.is_super_admin())
        .map(|a| ImpersonationTarget {
            subject_id: a.subject_id,
            tenant_id: a.tenant_id,
            identity: Identity {
                role: a.role,
                name: a.display_name,
                email: a.email,
            },
        })
        .collect();

    Json(serde_json::json!({ "targets": targets })).into_response()
}

/// POST /api/admin/accounts: create a pending account and its activation token.
pub async fn invite_account(
    Extension(state): Extension<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<InviteAccountRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_super_admin(&ctx) {
        return resp;
    }

    let tenant_id = body.tenant_id.map(TenantId::from_uuid);
    if let Some(tenant_id) = tenant_id {
        if !state.tenants.exists(&tenant_id) {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "tenant not found");
        }
    }

    let account = match Account::pending(&body.email, &body.display_name, body.role, tenant_id) {
        Ok(account) => account,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let subject_id = account.subject_id;
    if let Err(e) = state.accounts.save(account) {
        return errors::domain_error_to_response(e);
    }

    match state.authenticator.issue_activation(subject_id, Utc::now()) {
        Ok(token) => {
            tracing::info!(
                invited_by = %ctx.session().email(),
                %subject_id,
                role = %body.role,
                "account invited"
            );
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "subjectId": subject_id,
                    "activationToken": token.token,
                    "expiresAt": token.expires_at,
                })),
            )
                .into_response()
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /api/admin/tenants
pub async fn create_tenant(
    Extension(state): Extension<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<CreateTenantRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_super_admin(&ctx) {
        return resp;
    }
    if body.business_name.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "business name cannot be empty",
        );
    }

    let tenant = Tenant {
        tenant_id: TenantId::new(),
        business_name: body.business_name.trim().to_string(),
        owner_email: body.owner_email.trim().to_lowercase(),
    };
    state.tenants.insert(tenant.clone());
    tracing::info!(tenant_id = %tenant.tenant_id, "tenant created");
    (StatusCode::CREATED, Json(tenant)).into_response()
}
