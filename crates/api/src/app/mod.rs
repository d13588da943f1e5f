//! HTTP application wiring (Axum router + shared state).
//!
//! - `routes/`: handlers, one file per area
//! - `errors.rs`: consistent JSON error responses
//!
//! Every route, public or not, sits behind the gate middleware so the
//! decision is made before any handler runs.

use std::sync::Arc;

use axum::{Extension, Router};
use chrono::Utc;
use tower::ServiceBuilder;

use printshop_auth::{
    Account, AccountDirectory, AccountStatus, AuthorizationGate, Authenticator, Hs256Jwt,
    InMemoryAccountDirectory, InMemoryTenantDirectory, JwtIssuer, RoleName, RouteAccessPolicy,
    SessionResolver, password,
};

use crate::config::{ApiConfig, BootstrapAdmin};
use crate::cookie::CookieSettings;
use crate::middleware;

pub mod errors;
pub mod routes;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<SessionResolver>,
    pub authenticator: Arc<Authenticator>,
    pub accounts: Arc<InMemoryAccountDirectory>,
    pub tenants: Arc<InMemoryTenantDirectory>,
    pub gate: Arc<AuthorizationGate>,
    pub issuer: Arc<dyn JwtIssuer>,
    pub cookies: CookieSettings,
}

impl AppState {
    pub fn new(config: &ApiConfig) -> Self {
        Self::with_policy(config, RouteAccessPolicy::standard())
    }

    pub fn with_policy(config: &ApiConfig, policy: RouteAccessPolicy) -> Self {
        let jwt = Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes()));
        let tenants = Arc::new(InMemoryTenantDirectory::new());
        let accounts = Arc::new(InMemoryAccountDirectory::new());
        let resolver = Arc::new(SessionResolver::new(jwt.clone(), tenants.clone(), config.lifetime));
        let authenticator = Arc::new(Authenticator::new(accounts.clone(), resolver.clone()));

        Self {
            resolver,
            authenticator,
            accounts,
            tenants,
            gate: Arc::new(AuthorizationGate::new(policy)),
            issuer: jwt,
            cookies: CookieSettings {
                secure: config.cookie_secure,
                max_age_secs: config.lifetime.ttl.num_seconds(),
            },
        }
    }

    /// Create (or leave alone) the first super admin account.
    pub fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> anyhow::Result<()> {
        if self.accounts.find_by_email(&admin.email).is_some() {
            tracing::info!(email = %admin.email, "bootstrap admin already present");
            return Ok(());
        }

        let mut account = Account::pending(&admin.email, "Administrator", RoleName::SuperAdmin, None)?;
        account.password_hash = Some(password::hash_password(&admin.password)?);
        account.status = AccountStatus::Active;
        self.accounts.save(account)?;

        tracing::info!(email = %admin.email, at = %Utc::now(), "bootstrap admin created");
        Ok(())
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState, config: &ApiConfig) -> Router {
    let gate_state = middleware::GateState {
        gate: state.gate.clone(),
        introspector: state.resolver.clone(),
        validation_timeout: config.validation_timeout,
    };

    routes::router()
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(gate_state, middleware::gate_middleware)),
        )
}
