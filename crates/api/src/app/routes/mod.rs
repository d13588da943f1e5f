use axum::{routing::get, Router};

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod system;
pub mod tenants;

/// Every route the edge serves. Access is decided by the gate middleware,
/// not by where a route is mounted.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/", get(system::landing))
        .route("/login", get(system::login_page))
        .nest("/api/auth", auth::router())
        .nest("/api/admin", admin::router())
        .nest("/api/tenants", tenants::router())
        .route("/dashboard", get(dashboard::home))
        .route("/dashboard/*section", get(dashboard::section))
}
