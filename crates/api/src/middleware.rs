use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use printshop_auth::{
    AuthorizationGate, GateDecision, GateRequest, SessionIntrospector, SessionState,
};

use crate::app::errors::json_error;
use crate::context::SessionContext;
use crate::cookie;

#[derive(Clone)]
pub struct GateState {
    pub gate: Arc<AuthorizationGate>,
    pub introspector: Arc<dyn SessionIntrospector>,
    pub validation_timeout: Duration,
}

impl GateState {
    /// Resolve a raw token, failing closed when resolution is too slow.
    pub async fn resolve(&self, raw_token: &str) -> SessionState {
        match tokio::time::timeout(self.validation_timeout, self.introspector.introspect(raw_token)).await {
            Ok(Ok(session)) => SessionState::Resolved(session),
            Ok(Err(err)) => {
                tracing::debug!(code = %err.code(), "session did not resolve");
                SessionState::Invalid(err)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.validation_timeout.as_millis() as u64,
                    "session validation timed out"
                );
                SessionState::TimedOut
            }
        }
    }
}

/// Runs the authorization gate before any handler.
///
/// Page requests that are denied get a `303` to login or to the dashboard
/// root; API requests get `401`/`403` JSON errors.
pub async fn gate_middleware(
    State(state): State<GateState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = match cookie::read_session_token(req.headers()) {
        Some(raw) => state.resolve(&raw).await,
        None => SessionState::Absent,
    };

    let decision = state.gate.authorize(&GateRequest {
        path: req.uri().path(),
        query: req.uri().query(),
        session: &session,
    });

    match decision {
        GateDecision::Allow => {
            if let SessionState::Resolved(session) = session {
                req.extensions_mut().insert(SessionContext::new(session));
            }
            next.run(req).await
        }
        GateDecision::Redirect { location, reason } => {
            tracing::info!(
                path = req.uri().path(),
                code = %reason.code(),
                %location,
                "request redirected"
            );
            Redirect::to(&location).into_response()
        }
        GateDecision::Reject { status, reason } => {
            tracing::info!(
                path = req.uri().path(),
                code = %reason.code(),
                status,
                "request rejected"
            );
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN);
            let message = match status {
                StatusCode::UNAUTHORIZED => "authentication required",
                _ => "not permitted",
            };
            json_error(status, reason.code().as_str(), message)
        }
    }
}
