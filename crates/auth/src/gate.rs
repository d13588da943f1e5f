//! Authorization gate: the request-time decision made before any protected
//! content is produced.
//!
//! - No IO
//! - No panics
//! - Same inputs, same decision; deciding never mutates session or overlay state
//!
//! Role restriction is evaluated against the *real* session. The
//! impersonation overlay lives client-side and never reaches this code.
//!
//! Rules are matched against [`canonical_path`] of the request path, so
//! `/dashboard//production` and `/dashboard/%70roduction` are judged as
//! `/dashboard/production`. Handlers that derive anything from the path must
//! use the same function.

use serde::Serialize;

use crate::{AccessErrorCode, RouteAccessPolicy, Session, SessionError};

/// Outcome of resolving the request's credential, as seen by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Resolved(Session),
    /// No credential was presented.
    Absent,
    Invalid(SessionError),
    /// Resolution did not finish in time. Treated as unauthenticated.
    TimedOut,
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Resolved(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Browser navigation: denials become redirects.
    Page,
    /// Programmatic call: denials become status codes.
    Api,
}

#[derive(Debug, Clone)]
pub struct GateRequest<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub session: &'a SessionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    SessionAbsent,
    SessionInvalid(AccessErrorCode),
    AccountDeactivated,
    NotAuthorizedForRole,
}

impl DenyReason {
    pub fn code(self) -> AccessErrorCode {
        match self {
            DenyReason::SessionAbsent => AccessErrorCode::SessionAbsent,
            DenyReason::SessionInvalid(code) => code,
            DenyReason::AccountDeactivated => AccessErrorCode::AccountDeactivated,
            DenyReason::NotAuthorizedForRole => AccessErrorCode::NotAuthorizedForRole,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect { location: String, reason: DenyReason },
    Reject { status: u16, reason: DenyReason },
}

#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    policy: RouteAccessPolicy,
    login_path: String,
    dashboard_root: String,
    api_prefix: String,
}

impl AuthorizationGate {
    pub fn new(policy: RouteAccessPolicy) -> Self {
        Self {
            policy,
            login_path: "/login".to_string(),
            dashboard_root: "/dashboard".to_string(),
            api_prefix: "/api".to_string(),
        }
    }

    pub fn policy(&self) -> &RouteAccessPolicy {
        &self.policy
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn dashboard_root(&self) -> &str {
        &self.dashboard_root
    }

    pub fn request_kind(&self, path: &str) -> RequestKind {
        let is_api = path
            .strip_prefix(self.api_prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if is_api { RequestKind::Api } else { RequestKind::Page }
    }

    pub fn authorize(&self, request: &GateRequest<'_>) -> GateDecision {
        let canonical = canonical_path(request.path);
        let path = canonical.as_str();

        // (1) public allowlist
        if self.policy.is_public(path) {
            return GateDecision::Allow;
        }

        let kind = self.request_kind(path);

        // (2) a valid session is required
        let session = match request.session {
            SessionState::Resolved(session) => session,
            SessionState::Absent | SessionState::TimedOut => {
                return self.to_login(kind, path, request.query, DenyReason::SessionAbsent);
            }
            SessionState::Invalid(err) => {
                return self.to_login(kind, path, request.query, DenyReason::SessionInvalid(err.code()));
            }
        };

        // (3) deactivated accounts
        if !session.is_active() {
            return match kind {
                RequestKind::Page => GateDecision::Redirect {
                    location: format!("{}?reason=deactivated", self.login_path),
                    reason: DenyReason::AccountDeactivated,
                },
                RequestKind::Api => GateDecision::Reject {
                    status: 403,
                    reason: DenyReason::AccountDeactivated,
                },
            };
        }

        // (4) role restriction, against the real role
        if !self.policy.permits(path, session.role_name()) {
            return match kind {
                // Own dashboard rather than an error page: does not confirm the
                // restricted section exists.
                RequestKind::Page => GateDecision::Redirect {
                    location: self.dashboard_root.clone(),
                    reason: DenyReason::NotAuthorizedForRole,
                },
                RequestKind::Api => GateDecision::Reject {
                    status: 403,
                    reason: DenyReason::NotAuthorizedForRole,
                },
            };
        }

        GateDecision::Allow
    }

    fn to_login(
        &self,
        kind: RequestKind,
        path: &str,
        query: Option<&str>,
        reason: DenyReason,
    ) -> GateDecision {
        match kind {
            RequestKind::Page => {
                let mut requested = path.to_string();
                if let Some(query) = query.filter(|q| !q.is_empty()) {
                    requested.push('?');
                    requested.push_str(query);
                }
                GateDecision::Redirect {
                    location: format!(
                        "{}?callbackUrl={}",
                        self.login_path,
                        encode_return_path(&requested)
                    ),
                    reason,
                }
            }
            RequestKind::Api => GateDecision::Reject { status: 401, reason },
        }
    }
}

/// Percent-decode `raw` once, drop empty and `.` segments and resolve `..`
/// (never above the root). The result always starts with `/` and has no
/// trailing slash unless it is the root itself.
pub fn canonical_path(raw: &str) -> String {
    let bytes = urlencoding::decode_binary(raw.as_bytes());
    let decoded = String::from_utf8_lossy(&bytes);

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(decoded.len());
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Percent-encode a return path for use as a query value, leaving `/` and
/// unreserved characters readable.
pub fn encode_return_path(path: &str) -> String {
    urlencoding::encode(path).replace("%2F", "/")
}

/// Accept a post-login return path only if it stays on this site.
pub fn sanitize_return_path<'a>(candidate: Option<&'a str>, fallback: &'a str) -> &'a str {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.contains("://") =>
        {
            path
        }
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use printshop_core::TenantId;

    use super::*;
    use crate::RoleName;
    use crate::session::tests::new_session;

    fn gate() -> AuthorizationGate {
        AuthorizationGate::new(RouteAccessPolicy::standard())
    }

    fn session(role: RoleName) -> SessionState {
        let tenant = role.requires_tenant().then(TenantId::new);
        SessionState::Resolved(Session::new(new_session(role, tenant)).unwrap())
    }

    fn decide(path: &str, state: &SessionState) -> GateDecision {
        gate().authorize(&GateRequest {
            path,
            query: None,
            session: state,
        })
    }

    #[test]
    fn anonymous_dashboard_request_redirects_to_login_with_callback() {
        assert_eq!(
            decide("/dashboard/x", &SessionState::Absent),
            GateDecision::Redirect {
                location: "/login?callbackUrl=/dashboard/x".to_string(),
                reason: DenyReason::SessionAbsent,
            }
        );
    }

    #[test]
    fn public_root_bypasses_auth() {
        assert_eq!(decide("/", &SessionState::Absent), GateDecision::Allow);
    }

    #[test]
    fn role_mismatch_redirects_to_dashboard_root_not_login() {
        assert_eq!(
            decide("/dashboard/production", &session(RoleName::BusinessOwner)),
            GateDecision::Redirect {
                location: "/dashboard".to_string(),
                reason: DenyReason::NotAuthorizedForRole,
            }
        );
    }

    #[test]
    fn deactivated_sessions_go_to_login_with_reason() {
        let mut draft = new_session(RoleName::Client, Some(TenantId::new()));
        draft.is_active = false;
        let state = SessionState::Resolved(Session::new(draft).unwrap());

        assert_eq!(
            decide("/dashboard/client", &state),
            GateDecision::Redirect {
                location: "/login?reason=deactivated".to_string(),
                reason: DenyReason::AccountDeactivated,
            }
        );
    }

    #[test]
    fn invalid_and_timed_out_sessions_fail_closed() {
        let expired = SessionState::Invalid(SessionError::Expired);
        match decide("/dashboard", &expired) {
            GateDecision::Redirect { location, reason } => {
                assert!(location.starts_with("/login?callbackUrl="));
                assert_eq!(reason.code(), AccessErrorCode::TokenExpired);
            }
            other => panic!("expected redirect, got {other:?}"),
        }

        assert!(matches!(
            decide("/dashboard", &SessionState::TimedOut),
            GateDecision::Redirect { .. }
        ));
    }

    #[test]
    fn query_strings_are_carried_into_the_callback() {
        let decision = gate().authorize(&GateRequest {
            path: "/dashboard/client/orders",
            query: Some("status=open&page=2"),
            session: &SessionState::Absent,
        });
        assert_eq!(
            decision,
            GateDecision::Redirect {
                location: "/login?callbackUrl=/dashboard/client/orders%3Fstatus%3Dopen%26page%3D2"
                    .to_string(),
                reason: DenyReason::SessionAbsent,
            }
        );
    }

    #[test]
    fn api_requests_get_status_codes() {
        assert_eq!(
            decide("/api/tenants", &SessionState::Absent),
            GateDecision::Reject {
                status: 401,
                reason: DenyReason::SessionAbsent,
            }
        );
        assert_eq!(
            decide("/api/admin/impersonation-targets", &session(RoleName::BusinessOwner)),
            GateDecision::Reject {
                status: 403,
                reason: DenyReason::NotAuthorizedForRole,
            }
        );
        assert_eq!(decide("/api/auth/session", &SessionState::Absent), GateDecision::Allow);
    }

    #[test]
    fn super_admin_reaches_every_dashboard() {
        let admin = session(RoleName::SuperAdmin);
        for role in RoleName::ALL {
            assert_eq!(decide(role.dashboard_path(), &admin), GateDecision::Allow);
        }
    }

    #[test]
    fn decisions_are_repeatable() {
        let state = session(RoleName::Client);
        let first = decide("/dashboard/business", &state);
        for _ in 0..3 {
            assert_eq!(decide("/dashboard/business", &state), first);
        }
    }

    #[test]
    fn non_canonical_paths_are_judged_by_their_canonical_form() {
        let owner = session(RoleName::BusinessOwner);
        let denied = GateDecision::Redirect {
            location: "/dashboard".to_string(),
            reason: DenyReason::NotAuthorizedForRole,
        };
        for path in [
            "/dashboard//production",
            "/dashboard/%70roduction",
            "/dashboard//admin",
            "/dashboard/business/../production",
            "/dashboard/./admin/",
            "//dashboard/production",
        ] {
            assert_eq!(decide(path, &owner), denied, "{path}");
        }

        assert_eq!(
            decide("/api//admin/impersonation-targets", &owner),
            GateDecision::Reject {
                status: 403,
                reason: DenyReason::NotAuthorizedForRole,
            }
        );
    }

    #[test]
    fn canonical_path_normalizes_segments() {
        assert_eq!(canonical_path("/"), "/");
        assert_eq!(canonical_path(""), "/");
        assert_eq!(canonical_path("/dashboard/"), "/dashboard");
        assert_eq!(canonical_path("/dashboard//production"), "/dashboard/production");
        assert_eq!(canonical_path("/dashboard/%70roduction"), "/dashboard/production");
        assert_eq!(canonical_path("/dashboard/a%2F..%2Fadmin"), "/dashboard/admin");
        assert_eq!(canonical_path("/../../dashboard"), "/dashboard");
        // decoded exactly once
        assert_eq!(canonical_path("/dashboard/%2570roduction"), "/dashboard/%70roduction");
    }

    #[test]
    fn anonymous_callback_uses_the_canonical_path() {
        assert_eq!(
            decide("/dashboard//client", &SessionState::Absent),
            GateDecision::Redirect {
                location: "/login?callbackUrl=/dashboard/client".to_string(),
                reason: DenyReason::SessionAbsent,
            }
        );
    }

    #[test]
    fn return_paths_must_stay_on_site() {
        assert_eq!(sanitize_return_path(Some("/dashboard/x"), "/dashboard"), "/dashboard/x");
        assert_eq!(sanitize_return_path(Some("//evil.test"), "/dashboard"), "/dashboard");
        assert_eq!(sanitize_return_path(Some("https://evil.test"), "/dashboard"), "/dashboard");
        assert_eq!(sanitize_return_path(None, "/dashboard"), "/dashboard");
    }
}
