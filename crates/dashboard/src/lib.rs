//! `printshop-dashboard`: the client half of access control.
//!
//! Holds the per-tab credential and impersonation state, turns them into an
//! effective identity for navigation, and forwards the backend credential on
//! calls to the business API. Nothing here is a security boundary; the edge
//! gate and the business API re-check the real session.

pub mod backend;
pub mod impersonation;
pub mod shell;
pub mod storage;
pub mod watcher;

pub use backend::{BackendClient, BackendError, BackendUser, VIEWING_AS_HEADER};
pub use impersonation::{
    EffectiveIdentity, ImpersonationError, ImpersonationOverlay, ImpersonationOverride,
};
pub use shell::{DashboardShell, ShellError, ShellState};
pub use storage::{EphemeralStorage, SharedTabStorage};
pub use watcher::{OverlayWatcher, OverlayWatcherConfig, WatcherHandle};

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, Utc};
    use printshop_auth::{NewSession, RoleName, Session, permissions};
    use printshop_core::{SubjectId, TenantId};

    pub(crate) fn session(role: RoleName, name: &str, email: &str) -> Session {
        let now = Utc::now();
        Session::new(NewSession {
            subject_id: SubjectId::new(),
            email: email.to_string(),
            display_name: name.to_string(),
            role_name: role,
            tenant_id: role.requires_tenant().then(TenantId::new),
            permissions: permissions::default_permissions(role),
            issued_at: now,
            expires_at: now + Duration::hours(1),
            backend_token: "bk_live".to_string(),
            is_active: true,
        })
        .unwrap()
    }

    pub(crate) fn admin() -> Session {
        session(RoleName::SuperAdmin, "Root Admin", "root@printshop.test")
    }
}
