//! Dashboard shell state machine.
//!
//! ```text
//! LoadingAuth ──no session──▶ Unauthenticated
//!      │
//!      └──session──▶ AuthenticatedResolvingRole ──▶ Ready(effective)
//!                              ▲                         │
//!                              └── navigation / overlay ─┘
//! ```
//!
//! The loop never terminates while the tab is open.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use printshop_auth::{
    CredentialStore, Identity, NavigationItem, Session, SessionIntrospector, views_for,
};
use thiserror::Error;

use crate::impersonation::{EffectiveIdentity, ImpersonationError, ImpersonationOverlay};

pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellState {
    LoadingAuth,
    Unauthenticated,
    AuthenticatedResolvingRole,
    Ready(EffectiveIdentity),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Impersonation(#[from] ImpersonationError),
}

pub struct DashboardShell {
    introspector: Arc<dyn SessionIntrospector>,
    credentials: Arc<dyn CredentialStore>,
    overlay: Arc<ImpersonationOverlay>,
    validation_timeout: Duration,
    state: ShellState,
    session: Option<Session>,
    location: Option<String>,
}

impl DashboardShell {
    pub fn new(
        introspector: Arc<dyn SessionIntrospector>,
        credentials: Arc<dyn CredentialStore>,
        overlay: Arc<ImpersonationOverlay>,
    ) -> Self {
        Self {
            introspector,
            credentials,
            overlay,
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
            state: ShellState::LoadingAuth,
            session: None,
            location: None,
        }
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// The real session. Never affected by impersonation.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn effective(&self) -> Option<&EffectiveIdentity> {
        match &self.state {
            ShellState::Ready(effective) => Some(effective),
            _ => None,
        }
    }

    /// Navigation for the effective role; empty until ready.
    pub fn navigation(&self) -> Vec<NavigationItem> {
        self.effective()
            .map(|e| views_for(e.role))
            .unwrap_or_default()
    }

    /// Validate the stored credential and settle into `Ready` or
    /// `Unauthenticated`. A validation timeout counts as no session.
    pub async fn load(&mut self) -> &ShellState {
        self.state = ShellState::LoadingAuth;
        self.session = None;

        let Some(raw) = self.credentials.current() else {
            self.state = ShellState::Unauthenticated;
            return &self.state;
        };

        match tokio::time::timeout(self.validation_timeout, self.introspector.introspect(&raw)).await {
            Ok(Ok(session)) => {
                self.session = Some(session);
                self.state = ShellState::AuthenticatedResolvingRole;
                self.resolve_role();
            }
            Ok(Err(err)) => {
                tracing::info!(code = %err.code(), "stored session rejected");
                self.credentials.clear();
                self.state = ShellState::Unauthenticated;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.validation_timeout.as_millis() as u64,
                    "session validation timed out"
                );
                self.state = ShellState::Unauthenticated;
            }
        }
        &self.state
    }

    /// Record a route change and re-read the overlay.
    pub fn navigate(&mut self, path: &str) -> &ShellState {
        self.location = Some(path.to_string());
        self.reenter();
        &self.state
    }

    /// Called when the overlay watcher reports a change.
    pub fn on_overlay_changed(&mut self) -> &ShellState {
        self.reenter();
        &self.state
    }

    pub fn begin_impersonation(&mut self, target: Identity) -> Result<&ShellState, ShellError> {
        let session = self.session.as_ref().ok_or(ShellError::NotSignedIn)?;
        self.overlay.begin(session, target, Utc::now())?;
        self.reenter();
        Ok(&self.state)
    }

    /// Only the real super admin session can exit; for anyone else the
    /// overlay never applied in the first place.
    pub fn exit_impersonation(&mut self) -> Result<&ShellState, ShellError> {
        let session = self.session.as_ref().ok_or(ShellError::NotSignedIn)?;
        if !session.role_name().is_super_admin() {
            return Err(ImpersonationError::NotSuperAdmin.into());
        }
        self.overlay.end();
        self.reenter();
        Ok(&self.state)
    }

    pub fn sign_out(&mut self) -> &ShellState {
        self.overlay.end();
        self.credentials.clear();
        self.session = None;
        self.location = None;
        self.state = ShellState::Unauthenticated;
        &self.state
    }

    fn reenter(&mut self) {
        if matches!(self.state, ShellState::Ready(_)) {
            self.state = ShellState::AuthenticatedResolvingRole;
            self.resolve_role();
        }
    }

    fn resolve_role(&mut self) {
        if let Some(session) = &self.session {
            self.state = ShellState::Ready(self.overlay.resolve_effective(session));
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use printshop_auth::{
        Hs256Jwt, InMemoryCredentialStore, InMemoryTenantDirectory, RoleName, SessionError,
        SessionLifetime, SessionResolver,
    };
    use printshop_observability::TracingReporter;

    use super::*;
    use crate::storage::SharedTabStorage;
    use crate::testing::{admin, session};

    struct Fixture {
        credentials: Arc<InMemoryCredentialStore>,
        overlay: Arc<ImpersonationOverlay>,
        resolver: Arc<SessionResolver>,
    }

    fn fixture() -> Fixture {
        let jwt = Arc::new(Hs256Jwt::new("shell-secret"));
        let resolver = Arc::new(SessionResolver::new(
            jwt.clone(),
            Arc::new(InMemoryTenantDirectory::new()),
            SessionLifetime::default(),
        ));
        Fixture {
            credentials: Arc::new(InMemoryCredentialStore::new(jwt)),
            overlay: Arc::new(ImpersonationOverlay::new(
                Arc::new(SharedTabStorage::new()),
                Arc::new(TracingReporter::new()),
            )),
            resolver,
        }
    }

    fn shell(f: &Fixture) -> DashboardShell {
        DashboardShell::new(f.resolver.clone(), f.credentials.clone(), f.overlay.clone())
    }

    struct Stalled;

    #[async_trait]
    impl SessionIntrospector for Stalled {
        async fn introspect(&self, _raw: &str) -> Result<Session, SessionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(SessionError::InvalidToken)
        }
    }

    #[tokio::test]
    async fn starts_loading_and_settles_unauthenticated_without_a_credential() {
        let f = fixture();
        let mut shell = shell(&f);
        assert_eq!(shell.state(), &ShellState::LoadingAuth);
        assert_eq!(shell.load().await, &ShellState::Unauthenticated);
        assert!(shell.navigation().is_empty());
    }

    #[tokio::test]
    async fn valid_session_reaches_ready_with_real_identity() {
        let f = fixture();
        f.credentials.persist(&admin()).unwrap();
        let mut shell = shell(&f);

        match shell.load().await {
            ShellState::Ready(effective) => {
                assert_eq!(effective.role, RoleName::SuperAdmin);
                assert!(!effective.impersonating);
            }
            other => panic!("expected ready, got {other:?}"),
        }
        assert_eq!(shell.navigation(), views_for(RoleName::SuperAdmin));
    }

    #[tokio::test]
    async fn validation_timeout_fails_closed() {
        let f = fixture();
        f.credentials.persist(&admin()).unwrap();
        let mut shell = DashboardShell::new(Arc::new(Stalled), f.credentials.clone(), f.overlay.clone())
            .with_validation_timeout(Duration::from_millis(20));

        assert_eq!(shell.load().await, &ShellState::Unauthenticated);
        assert!(shell.session().is_none());
    }

    #[tokio::test]
    async fn acme_co_impersonation_through_the_shell() {
        let f = fixture();
        f.credentials.persist(&admin()).unwrap();
        let mut shell = shell(&f);
        shell.load().await;

        let target = Identity {
            role: RoleName::BusinessOwner,
            name: "Acme Co".to_string(),
            email: "owner@acme.test".to_string(),
        };
        shell.begin_impersonation(target).unwrap();
        let effective = shell.effective().unwrap();
        assert_eq!(effective.role, RoleName::BusinessOwner);
        assert_eq!(effective.name, "Acme Co");
        assert_eq!(shell.navigation(), views_for(RoleName::BusinessOwner));
        assert_eq!(shell.session().unwrap().role_name(), RoleName::SuperAdmin);

        shell.exit_impersonation().unwrap();
        let effective = shell.effective().unwrap();
        assert_eq!(effective.role, RoleName::SuperAdmin);
        assert_eq!(effective.name, "Root Admin");
    }

    #[tokio::test]
    async fn navigation_rereads_overlay_written_by_another_tab() {
        let f = fixture();
        f.credentials.persist(&admin()).unwrap();
        let mut shell = shell(&f);
        shell.load().await;

        let real = shell.session().unwrap().clone();
        f.overlay
            .begin(
                &real,
                Identity {
                    role: RoleName::ProductionOwner,
                    name: "Press Works".to_string(),
                    email: "ops@press.test".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        // Not picked up until the shell re-enters role resolution.
        assert_eq!(shell.effective().unwrap().role, RoleName::SuperAdmin);

        shell.navigate("/dashboard/production/queue");
        assert_eq!(shell.effective().unwrap().role, RoleName::ProductionOwner);
        assert_eq!(shell.location(), Some("/dashboard/production/queue"));
    }

    #[tokio::test]
    async fn non_admins_cannot_impersonate_or_exit() {
        let f = fixture();
        let tenants = InMemoryTenantDirectory::new();
        let client = session(RoleName::Client, "Casey", "casey@acme.test");
        tenants.insert(printshop_auth::Tenant {
            tenant_id: client.tenant_id().unwrap(),
            business_name: "Acme".to_string(),
            owner_email: "owner@acme.test".to_string(),
        });
        let jwt = Arc::new(Hs256Jwt::new("shell-secret"));
        let resolver = Arc::new(SessionResolver::new(jwt, Arc::new(tenants), SessionLifetime::default()));
        f.credentials.persist(&client).unwrap();
        let mut shell = DashboardShell::new(resolver, f.credentials.clone(), f.overlay.clone());
        shell.load().await;
        assert_eq!(shell.effective().unwrap().role, RoleName::Client);

        let err = shell
            .begin_impersonation(Identity {
                role: RoleName::BusinessOwner,
                name: "Acme Co".to_string(),
                email: "owner@acme.test".to_string(),
            })
            .unwrap_err();
        assert_eq!(err, ShellError::Impersonation(ImpersonationError::NotSuperAdmin));
        assert!(shell.exit_impersonation().is_err());
        assert!(f.overlay.current().is_none());
    }

    #[tokio::test]
    async fn rejected_credentials_are_cleared() {
        let f = fixture();
        // Tenant unknown to the resolver's directory: malformed.
        let client = session(RoleName::Client, "Casey", "casey@acme.test");
        f.credentials.persist(&client).unwrap();
        let mut shell = shell(&f);

        assert_eq!(shell.load().await, &ShellState::Unauthenticated);
        assert!(f.credentials.current().is_none());
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let f = fixture();
        f.credentials.persist(&admin()).unwrap();
        let mut shell = shell(&f);
        shell.load().await;

        assert_eq!(shell.sign_out(), &ShellState::Unauthenticated);
        assert!(f.credentials.current().is_none());
        assert!(shell.session().is_none());
    }
}
