use printshop_auth::{Session, TenantScope};

/// The real, resolved session for a request.
///
/// Inserted by the gate middleware when a credential resolves; handlers
/// behind role-restricted prefixes can rely on it being present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session: Session,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Tenant boundary for data access.
    pub fn scope(&self) -> TenantScope {
        TenantScope::for_session(&self.session)
    }
}
