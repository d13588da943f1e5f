//! Tenants and the tenant-scoping invariant.
//!
//! Every non-admin session is bound to exactly one tenant; data reads and
//! writes made on its behalf are filtered through [`TenantScope`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use printshop_core::TenantId;

use crate::{AccessErrorCode, Session};

/// A print-shop business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub business_name: String,
    pub owner_email: String,
}

/// Read access to the set of existing tenants.
pub trait TenantDirectory: Send + Sync {
    fn get(&self, tenant_id: &TenantId) -> Option<Tenant>;

    fn list(&self) -> Vec<Tenant>;

    fn exists(&self, tenant_id: &TenantId) -> bool {
        self.get(tenant_id).is_some()
    }
}

/// In-memory tenant directory.
///
/// Intended for tests/dev and for deployments that load tenants at startup.
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    tenants: RwLock<BTreeMap<TenantId, Tenant>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant: Tenant) {
        let mut tenants = self
            .tenants
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tenants.insert(tenant.tenant_id, tenant);
    }
}

impl TenantDirectory for InMemoryTenantDirectory {
    fn get(&self, tenant_id: &TenantId) -> Option<Tenant> {
        self.tenants
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(tenant_id)
            .cloned()
    }

    fn list(&self) -> Vec<Tenant> {
        self.tenants
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantAccessError {
    #[error("tenant isolation: session is scoped to tenant {scoped}, resource belongs to {requested}")]
    CrossTenant {
        scoped: TenantId,
        requested: TenantId,
    },
}

impl TenantAccessError {
    pub fn code(&self) -> AccessErrorCode {
        AccessErrorCode::TenantIsolation
    }
}

/// The data a session may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// Platform-wide (super admin).
    All,
    Tenant(TenantId),
}

impl TenantScope {
    /// Derived from the real session only; impersonation never widens or
    /// narrows the scope of server-side data access.
    pub fn for_session(session: &Session) -> Self {
        match session.tenant_id() {
            _ if session.role_name().is_super_admin() => TenantScope::All,
            Some(tenant_id) => TenantScope::Tenant(tenant_id),
            // Unreachable for a valid `Session`; fail towards the narrowest scope.
            None => TenantScope::Tenant(TenantId::from_uuid(uuid::Uuid::nil())),
        }
    }

    pub fn ensure_access(&self, requested: TenantId) -> Result<(), TenantAccessError> {
        match self {
            TenantScope::All => Ok(()),
            TenantScope::Tenant(scoped) if *scoped == requested => Ok(()),
            TenantScope::Tenant(scoped) => Err(TenantAccessError::CrossTenant {
                scoped: *scoped,
                requested,
            }),
        }
    }

    /// Keep only the items visible in this scope.
    pub fn filter<T, F>(&self, items: impl IntoIterator<Item = T>, tenant_of: F) -> Vec<T>
    where
        F: Fn(&T) -> TenantId,
    {
        items
            .into_iter()
            .filter(|item| self.ensure_access(tenant_of(item)).is_ok())
            .collect()
    }
}
