use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of roles a session can carry.
///
/// Every role comparison in the workspace goes through this enum; raw role
/// strings only exist at the edges (token claims, backend payloads) and are
/// converted via [`RoleName::from_str`] or [`RoleName::from_backend`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleName {
    Client,
    BusinessOwner,
    ProductionOwner,
    SuperAdmin,
}

/// Static facts about a role: ids, names on both sides of the wire, and the
/// dashboard section it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleProfile {
    pub role: RoleName,
    pub role_id: u32,
    /// Name used in session claims and the UI.
    pub name: &'static str,
    /// Name used by the downstream business API.
    pub backend_name: &'static str,
    pub label: &'static str,
    /// Dashboard section owned by this role (route policy + navigation root).
    pub dashboard_path: &'static str,
}

/// Canonical role table.
///
/// Consumed by the route policy ([`crate::policy::RouteAccessPolicy::standard`])
/// and the navigation mapper ([`crate::navigation::views_for`]), so the two
/// cannot drift apart.
pub const ROLE_TABLE: [RoleProfile; 4] = [
    RoleProfile {
        role: RoleName::Client,
        role_id: 1,
        name: "client",
        backend_name: "CLIENT",
        label: "Client",
        dashboard_path: "/dashboard/client",
    },
    RoleProfile {
        role: RoleName::BusinessOwner,
        role_id: 2,
        name: "business_owner",
        backend_name: "BUSINESS_OWNER",
        label: "Business owner",
        dashboard_path: "/dashboard/business",
    },
    RoleProfile {
        role: RoleName::ProductionOwner,
        role_id: 3,
        name: "production_owner",
        backend_name: "PRODUCTION_OWNER",
        label: "Production owner",
        dashboard_path: "/dashboard/production",
    },
    RoleProfile {
        role: RoleName::SuperAdmin,
        role_id: 4,
        name: "super_admin",
        backend_name: "SUPER_ADMIN",
        label: "Super admin",
        dashboard_path: "/dashboard/admin",
    },
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl RoleName {
    pub const ALL: [RoleName; 4] = [
        RoleName::Client,
        RoleName::BusinessOwner,
        RoleName::ProductionOwner,
        RoleName::SuperAdmin,
    ];

    pub fn profile(self) -> &'static RoleProfile {
        // ROLE_TABLE is indexed in declaration order.
        &ROLE_TABLE[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.profile().name
    }

    pub fn role_id(self) -> u32 {
        self.profile().role_id
    }

    pub fn dashboard_path(self) -> &'static str {
        self.profile().dashboard_path
    }

    pub fn is_super_admin(self) -> bool {
        self == RoleName::SuperAdmin
    }

    /// Every role except `super_admin` is bound to a tenant.
    pub fn requires_tenant(self) -> bool {
        !self.is_super_admin()
    }

    /// Adapter from the downstream API's role vocabulary.
    ///
    /// Accepts the backend's canonical upper-case names and the legacy short
    /// aliases it still emits for older accounts.
    pub fn from_backend(name: &str) -> Option<RoleName> {
        let role = match name.trim() {
            "CLIENT" | "customer" => RoleName::Client,
            "BUSINESS_OWNER" | "business" | "owner" => RoleName::BusinessOwner,
            "PRODUCTION_OWNER" | "production" => RoleName::ProductionOwner,
            "SUPER_ADMIN" | "admin" => RoleName::SuperAdmin,
            _ => return None,
        };
        Some(role)
    }

    pub fn to_backend(self) -> &'static str {
        self.profile().backend_name
    }
}

impl FromStr for RoleName {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ROLE_TABLE
            .iter()
            .find(|p| p.name == s)
            .map(|p| p.role)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
