use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::RoleName;

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "orders.read") carried in the session
/// claims. The wildcard `"*"` grants everything and is only ever issued to
/// `super_admin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ALL: Permission = Permission::from_static("*");

pub const ORDERS_READ: Permission = Permission::from_static("orders.read");
pub const ORDERS_WRITE: Permission = Permission::from_static("orders.write");
pub const PRODUCTS_READ: Permission = Permission::from_static("products.read");
pub const PRODUCTS_WRITE: Permission = Permission::from_static("products.write");
pub const INVOICES_READ: Permission = Permission::from_static("invoices.read");
pub const CUSTOMERS_READ: Permission = Permission::from_static("customers.read");
pub const PRODUCTION_READ: Permission = Permission::from_static("production.read");
pub const PRODUCTION_WRITE: Permission = Permission::from_static("production.write");
pub const TENANT_SETTINGS_WRITE: Permission = Permission::from_static("tenant.settings.write");

/// Permissions granted to a role at login time.
pub fn default_permissions(role: RoleName) -> Vec<Permission> {
    match role {
        RoleName::SuperAdmin => vec![ALL],
        RoleName::BusinessOwner => vec![
            ORDERS_READ,
            ORDERS_WRITE,
            PRODUCTS_READ,
            PRODUCTS_WRITE,
            INVOICES_READ,
            CUSTOMERS_READ,
            TENANT_SETTINGS_WRITE,
        ],
        RoleName::ProductionOwner => vec![ORDERS_READ, PRODUCTION_READ, PRODUCTION_WRITE],
        RoleName::Client => vec![ORDERS_READ, ORDERS_WRITE, PRODUCTS_READ, INVOICES_READ],
    }
}
