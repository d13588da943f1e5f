//! Per-role navigation tables for the dashboard shell.

use serde::{Deserialize, Serialize};

use crate::RoleName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItem {
    pub label: String,
    pub path: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_count: Option<u32>,
}

impl NavigationItem {
    fn new(base: &str, suffix: &str, label: &str, icon: &str) -> Self {
        Self {
            label: label.to_string(),
            path: format!("{base}{suffix}"),
            icon: icon.to_string(),
            badge_count: None,
        }
    }

    pub fn with_badge(mut self, count: u32) -> Self {
        self.badge_count = Some(count);
        self
    }
}

// (path suffix, label, icon)
type Entry = (&'static str, &'static str, &'static str);

const CLIENT: &[Entry] = &[
    ("", "Overview", "home"),
    ("/orders", "Orders", "shopping-bag"),
    ("/products", "Products", "package"),
    ("/invoices", "Invoices", "file-text"),
    ("/profile", "Profile", "user"),
];

const BUSINESS_OWNER: &[Entry] = &[
    ("", "Overview", "home"),
    ("/orders", "Orders", "shopping-bag"),
    ("/products", "Products", "package"),
    ("/customers", "Customers", "users"),
    ("/production-partners", "Production partners", "factory"),
    ("/billing", "Billing", "credit-card"),
    ("/settings", "Settings", "settings"),
];

const PRODUCTION_OWNER: &[Entry] = &[
    ("", "Overview", "home"),
    ("/queue", "Queue", "list"),
    ("/orders", "Orders", "shopping-bag"),
    ("/equipment", "Equipment", "printer"),
    ("/settings", "Settings", "settings"),
];

const SUPER_ADMIN: &[Entry] = &[
    ("", "Overview", "home"),
    ("/businesses", "Businesses", "building"),
    ("/users", "Users", "users"),
    ("/plans", "Plans", "layers"),
    ("/audit", "Audit", "shield"),
    ("/settings", "Settings", "settings"),
];

/// Ordered navigation for `role`, rooted at the role's dashboard section.
pub fn views_for(role: RoleName) -> Vec<NavigationItem> {
    let entries = match role {
        RoleName::Client => CLIENT,
        RoleName::BusinessOwner => BUSINESS_OWNER,
        RoleName::ProductionOwner => PRODUCTION_OWNER,
        RoleName::SuperAdmin => SUPER_ADMIN,
    };
    let base = role.dashboard_path();
    entries
        .iter()
        .map(|(suffix, label, icon)| NavigationItem::new(base, suffix, label, icon))
        .collect()
}

/// Same as [`views_for`], keyed by role name. Unknown names get no items.
pub fn views_for_name(role: &str) -> Vec<NavigationItem> {
    role.parse::<RoleName>().map(views_for).unwrap_or_default()
}
