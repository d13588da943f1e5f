//! Route access policy: which path prefixes are public and which roles may
//! reach the rest.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RoleName;
use crate::roles::ROLE_TABLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathMatch {
    Exact,
    /// Matches the path itself and anything below it on a segment boundary
    /// (`/dashboard` matches `/dashboard/x`, not `/dashboards`).
    #[default]
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub path: String,

    #[serde(default)]
    pub matching: PathMatch,

    /// Reachable without a session.
    #[serde(default)]
    pub public: bool,

    /// `None`: any authenticated role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_roles: Option<BTreeSet<RoleName>>,
}

impl RouteRule {
    pub fn public_exact(path: &str) -> Self {
        Self {
            path: path.to_string(),
            matching: PathMatch::Exact,
            public: true,
            allowed_roles: None,
        }
    }

    pub fn public_prefix(path: &str) -> Self {
        Self {
            path: path.to_string(),
            matching: PathMatch::Prefix,
            public: true,
            allowed_roles: None,
        }
    }

    pub fn authenticated(path: &str) -> Self {
        Self {
            path: path.to_string(),
            matching: PathMatch::Prefix,
            public: false,
            allowed_roles: None,
        }
    }

    pub fn restricted(path: &str, roles: impl IntoIterator<Item = RoleName>) -> Self {
        Self {
            path: path.to_string(),
            matching: PathMatch::Prefix,
            public: false,
            allowed_roles: Some(roles.into_iter().collect()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self.matching {
            PathMatch::Exact => path == self.path,
            PathMatch::Prefix => {
                if path == self.path {
                    return true;
                }
                match path.strip_prefix(self.path.as_str()) {
                    Some(rest) => self.path.ends_with('/') || rest.starts_with('/'),
                    None => false,
                }
            }
        }
    }

    /// Exact rules beat prefix rules; longer prefixes beat shorter ones.
    fn specificity(&self) -> (bool, usize) {
        (self.matching == PathMatch::Exact, self.path.len())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("route path must start with '/': {0}")]
    RelativePath(String),

    #[error("duplicate route rule for {0}")]
    Duplicate(String),

    #[error("public route {0} cannot restrict roles")]
    PublicWithRoles(String),

    #[error("invalid policy document: {0}")]
    Parse(String),
}

/// Static path-prefix → access mapping, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAccessPolicy {
    rules: Vec<RouteRule>,
}

impl RouteAccessPolicy {
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, PolicyError> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            if !rule.path.starts_with('/') {
                return Err(PolicyError::RelativePath(rule.path.clone()));
            }
            if !seen.insert((rule.path.as_str(), rule.matching == PathMatch::Exact)) {
                return Err(PolicyError::Duplicate(rule.path.clone()));
            }
            if rule.public && rule.allowed_roles.is_some() {
                return Err(PolicyError::PublicWithRoles(rule.path.clone()));
            }
        }
        Ok(Self { rules })
    }

    /// Load from the JSON form (`[{"path": "/", "matching": "exact", "public": true}, ...]`).
    pub fn from_json(document: &str) -> Result<Self, PolicyError> {
        let rules: Vec<RouteRule> =
            serde_json::from_str(document).map_err(|e| PolicyError::Parse(e.to_string()))?;
        Self::new(rules)
    }

    /// The policy the application ships with.
    ///
    /// Each role's dashboard section comes from [`ROLE_TABLE`]. `super_admin`
    /// is admitted to every section so that an admin who is impersonating
    /// (a purely client-side overlay) can still load the pages being viewed;
    /// the gate only ever sees the real role.
    pub fn standard() -> Self {
        let mut rules = vec![
            RouteRule::public_exact("/"),
            RouteRule::public_prefix("/login"),
            RouteRule::public_prefix("/register"),
            RouteRule::public_prefix("/verify-email"),
            RouteRule::public_prefix("/forgot-password"),
            RouteRule::public_prefix("/health"),
            RouteRule::public_prefix("/static"),
            RouteRule::public_prefix("/api/auth"),
            RouteRule::authenticated("/dashboard"),
            RouteRule::authenticated("/api"),
            RouteRule::restricted("/api/admin", [RoleName::SuperAdmin]),
        ];

        for profile in ROLE_TABLE.iter() {
            let mut roles = vec![profile.role];
            if !profile.role.is_super_admin() {
                roles.push(RoleName::SuperAdmin);
            }
            rules.push(RouteRule::restricted(profile.dashboard_path, roles));
        }

        Self { rules }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Most specific rule matching `path`, if any.
    pub fn rule_for(&self, path: &str) -> Option<&RouteRule> {
        self.rules
            .iter()
            .filter(|r| r.matches(path))
            .max_by_key(|r| r.specificity())
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.rule_for(path).is_some_and(|r| r.public)
    }

    /// `None` when the path is not role-restricted.
    pub fn allowed_roles(&self, path: &str) -> Option<&BTreeSet<RoleName>> {
        self.rule_for(path).and_then(|r| r.allowed_roles.as_ref())
    }

    pub fn permits(&self, path: &str, role: RoleName) -> bool {
        self.allowed_roles(path).is_none_or(|roles| roles.contains(&role))
    }
}

impl Default for RouteAccessPolicy {
    fn default() -> Self {
        Self::standard()
    }
}
