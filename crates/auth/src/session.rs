//! The authenticated session and its invariants.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use printshop_core::{SubjectId, TenantId};

use crate::{AccessErrorCode, JwtClaims, Permission, RoleName};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Signature, algorithm or token structure did not verify.
    #[error("invalid session token")]
    InvalidToken,

    #[error("session token has expired")]
    Expired,

    /// The token verified but its identity claims break a session invariant.
    #[error("malformed session: {0}")]
    Malformed(String),

    #[error("session refresh denied")]
    RefreshDenied,
}

impl SessionError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn code(&self) -> AccessErrorCode {
        match self {
            SessionError::InvalidToken => AccessErrorCode::TokenInvalid,
            SessionError::Expired => AccessErrorCode::TokenExpired,
            SessionError::Malformed(_) => AccessErrorCode::TokenMalformed,
            SessionError::RefreshDenied => AccessErrorCode::RefreshDenied,
        }
    }
}

/// Fields needed to build a [`Session`]. Validated by [`Session::new`].
#[derive(Debug, Clone)]
pub struct NewSession {
    pub subject_id: SubjectId,
    pub email: String,
    pub display_name: String,
    pub role_name: RoleName,
    pub tenant_id: Option<TenantId>,
    pub permissions: Vec<Permission>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub backend_token: String,
    pub is_active: bool,
}

/// An authenticated identity derived from a verified credential.
///
/// # Invariants
/// - exactly one role;
/// - `tenant_id` is present for every role except `super_admin`;
/// - `expires_at > issued_at`.
///
/// Fields are private so a `Session` can only exist in a valid state.
/// It is deliberately not `Deserialize`: the only way in is through
/// [`Session::new`] or [`Session::from_claims`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    subject_id: SubjectId,
    email: String,
    display_name: String,
    role_id: u32,
    role_name: RoleName,
    tenant_id: Option<TenantId>,
    permissions: BTreeSet<Permission>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(skip)]
    backend_token: String,
    is_active: bool,
}

/// Role, name and email: the part of a session that impersonation swaps out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
pub struct Identity {
    pub role: RoleName,
    pub name: String,
    pub email: String,
}

impl Session {
    pub fn new(new: NewSession) -> Result<Self, SessionError> {
        if new.role_name.requires_tenant() && new.tenant_id.is_none() {
            return Err(SessionError::malformed(format!(
                "role '{}' requires a tenant",
                new.role_name
            )));
        }
        if new.expires_at <= new.issued_at {
            return Err(SessionError::malformed("expires_at must be after issued_at"));
        }
        if new.email.trim().is_empty() {
            return Err(SessionError::malformed("missing email"));
        }
        if !new.role_name.is_super_admin() && new.permissions.iter().any(Permission::is_wildcard) {
            return Err(SessionError::malformed(format!(
                "role '{}' cannot hold the wildcard permission",
                new.role_name
            )));
        }

        Ok(Self {
            subject_id: new.subject_id,
            email: new.email,
            display_name: new.display_name,
            role_id: new.role_name.role_id(),
            role_name: new.role_name,
            tenant_id: new.tenant_id,
            permissions: new.permissions.into_iter().collect(),
            issued_at: new.issued_at,
            expires_at: new.expires_at,
            backend_token: new.backend_token,
            is_active: new.is_active,
        })
    }

    /// Build a session from claims whose signature and time window have
    /// already been verified.
    pub fn from_claims(claims: JwtClaims) -> Result<Self, SessionError> {
        let role = claims
            .role
            .as_deref()
            .ok_or_else(|| SessionError::malformed("missing role"))?;
        let role_name: RoleName = role
            .parse()
            .map_err(|e: crate::roles::UnknownRole| SessionError::malformed(e.to_string()))?;

        if let Some(role_id) = claims.role_id {
            if role_id != role_name.role_id() {
                return Err(SessionError::malformed(format!(
                    "role_id {role_id} does not match role '{role_name}'"
                )));
            }
        }

        let issued_at = claims
            .issued_at()
            .ok_or_else(|| SessionError::malformed("iat out of range"))?;
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| SessionError::malformed("exp out of range"))?;

        Session::new(NewSession {
            subject_id: claims.sub,
            email: claims.email,
            display_name: claims.name,
            role_name,
            tenant_id: claims.tenant_id,
            permissions: claims.permissions,
            issued_at,
            expires_at,
            backend_token: claims.backend_token,
            is_active: claims.active,
        })
    }

    pub fn to_claims(&self) -> JwtClaims {
        JwtClaims {
            sub: self.subject_id,
            email: self.email.clone(),
            name: self.display_name.clone(),
            role_id: Some(self.role_id),
            role: Some(self.role_name.as_str().to_string()),
            tenant_id: self.tenant_id,
            permissions: self.permissions.iter().cloned().collect(),
            active: self.is_active,
            backend_token: self.backend_token.clone(),
            iat: self.issued_at.timestamp(),
            exp: self.expires_at.timestamp(),
        }
    }

    /// Same identity and claims over a new lifetime window.
    pub(crate) fn renewed(&self, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            issued_at,
            expires_at,
            ..self.clone()
        }
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn role_id(&self) -> u32 {
        self.role_id
    }

    pub fn role_name(&self) -> RoleName {
        self.role_name
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn backend_token(&self) -> &str {
        &self.backend_token
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn identity(&self) -> Identity {
        Identity {
            role: self.role_name,
            name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}
