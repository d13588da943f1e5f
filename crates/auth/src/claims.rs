use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use printshop_core::{SubjectId, TenantId};

use crate::Permission;

/// JWT claims model (transport-agnostic).
///
/// Identity fields are optional at this layer on purpose: a token that
/// decodes but lacks a role (or a tenant for a tenant-bound role) is
/// classified as malformed by [`crate::Session::from_claims`], not rejected
/// by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / principal identifier.
    pub sub: SubjectId,

    pub email: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<u32>,

    /// Role name in the session vocabulary (`client`, `business_owner`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Tenant context for the token. Absent only for `super_admin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Account status at issuance.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Opaque credential forwarded to the downstream business API.
    #[serde(default)]
    pub backend_token: String,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiration (unix seconds).
    pub exp: i64,
}

fn default_active() -> bool {
    true
}

impl JwtClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of JWT claims.
///
/// Signature verification happens in [`crate::jwt`]; this only checks the
/// claims against `now`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
