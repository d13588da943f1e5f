//! Error taxonomy shared by every access-control component.
//!
//! Each component has its own `thiserror` enum; all of them classify into an
//! [`AccessErrorCode`], which is what crosses process boundaries (JSON error
//! bodies, log fields, redirect reasons).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessErrorCode {
    /// Login rejected. Never says whether the email exists.
    AuthInvalidCredentials,
    TokenInvalid,
    TokenExpired,
    TokenMalformed,
    SessionAbsent,
    RefreshDenied,
    AccountDeactivated,
    ActivationInvalid,
    NotAuthorizedForRole,
    TenantIsolation,
    ImpersonationNotPermitted,
    /// Unparseable override; recovered by falling back to the real identity.
    ImpersonationStateCorrupt,
}

impl AccessErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthInvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenMalformed => "TOKEN_MALFORMED",
            Self::SessionAbsent => "SESSION_ABSENT",
            Self::RefreshDenied => "REFRESH_DENIED",
            Self::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            Self::ActivationInvalid => "ACTIVATION_INVALID",
            Self::NotAuthorizedForRole => "NOT_AUTHORIZED_FOR_ROLE",
            Self::TenantIsolation => "TENANT_ISOLATION",
            Self::ImpersonationNotPermitted => "IMPERSONATION_NOT_PERMITTED",
            Self::ImpersonationStateCorrupt => "IMPERSONATION_STATE_CORRUPT",
        }
    }
}

impl core::fmt::Display for AccessErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_and_display_agree() {
        let code = AccessErrorCode::ImpersonationStateCorrupt;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, format!("\"{code}\""));
    }
}
