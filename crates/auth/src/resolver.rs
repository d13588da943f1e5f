//! Session resolution: raw token in, validated [`Session`] out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::claims::TokenValidationError;
use crate::jwt::{JwtCodec, JwtIssueError};
use crate::tenant::TenantDirectory;
use crate::{Session, SessionError, validate_claims};

/// How long sessions live and how late they may still be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLifetime {
    pub ttl: Duration,
    /// Window after `expires_at` during which `refresh` is still allowed.
    pub refresh_grace: Duration,
}

impl Default for SessionLifetime {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(8),
            refresh_grace: Duration::minutes(30),
        }
    }
}

/// Validates raw session tokens and renews sessions.
///
/// Holds no mutable state: writing the resulting token anywhere is the
/// caller's job (see [`crate::CredentialStore`]).
pub struct SessionResolver {
    jwt: Arc<dyn JwtCodec>,
    tenants: Arc<dyn TenantDirectory>,
    lifetime: SessionLifetime,
}

impl SessionResolver {
    pub fn new(
        jwt: Arc<dyn JwtCodec>,
        tenants: Arc<dyn TenantDirectory>,
        lifetime: SessionLifetime,
    ) -> Self {
        Self {
            jwt,
            tenants,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> SessionLifetime {
        self.lifetime
    }

    /// Verify signature, then time window, then identity invariants.
    ///
    /// No claim is trusted before both the signature and the expiry pass.
    pub fn resolve_session(&self, raw_token: &str, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let claims = self.jwt.decode(raw_token)?;

        validate_claims(&claims, now).map_err(|e| match e {
            TokenValidationError::Expired => SessionError::Expired,
            TokenValidationError::NotYetValid | TokenValidationError::InvalidTimeWindow => {
                SessionError::InvalidToken
            }
        })?;

        let session = Session::from_claims(claims)?;
        self.ensure_tenant_exists(&session)?;
        Ok(session)
    }

    /// Decode a token for renewal: signature and identity are checked as in
    /// [`Self::resolve_session`], but an expired token is accepted as long as
    /// it is still inside the refresh grace window.
    pub fn resolve_for_refresh(&self, raw_token: &str, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let claims = self.jwt.decode(raw_token).map_err(|e| match e {
            SessionError::Expired => SessionError::RefreshDenied,
            other => other,
        })?;
        let session = Session::from_claims(claims)?;
        self.ensure_tenant_exists(&session)?;

        if now >= session.expires_at() + self.lifetime.refresh_grace {
            return Err(SessionError::RefreshDenied);
        }
        Ok(session)
    }

    /// Extend a session's lifetime without re-collecting credentials.
    pub fn refresh(&self, session: &Session, now: DateTime<Utc>) -> Result<Session, SessionError> {
        if !session.is_active() {
            tracing::info!(subject_id = %session.subject_id(), "refresh denied: account deactivated");
            return Err(SessionError::RefreshDenied);
        }
        if now < session.issued_at() || now >= session.expires_at() + self.lifetime.refresh_grace {
            tracing::info!(subject_id = %session.subject_id(), "refresh denied: outside grace window");
            return Err(SessionError::RefreshDenied);
        }
        self.ensure_tenant_exists(session)
            .map_err(|_| SessionError::RefreshDenied)?;

        Ok(session.renewed(now, now + self.lifetime.ttl))
    }

    /// Sign a session into a raw token.
    pub fn issue(&self, session: &Session) -> Result<String, JwtIssueError> {
        self.jwt.issue(&session.to_claims())
    }

    fn ensure_tenant_exists(&self, session: &Session) -> Result<(), SessionError> {
        match session.tenant_id() {
            Some(tenant_id) if !self.tenants.exists(&tenant_id) => Err(SessionError::malformed(
                format!("unknown tenant {tenant_id}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Async seam for session resolution.
///
/// The HTTP edge wraps calls in a timeout; implementations may perform I/O
/// (e.g. introspection against an identity backend).
#[async_trait]
pub trait SessionIntrospector: Send + Sync {
    async fn introspect(&self, raw_token: &str) -> Result<Session, SessionError>;
}

#[async_trait]
impl SessionIntrospector for SessionResolver {
    async fn introspect(&self, raw_token: &str) -> Result<Session, SessionError> {
        self.resolve_session(raw_token, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use printshop_core::TenantId;

    use super::*;
    use crate::jwt::Hs256Jwt;
    use crate::session::tests::new_session;
    use crate::tenant::{InMemoryTenantDirectory, Tenant};
    use crate::{AccessErrorCode, JwtIssuer, RoleName};

    struct Fixture {
        resolver: SessionResolver,
        jwt: Arc<Hs256Jwt>,
        tenant_id: TenantId,
    }

    fn fixture() -> Fixture {
        let jwt = Arc::new(Hs256Jwt::new("test-secret"));
        let tenants = Arc::new(InMemoryTenantDirectory::new());
        let tenant_id = TenantId::new();
        tenants.insert(Tenant {
            tenant_id,
            business_name: "Acme Co".to_string(),
            owner_email: "owner@acme.test".to_string(),
        });
        let resolver = SessionResolver::new(jwt.clone(), tenants, SessionLifetime::default());
        Fixture {
            resolver,
            jwt,
            tenant_id,
        }
    }

    #[test]
    fn resolves_a_freshly_issued_session() {
        let f = fixture();
        let session = Session::new(new_session(RoleName::BusinessOwner, Some(f.tenant_id))).unwrap();
        let token = f.resolver.issue(&session).unwrap();

        let resolved = f.resolver.resolve_session(&token, Utc::now()).unwrap();
        assert_eq!(resolved.role_name(), RoleName::BusinessOwner);
        assert_eq!(resolved.tenant_id(), Some(f.tenant_id));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let f = fixture();
        let session = Session::new(new_session(RoleName::Client, Some(f.tenant_id))).unwrap();
        let token = f.resolver.issue(&session).unwrap();

        let later = session.expires_at() + Duration::seconds(1);
        assert_eq!(f.resolver.resolve_session(&token, later), Err(SessionError::Expired));
    }

    #[test]
    fn unknown_tenant_is_malformed() {
        let f = fixture();
        let session = Session::new(new_session(RoleName::Client, Some(TenantId::new()))).unwrap();
        let token = f.resolver.issue(&session).unwrap();

        let err = f.resolver.resolve_session(&token, Utc::now()).unwrap_err();
        assert_eq!(err.code(), AccessErrorCode::TokenMalformed);
    }

    #[test]
    fn missing_tenant_for_tenant_role_is_malformed() {
        let f = fixture();
        let mut claims = Session::new(new_session(RoleName::Client, Some(f.tenant_id)))
            .unwrap()
            .to_claims();
        claims.tenant_id = None;
        let token = f.jwt.issue(&claims).unwrap();

        let err = f.resolver.resolve_session(&token, Utc::now()).unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));
    }

    #[test]
    fn refresh_extends_lifetime_within_grace() {
        let f = fixture();
        let session = Session::new(new_session(RoleName::Client, Some(f.tenant_id))).unwrap();
        let now = session.expires_at() + Duration::minutes(5);

        let refreshed = f.resolver.refresh(&session, now).unwrap();
        assert_eq!(refreshed.issued_at(), now);
        assert_eq!(refreshed.expires_at(), now + SessionLifetime::default().ttl);
        assert_eq!(refreshed.identity(), session.identity());
    }

    #[test]
    fn refresh_is_denied_after_grace_or_when_deactivated() {
        let f = fixture();
        let session = Session::new(new_session(RoleName::Client, Some(f.tenant_id))).unwrap();
        let too_late = session.expires_at() + Duration::hours(1);
        assert_eq!(f.resolver.refresh(&session, too_late), Err(SessionError::RefreshDenied));

        let mut draft = new_session(RoleName::Client, Some(f.tenant_id));
        draft.is_active = false;
        let inactive = Session::new(draft).unwrap();
        assert_eq!(
            f.resolver.refresh(&inactive, Utc::now()),
            Err(SessionError::RefreshDenied)
        );
    }

    #[test]
    fn resolve_for_refresh_accepts_recently_expired_tokens() {
        let f = fixture();
        let session = Session::new(new_session(RoleName::Client, Some(f.tenant_id))).unwrap();
        let token = f.resolver.issue(&session).unwrap();

        let shortly_after = session.expires_at() + Duration::minutes(1);
        assert!(f.resolver.resolve_for_refresh(&token, shortly_after).is_ok());

        let long_after = session.expires_at() + Duration::days(1);
        assert_eq!(
            f.resolver.resolve_for_refresh(&token, long_after),
            Err(SessionError::RefreshDenied)
        );
    }

    #[tokio::test]
    async fn introspection_uses_the_current_clock() {
        let f = fixture();
        let session = Session::new(new_session(RoleName::SuperAdmin, None)).unwrap();
        let token = f.resolver.issue(&session).unwrap();

        let resolved = f.resolver.introspect(&token).await.unwrap();
        assert!(resolved.role_name().is_super_admin());
        assert_eq!(f.resolver.introspect("garbage").await, Err(SessionError::InvalidToken));
    }
}
