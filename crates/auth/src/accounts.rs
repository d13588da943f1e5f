//! Accounts, login and email-verification activation.
//!
//! Login failures are deliberately uniform: an unknown email, a wrong
//! password and a not-yet-activated account all produce
//! [`AuthError::InvalidCredentials`].

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use printshop_core::{DomainError, SubjectId, TenantId};

use crate::password::{self, MIN_PASSWORD_LEN};
use crate::resolver::SessionResolver;
use crate::{AccessErrorCode, NewSession, RoleName, Session, SessionError, permissions};

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Created, waiting for email verification. Cannot log in.
    #[default]
    Pending,
    Active,
    /// Can authenticate, but every session it gets is marked inactive.
    Deactivated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub subject_id: SubjectId,
    pub email: String,
    pub display_name: String,
    pub role: RoleName,
    pub tenant_id: Option<TenantId>,
    pub password_hash: Option<String>,
    pub status: AccountStatus,
}

impl Account {
    /// A new, pending account. Same validation rules as session identities.
    pub fn pending(
        email: &str,
        display_name: &str,
        role: RoleName,
        tenant_id: Option<TenantId>,
    ) -> Result<Self, DomainError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }
        if role.requires_tenant() && tenant_id.is_none() {
            return Err(DomainError::invariant(format!("role '{role}' requires a tenant")));
        }

        Ok(Self {
            subject_id: SubjectId::new(),
            email,
            display_name: display_name.trim().to_string(),
            role,
            tenant_id,
            password_hash: None,
            status: AccountStatus::Pending,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Single-use, time-limited email verification token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationToken {
    pub token: String,
    pub subject_id: SubjectId,
    pub expires_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory
// ─────────────────────────────────────────────────────────────────────────────

pub trait AccountDirectory: Send + Sync {
    fn find_by_email(&self, email: &str) -> Option<Account>;

    fn get(&self, subject_id: &SubjectId) -> Option<Account>;

    /// Every account, ordered by email.
    fn list(&self) -> Vec<Account>;

    /// Insert or replace. Emails are unique across accounts.
    fn save(&self, account: Account) -> Result<(), DomainError>;

    fn store_activation(&self, token: ActivationToken);

    /// Remove and return the token. A second call with the same value
    /// returns `None`, which is what makes tokens single-use.
    fn take_activation(&self, token: &str) -> Option<ActivationToken>;
}

/// In-memory account directory.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    accounts: RwLock<HashMap<SubjectId, Account>>,
    activations: Mutex<HashMap<String, ActivationToken>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn find_by_email(&self, email: &str) -> Option<Account> {
        let email = normalize_email(email);
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|a| a.email == email)
            .cloned()
    }

    fn get(&self, subject_id: &SubjectId) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject_id)
            .cloned()
    }

    fn list(&self) -> Vec<Account> {
        let mut all: Vec<Account> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        all
    }

    fn save(&self, account: Account) -> Result<(), DomainError> {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        let taken = accounts
            .values()
            .any(|a| a.email == account.email && a.subject_id != account.subject_id);
        if taken {
            return Err(DomainError::invariant("email already registered"));
        }
        accounts.insert(account.subject_id, account);
        Ok(())
    }

    fn store_activation(&self, token: ActivationToken) {
        self.activations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.token.clone(), token);
    }

    fn take_activation(&self, token: &str) -> Option<ActivationToken> {
        self.activations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Login / activation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("activation token is invalid or expired")]
    ActivationInvalid,

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("internal: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn code(&self) -> Option<AccessErrorCode> {
        match self {
            AuthError::InvalidCredentials => Some(AccessErrorCode::AuthInvalidCredentials),
            AuthError::ActivationInvalid => Some(AccessErrorCode::ActivationInvalid),
            AuthError::Session(e) => Some(e.code()),
            AuthError::Domain(_) | AuthError::Internal(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequest {
    pub token: String,
    pub new_password: String,
}

/// A successful login: the session and its signed token.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    pub token: String,
}

pub struct Authenticator {
    accounts: Arc<dyn AccountDirectory>,
    resolver: Arc<SessionResolver>,
    activation_ttl: Duration,
}

impl Authenticator {
    pub fn new(accounts: Arc<dyn AccountDirectory>, resolver: Arc<SessionResolver>) -> Self {
        Self {
            accounts,
            resolver,
            activation_ttl: Duration::hours(24),
        }
    }

    pub fn login(&self, request: &LoginRequest, now: DateTime<Utc>) -> Result<LoginOutcome, AuthError> {
        let Some(account) = self.accounts.find_by_email(&request.email) else {
            password::verify_or_dummy(None, &request.password);
            return Err(AuthError::InvalidCredentials);
        };

        // Pending accounts have no hash yet; they pay the same argon2 cost as
        // unknown emails.
        let verified = password::verify_or_dummy(account.password_hash.as_deref(), &request.password);
        if !verified || account.status == AccountStatus::Pending {
            tracing::info!(subject_id = %account.subject_id, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let outcome = self.open_session(&account, now).map_err(|e| match e {
            AuthError::Session(err) => {
                tracing::error!(subject_id = %account.subject_id, error = %err, "account cannot form a session");
                AuthError::InvalidCredentials
            }
            other => other,
        })?;

        tracing::info!(
            subject_id = %outcome.session.subject_id(),
            role = %outcome.session.role_name(),
            active = outcome.session.is_active(),
            "login succeeded"
        );
        Ok(outcome)
    }

    /// Renew a session from its raw token.
    ///
    /// The account is read again, so a deactivation, role or tenant change
    /// since login shows up in the renewed session. A deactivated account gets
    /// an inactive session, exactly as at login. Every renewal carries a new
    /// backend token.
    pub fn refresh(&self, raw_token: &str, now: DateTime<Utc>) -> Result<LoginOutcome, AuthError> {
        let previous = self.resolver.resolve_for_refresh(raw_token, now).map_err(|e| {
            tracing::info!(error = %e, "refresh denied: token did not resolve");
            SessionError::RefreshDenied
        })?;
        // grace window, prior deactivation, tenant still present
        self.resolver.refresh(&previous, now)?;

        let account = match self.accounts.get(&previous.subject_id()) {
            Some(account) if account.status != AccountStatus::Pending => account,
            _ => {
                tracing::info!(subject_id = %previous.subject_id(), "refresh denied: account missing or pending");
                return Err(SessionError::RefreshDenied.into());
            }
        };

        let outcome = self.open_session(&account, now).map_err(|e| match e {
            AuthError::Session(err) => {
                tracing::info!(subject_id = %account.subject_id, error = %err, "refresh denied: account cannot form a session");
                AuthError::Session(SessionError::RefreshDenied)
            }
            other => other,
        })?;

        tracing::info!(
            subject_id = %account.subject_id,
            active = outcome.session.is_active(),
            "session refreshed"
        );
        Ok(outcome)
    }

    /// Build, sign and re-resolve a fresh session for `account`.
    fn open_session(&self, account: &Account, now: DateTime<Utc>) -> Result<LoginOutcome, AuthError> {
        let session = Session::new(NewSession {
            subject_id: account.subject_id,
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            role_name: account.role,
            tenant_id: account.tenant_id,
            permissions: permissions::default_permissions(account.role),
            issued_at: now,
            expires_at: now + self.resolver.lifetime().ttl,
            backend_token: random_token(32)?,
            is_active: account.status == AccountStatus::Active,
        })?;

        let token = self
            .resolver
            .issue(&session)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        // Whatever we hand out must resolve (e.g. the tenant still exists).
        self.resolver.resolve_session(&token, now)?;

        Ok(LoginOutcome { session, token })
    }

    /// Create a verification token for a pending account.
    pub fn issue_activation(&self, subject_id: SubjectId, now: DateTime<Utc>) -> Result<ActivationToken, AuthError> {
        let account = self.accounts.get(&subject_id).ok_or(DomainError::NotFound)?;
        if account.status != AccountStatus::Pending {
            return Err(DomainError::invariant("account is not pending activation").into());
        }

        let token = ActivationToken {
            token: random_token(32)?,
            subject_id,
            expires_at: now + self.activation_ttl,
        };
        self.accounts.store_activation(token.clone());
        Ok(token)
    }

    /// Consume a verification token, set the password and activate the account.
    pub fn activate(&self, request: &ActivationRequest, now: DateTime<Utc>) -> Result<Account, AuthError> {
        if request.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            ))
            .into());
        }

        let token = self
            .accounts
            .take_activation(&request.token)
            .ok_or(AuthError::ActivationInvalid)?;
        if now >= token.expires_at {
            return Err(AuthError::ActivationInvalid);
        }

        let mut account = self
            .accounts
            .get(&token.subject_id)
            .ok_or(AuthError::ActivationInvalid)?;
        if account.status != AccountStatus::Pending {
            return Err(AuthError::ActivationInvalid);
        }

        account.password_hash = Some(
            password::hash_password(&request.new_password)
                .map_err(|e| AuthError::Internal(e.to_string()))?,
        );
        account.status = AccountStatus::Active;
        self.accounts.save(account.clone())?;

        tracing::info!(subject_id = %account.subject_id, "account activated");
        Ok(account)
    }
}

fn random_token(len: usize) -> Result<String, AuthError> {
    let mut bytes = vec![0u8; len];
    getrandom::getrandom(&mut bytes).map_err(|e| AuthError::Internal(e.to_string()))?;
    let mut out = String::with_capacity(len * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    Ok(out)
}
