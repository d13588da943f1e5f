//! Credential storage: the single slot holding the signed session token and
//! the bearer credential forwarded to the business API.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::Session;
use crate::jwt::{JwtIssueError, JwtIssuer};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Sign(#[from] JwtIssueError),
}

/// Owns reading and writing of the session artifact.
///
/// No role checks belong here; a store only moves credentials in and out.
pub trait CredentialStore: Send + Sync {
    fn persist(&self, session: &Session) -> Result<(), CredentialError>;

    /// Idempotent; safe when nothing is stored.
    fn clear(&self);

    /// Raw signed session token.
    fn current(&self) -> Option<String>;

    /// Opaque bearer credential for the downstream business API.
    fn backend_token(&self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCredential {
    session_token: String,
    backend_token: String,
}

/// Per-tab in-memory credential slot.
pub struct InMemoryCredentialStore {
    issuer: Arc<dyn JwtIssuer>,
    slot: RwLock<Option<StoredCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new(issuer: Arc<dyn JwtIssuer>) -> Self {
        Self {
            issuer,
            slot: RwLock::new(None),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn persist(&self, session: &Session) -> Result<(), CredentialError> {
        let session_token = self.issuer.issue(&session.to_claims())?;
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(StoredCredential {
            session_token,
            backend_token: session.backend_token().to_string(),
        });
        Ok(())
    }

    fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    fn current(&self) -> Option<String> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.session_token.clone())
    }

    fn backend_token(&self) -> Option<String> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.backend_token.clone())
            .filter(|t| !t.is_empty())
    }
}
