//! Impersonation overlay.
//!
//! A super admin may view the dashboard "as" another identity. The override
//! lives in ephemeral tab storage, never in the signed session, and only
//! changes what is displayed: the effective identity is read-only and every
//! server-side decision keeps using the real session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use printshop_auth::{AccessErrorCode, Identity, RoleName, Session};
use printshop_observability::{CorruptionReport, CorruptionSink};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::EphemeralStorage;

pub const OVERRIDE_KEY: &str = "printshop.impersonation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImpersonationOverride {
    pub active: bool,
    pub target_identity: Identity,
    pub original_admin_identity: Identity,
    pub created_at: DateTime<Utc>,
}

/// What navigation and display should use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveIdentity {
    pub role: RoleName,
    pub name: String,
    pub email: String,
    pub impersonating: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<Identity>,
}

impl EffectiveIdentity {
    fn real(session: &Session) -> Self {
        Self {
            role: session.role_name(),
            name: session.display_name().to_string(),
            email: session.email().to_string(),
            impersonating: false,
            read_only: false,
            original: None,
        }
    }

    fn overlaid(o: &ImpersonationOverride) -> Self {
        Self {
            role: o.target_identity.role,
            name: o.target_identity.name.clone(),
            email: o.target_identity.email.clone(),
            impersonating: true,
            read_only: true,
            original: Some(o.original_admin_identity.clone()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImpersonationError {
    #[error("only super admins may impersonate")]
    NotSuperAdmin,

    #[error("super admin identities cannot be impersonated")]
    TargetIsSuperAdmin,

    #[error("failed to encode override: {0}")]
    Encode(String),
}

impl ImpersonationError {
    pub fn code(&self) -> AccessErrorCode {
        match self {
            ImpersonationError::NotSuperAdmin | ImpersonationError::TargetIsSuperAdmin => {
                AccessErrorCode::ImpersonationNotPermitted
            }
            ImpersonationError::Encode(_) => AccessErrorCode::ImpersonationStateCorrupt,
        }
    }
}

/// Reads and writes the override slot. Cheap to share across tasks.
pub struct ImpersonationOverlay {
    storage: Arc<dyn EphemeralStorage>,
    sink: Arc<dyn CorruptionSink>,
}

impl ImpersonationOverlay {
    pub fn new(storage: Arc<dyn EphemeralStorage>, sink: Arc<dyn CorruptionSink>) -> Self {
        Self { storage, sink }
    }

    /// Start impersonating `target`. The caller's *real* session must be a
    /// super admin; on failure the stored state is left untouched.
    pub fn begin(
        &self,
        real: &Session,
        target: Identity,
        now: DateTime<Utc>,
    ) -> Result<ImpersonationOverride, ImpersonationError> {
        if !real.role_name().is_super_admin() {
            tracing::warn!(
                subject_id = %real.subject_id(),
                role = %real.role_name(),
                "impersonation refused for non-admin"
            );
            return Err(ImpersonationError::NotSuperAdmin);
        }
        if target.role.is_super_admin() {
            return Err(ImpersonationError::TargetIsSuperAdmin);
        }

        let record = ImpersonationOverride {
            active: true,
            target_identity: target,
            original_admin_identity: real.identity(),
            created_at: now,
        };
        let payload =
            serde_json::to_string(&record).map_err(|e| ImpersonationError::Encode(e.to_string()))?;
        self.storage.set(OVERRIDE_KEY, payload);

        tracing::info!(
            admin = %record.original_admin_identity.email,
            target = %record.target_identity.email,
            target_role = %record.target_identity.role,
            "impersonation started"
        );
        Ok(record)
    }

    /// The stored override, if one is present and parses.
    pub fn current(&self) -> Option<ImpersonationOverride> {
        let raw = self.storage.get(OVERRIDE_KEY)?;
        match serde_json::from_str::<ImpersonationOverride>(&raw) {
            Ok(record) if record.active => Some(record),
            Ok(_) => None,
            Err(err) => {
                self.report(err.to_string(), raw.len());
                None
            }
        }
    }

    /// Always succeeds, including when nothing is active.
    pub fn end(&self) {
        if self.storage.get(OVERRIDE_KEY).is_some() {
            tracing::info!("impersonation ended");
        }
        self.storage.remove(OVERRIDE_KEY);
    }

    /// Target identity while an override applies, otherwise the real one.
    ///
    /// An override that cannot apply to `session` (target is a super admin,
    /// the real role is not, or it was started by a different admin) is
    /// reported and ignored, never promoted.
    pub fn resolve_effective(&self, session: &Session) -> EffectiveIdentity {
        let Some(record) = self.current() else {
            return EffectiveIdentity::real(session);
        };

        let problem = if record.target_identity.role.is_super_admin() {
            Some("override targets a super admin")
        } else if !session.role_name().is_super_admin() {
            Some("override present for a non-admin session")
        } else if !record
            .original_admin_identity
            .email
            .eq_ignore_ascii_case(session.email())
        {
            Some("override was started by a different admin")
        } else {
            None
        };

        match problem {
            Some(detail) => {
                self.report(detail.to_string(), 0);
                EffectiveIdentity::real(session)
            }
            None => EffectiveIdentity::overlaid(&record),
        }
    }

    fn report(&self, detail: String, payload_len: usize) {
        self.sink.report(&CorruptionReport {
            code: AccessErrorCode::ImpersonationStateCorrupt.as_str(),
            key: OVERRIDE_KEY.to_string(),
            detail,
            payload_len,
        });
    }
}

#[cfg(test)]
mod tests {
    use printshop_observability::TracingReporter;

    use super::*;
    use crate::storage::SharedTabStorage;
    use crate::testing::{admin, session};

    fn overlay() -> (ImpersonationOverlay, SharedTabStorage, Arc<TracingReporter>) {
        let storage = SharedTabStorage::new();
        let reporter = Arc::new(TracingReporter::new());
        let overlay = ImpersonationOverlay::new(Arc::new(storage.clone()), reporter.clone());
        (overlay, storage, reporter)
    }

    fn acme() -> Identity {
        Identity {
            role: RoleName::BusinessOwner,
            name: "Acme Co".to_string(),
            email: "owner@acme.test".to_string(),
        }
    }

    #[test]
    fn acme_co_scenario() {
        let (overlay, _, _) = overlay();
        let real = admin();

        overlay.begin(&real, acme(), Utc::now()).unwrap();
        let effective = overlay.resolve_effective(&real);
        assert_eq!(effective.role, RoleName::BusinessOwner);
        assert_eq!(effective.name, "Acme Co");
        assert!(effective.impersonating);
        assert!(effective.read_only);
        assert_eq!(real.role_name(), RoleName::SuperAdmin);

        overlay.end();
        let restored = overlay.resolve_effective(&real);
        assert_eq!(restored.role, RoleName::SuperAdmin);
        assert_eq!(restored.name, "Root Admin");
        assert!(!restored.impersonating);
        assert_eq!(real.role_name(), RoleName::SuperAdmin);
    }

    #[test]
    fn non_admins_cannot_begin_and_state_is_unchanged() {
        let (overlay, storage, _) = overlay();
        storage.set(OVERRIDE_KEY, "sentinel".to_string());

        for role in [RoleName::Client, RoleName::BusinessOwner, RoleName::ProductionOwner] {
            let caller = session(role, "Someone", "someone@acme.test");
            let err = overlay.begin(&caller, acme(), Utc::now()).unwrap_err();
            assert_eq!(err, ImpersonationError::NotSuperAdmin);
            assert_eq!(err.code(), AccessErrorCode::ImpersonationNotPermitted);
            assert_eq!(storage.get(OVERRIDE_KEY).as_deref(), Some("sentinel"));
        }
    }

    #[test]
    fn super_admin_targets_are_refused() {
        let (overlay, _, _) = overlay();
        let target = Identity {
            role: RoleName::SuperAdmin,
            name: "Other Admin".to_string(),
            email: "other@printshop.test".to_string(),
        };
        assert_eq!(
            overlay.begin(&admin(), target, Utc::now()),
            Err(ImpersonationError::TargetIsSuperAdmin)
        );
        assert!(overlay.current().is_none());
    }

    #[test]
    fn end_is_idempotent() {
        let (overlay, _, _) = overlay();
        overlay.end();
        overlay.end();
        assert!(overlay.current().is_none());

        overlay.begin(&admin(), acme(), Utc::now()).unwrap();
        overlay.end();
        overlay.end();
        assert!(overlay.current().is_none());
    }

    #[test]
    fn corrupt_payloads_fall_back_to_the_real_role() {
        let (overlay, storage, reporter) = overlay();
        let real = admin();

        for payload in [
            "{not json",
            r#"{"active": true}"#,
            r#"{"active": true, "targetIdentity": {"role": "root", "name": "x", "email": "x"}}"#,
        ] {
            storage.set(OVERRIDE_KEY, payload.to_string());
            let effective = overlay.resolve_effective(&real);
            assert_eq!(effective.role, RoleName::SuperAdmin);
            assert!(!effective.impersonating);
        }
        assert_eq!(reporter.reported(), 3);
    }

    #[test]
    fn tampered_super_admin_target_is_ignored() {
        let (overlay, storage, reporter) = overlay();
        let real = admin();
        let forged = ImpersonationOverride {
            active: true,
            target_identity: Identity {
                role: RoleName::SuperAdmin,
                name: "Elevated".to_string(),
                email: "x@printshop.test".to_string(),
            },
            original_admin_identity: real.identity(),
            created_at: Utc::now(),
        };
        storage.set(OVERRIDE_KEY, serde_json::to_string(&forged).unwrap());

        let effective = overlay.resolve_effective(&real);
        assert!(!effective.impersonating);
        assert_eq!(effective.name, "Root Admin");
        assert_eq!(reporter.reported(), 1);
    }

    #[test]
    fn override_never_applies_to_a_non_admin_session() {
        let (overlay, _, reporter) = overlay();
        overlay.begin(&admin(), acme(), Utc::now()).unwrap();

        let client = session(RoleName::Client, "Casey", "casey@acme.test");
        let effective = overlay.resolve_effective(&client);
        assert_eq!(effective.role, RoleName::Client);
        assert!(!effective.read_only);
        assert_eq!(reporter.reported(), 1);
    }

    #[test]
    fn storage_scope_ending_clears_the_override() {
        let (overlay, storage, _) = overlay();
        overlay.begin(&admin(), acme(), Utc::now()).unwrap();
        storage.clear();
        assert!(overlay.current().is_none());
    }

    #[test]
    fn effective_role_is_never_super_admin_while_impersonating() {
        let (overlay, _, _) = overlay();
        let real = admin();
        for role in [RoleName::Client, RoleName::BusinessOwner, RoleName::ProductionOwner] {
            let target = Identity {
                role,
                name: "Target".to_string(),
                email: "t@acme.test".to_string(),
            };
            overlay.begin(&real, target, Utc::now()).unwrap();
            let effective = overlay.resolve_effective(&real);
            assert!(effective.impersonating);
            assert_ne!(effective.role, RoleName::SuperAdmin);
        }
    }
}
