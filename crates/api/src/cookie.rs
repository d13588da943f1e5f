//! Session cookie codec.
//!
//! The browser holds the signed session token in an HttpOnly cookie;
//! programmatic clients may send it as a bearer token instead.

use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{HeaderMap, HeaderValue, header};
use printshop_auth::{CredentialError, CredentialStore, JwtIssuer, Session};

pub const SESSION_COOKIE: &str = "printshop_session";

/// Session token from the cookie, falling back to `Authorization: Bearer`.
pub fn read_session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE).or_else(|| extract_bearer(headers).map(str::to_string))
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_secs: i64,
}

impl CookieSettings {
    fn attributes(&self) -> &'static str {
        if self.secure {
            "HttpOnly; Secure; SameSite=Lax; Path=/"
        } else {
            "HttpOnly; SameSite=Lax; Path=/"
        }
    }

    pub fn set(&self, token: &str) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{SESSION_COOKIE}={token}; Max-Age={}; {}",
            self.max_age_secs,
            self.attributes()
        ))
        .ok()
    }

    pub fn clear(&self) -> HeaderValue {
        if self.secure {
            HeaderValue::from_static(
                "printshop_session=; Max-Age=0; HttpOnly; Secure; SameSite=Lax; Path=/",
            )
        } else {
            HeaderValue::from_static("printshop_session=; Max-Age=0; HttpOnly; SameSite=Lax; Path=/")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Set { token: String, backend_token: String },
    Clear,
}

/// Credential store for one HTTP exchange.
///
/// Starts from the request's cookie; `persist`/`clear` record the
/// `Set-Cookie` to send back, applied with [`ResponseCredentials::apply`].
pub struct ResponseCredentials {
    issuer: Arc<dyn JwtIssuer>,
    settings: CookieSettings,
    incoming: Option<String>,
    pending: Mutex<Option<Pending>>,
}

impl ResponseCredentials {
    pub fn new(issuer: Arc<dyn JwtIssuer>, settings: CookieSettings, request: &HeaderMap) -> Self {
        Self {
            issuer,
            settings,
            incoming: read_session_token(request),
            pending: Mutex::new(None),
        }
    }

    /// Add the recorded `Set-Cookie`, if any, to `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let value = match pending.as_ref() {
            Some(Pending::Set { token, .. }) => self.settings.set(token),
            Some(Pending::Clear) => Some(self.settings.clear()),
            None => None,
        };
        if let Some(value) = value {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

impl CredentialStore for ResponseCredentials {
    fn persist(&self, session: &Session) -> Result<(), CredentialError> {
        let token = self.issuer.issue(&session.to_claims())?;
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(Pending::Set {
            token,
            backend_token: session.backend_token().to_string(),
        });
        Ok(())
    }

    fn clear(&self) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(Pending::Clear);
    }

    fn current(&self) -> Option<String> {
        match self.pending.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(Pending::Set { token, .. }) => Some(token.clone()),
            Some(Pending::Clear) => None,
            None => self.incoming.clone(),
        }
    }

    fn backend_token(&self) -> Option<String> {
        match self.pending.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(Pending::Set { backend_token, .. }) if !backend_token.is_empty() => {
                Some(backend_token.clone())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use printshop_auth::{Hs256Jwt, JwtValidator, NewSession, RoleName, permissions};
    use printshop_core::SubjectId;

    use super::*;

    fn settings() -> CookieSettings {
        CookieSettings {
            secure: true,
            max_age_secs: 3600,
        }
    }

    fn admin_session() -> Session {
        let now = Utc::now();
        Session::new(NewSession {
            subject_id: SubjectId::new(),
            email: "root@printshop.test".to_string(),
            display_name: "Root Admin".to_string(),
            role_name: RoleName::SuperAdmin,
            tenant_id: None,
            permissions: permissions::default_permissions(RoleName::SuperAdmin),
            issued_at: now,
            expires_at: now + Duration::hours(1),
            backend_token: "bk_cookie".to_string(),
            is_active: true,
        })
        .unwrap()
    }

    #[test]
    fn cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; printshop_session=abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(read_session_token(&headers).as_deref(), Some("abc"));

        headers.remove(header::COOKIE);
        assert_eq!(read_session_token(&headers).as_deref(), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(read_session_token(&headers), None);
    }

    #[test]
    fn persist_emits_a_signed_http_only_cookie() {
        let jwt = Arc::new(Hs256Jwt::new("cookie-secret"));
        let store = ResponseCredentials::new(jwt.clone(), settings(), &HeaderMap::new());
        let session = admin_session();
        store.persist(&session).unwrap();

        let mut out = HeaderMap::new();
        store.apply(&mut out);
        let cookie = out[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("printshop_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));

        let token = store.current().unwrap();
        assert_eq!(jwt.decode(&token).unwrap().sub, session.subject_id());
        assert_eq!(store.backend_token().as_deref(), Some("bk_cookie"));
    }

    #[test]
    fn clear_expires_the_cookie_and_is_idempotent() {
        let mut request = HeaderMap::new();
        request.insert(header::COOKIE, HeaderValue::from_static("printshop_session=old"));
        let store = ResponseCredentials::new(Arc::new(Hs256Jwt::new("k")), settings(), &request);
        assert_eq!(store.current().as_deref(), Some("old"));

        store.clear();
        store.clear();
        assert_eq!(store.current(), None);

        let mut out = HeaderMap::new();
        store.apply(&mut out);
        assert!(out[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));
    }
}
