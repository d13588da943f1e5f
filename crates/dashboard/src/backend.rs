//! Client for the downstream business API.
//!
//! Attaches the session's backend credential as a bearer token and does not
//! interpret business responses beyond decoding JSON.

use std::sync::Arc;

use printshop_auth::{CredentialStore, RoleName};
use reqwest::{Method, RequestBuilder};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::impersonation::EffectiveIdentity;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no backend credential stored")]
    NoCredential,
    #[error("read-only identity cannot perform {0}")]
    ReadOnly(Method),
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Header naming the role an admin is viewing as, in the backend's vocabulary.
pub const VIEWING_AS_HEADER: &str = "x-viewing-as";

/// The signed-in user as the business API describes it.
///
/// The backend has its own role names; they are mapped through
/// [`RoleName::from_backend`] and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUser {
    pub email: String,
    pub name: String,
    #[serde(deserialize_with = "backend_role")]
    pub role: RoleName,
}

fn backend_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RoleName, D::Error> {
    let raw = String::deserialize(deserializer)?;
    RoleName::from_backend(&raw).ok_or_else(|| de::Error::custom(format!("unknown backend role {raw:?}")))
}

pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            credentials,
        }
    }

    /// Build an authenticated request.
    ///
    /// Mutating methods are refused while the effective identity is
    /// read-only (impersonating). The business API still authorizes every
    /// call against the real credential; this only keeps the UI honest.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        effective: &EffectiveIdentity,
    ) -> Result<RequestBuilder, BackendError> {
        if effective.read_only && !is_safe(&method) {
            tracing::warn!(%method, path, "mutation blocked while impersonating");
            return Err(BackendError::ReadOnly(method));
        }
        let token = self
            .credentials
            .backend_token()
            .ok_or(BackendError::NoCredential)?;
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut req = self.http.request(method, url).bearer_auth(token);
        if effective.impersonating {
            req = req.header(VIEWING_AS_HEADER, effective.role.to_backend());
        }
        Ok(req)
    }

    /// GET /me
    pub async fn current_user(&self, effective: &EffectiveIdentity) -> Result<BackendUser, BackendError> {
        self.get_json("/me", effective).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        effective: &EffectiveIdentity,
    ) -> Result<T, BackendError> {
        let req = self.request(Method::GET, path, effective)?;
        Self::send(req).await
    }

    pub async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        effective: &EffectiveIdentity,
    ) -> Result<T, BackendError> {
        let req = self.request(method, path, effective)?.json(body);
        Self::send(req).await
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, BackendError> {
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(BackendError::Api(status, resp.text().await.unwrap_or_default()));
        }

        resp.json().await.map_err(|e| BackendError::Parse(e.to_string()))
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

#[cfg(test)]
mod tests {
    use printshop_auth::{Hs256Jwt, InMemoryCredentialStore};
    use reqwest::header::AUTHORIZATION;

    use super::*;
    use crate::testing::admin;

    fn identity(read_only: bool) -> EffectiveIdentity {
        EffectiveIdentity {
            role: RoleName::BusinessOwner,
            name: "Acme Co".to_string(),
            email: "owner@acme.test".to_string(),
            impersonating: read_only,
            read_only,
            original: None,
        }
    }

    fn client_with_credential() -> BackendClient {
        let store = Arc::new(InMemoryCredentialStore::new(Arc::new(Hs256Jwt::new("s"))));
        store.persist(&admin()).unwrap();
        BackendClient::new("http://backend.test/", store)
    }

    #[test]
    fn forwards_the_backend_token_as_bearer() {
        let req = client_with_credential()
            .request(Method::GET, "/orders", &identity(false))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(req.url().as_str(), "http://backend.test/orders");
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer bk_live");
    }

    #[test]
    fn read_only_identities_may_only_read() {
        let client = client_with_credential();
        assert!(client.request(Method::GET, "/orders", &identity(true)).is_ok());
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(matches!(
                client.request(method, "/orders", &identity(true)),
                Err(BackendError::ReadOnly(_))
            ));
        }
    }

    #[test]
    fn impersonated_requests_name_the_viewed_role_in_backend_terms() {
        let client = client_with_credential();
        let req = client
            .request(Method::GET, "/orders", &identity(true))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(req.headers()[VIEWING_AS_HEADER], RoleName::BusinessOwner.to_backend());

        let req = client
            .request(Method::GET, "/orders", &identity(false))
            .unwrap()
            .build()
            .unwrap();
        assert!(req.headers().get(VIEWING_AS_HEADER).is_none());
    }

    #[test]
    fn backend_users_map_backend_role_names() {
        let user: BackendUser = serde_json::from_value(serde_json::json!({
            "email": "owner@acme.test",
            "name": "Acme Co",
            "role": "BUSINESS_OWNER",
        }))
        .unwrap();
        assert_eq!(user.role, RoleName::BusinessOwner);

        let legacy: BackendUser = serde_json::from_value(serde_json::json!({
            "email": "c@acme.test",
            "name": "C",
            "role": "customer",
        }))
        .unwrap();
        assert_eq!(legacy.role, RoleName::Client);

        let unknown = serde_json::from_value::<BackendUser>(serde_json::json!({
            "email": "x@acme.test",
            "name": "X",
            "role": "janitor",
        }));
        assert!(unknown.is_err());
    }

    #[test]
    fn missing_credential_is_an_error() {
        let store = Arc::new(InMemoryCredentialStore::new(Arc::new(Hs256Jwt::new("s"))));
        let client = BackendClient::new("http://backend.test", store);
        assert!(matches!(
            client.request(Method::GET, "/orders", &identity(false)),
            Err(BackendError::NoCredential)
        ));
    }
}
