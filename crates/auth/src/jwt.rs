//! HS256 JWT signing and verification.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use thiserror::Error;

use crate::{JwtClaims, SessionError};

/// Signature verification and decoding of a raw session token.
///
/// Implementations verify the signature only; the time window is checked by
/// [`crate::validate_claims`] against an explicit `now`.
pub trait JwtValidator: Send + Sync {
    fn decode(&self, token: &str) -> Result<JwtClaims, SessionError>;
}

pub trait JwtIssuer: Send + Sync {
    fn issue(&self, claims: &JwtClaims) -> Result<String, JwtIssueError>;
}

/// Both halves of a symmetric codec.
pub trait JwtCodec: JwtValidator + JwtIssuer {}

impl<T: JwtValidator + JwtIssuer> JwtCodec for T {}

#[derive(Debug, Error)]
#[error("failed to sign session token: {0}")]
pub struct JwtIssueError(#[from] jsonwebtoken::errors::Error);

/// HMAC-SHA256 codec keyed by a shared secret.
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256Jwt {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is validated deterministically by `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256Jwt {
    fn decode(&self, token: &str) -> Result<JwtClaims, SessionError> {
        jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                // Claims are only deserialized once the signature has verified.
                ErrorKind::Json(inner) => SessionError::malformed(inner.to_string()),
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::InvalidToken,
            })
    }
}

impl JwtIssuer for Hs256Jwt {
    fn issue(&self, claims: &JwtClaims) -> Result<String, JwtIssueError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }
}
