//! Argon2 password hashing (PHC strings).

use std::sync::OnceLock;

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

const DUMMY_PASSWORD: &str = "dummy-password";

/// Verify against `hash`, or burn the same argon2 work against a dummy hash
/// when there is none (unknown email, account never activated). Response
/// timing then does not reveal whether an account exists. `None` never
/// verifies.
pub fn verify_or_dummy(hash: Option<&str>, password: &str) -> bool {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    match hash {
        Some(hash) => verify_password(hash, password),
        None => {
            if let Some(dummy) = DUMMY.get_or_init(|| hash_password(DUMMY_PASSWORD).ok()) {
                let _ = verify_password(dummy, password);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "battery staple"));
    }

    #[test]
    fn missing_hash_never_verifies_even_with_the_dummy_password() {
        assert!(!verify_or_dummy(None, DUMMY_PASSWORD));
        assert!(!verify_or_dummy(None, "anything"));

        let hash = hash_password("correct horse").unwrap();
        assert!(verify_or_dummy(Some(&hash), "correct horse"));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
