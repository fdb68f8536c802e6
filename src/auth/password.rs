use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use rand_core::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(String);

/// Hash a password into an Argon2id PHC string
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError(e.to_string()))
}

/// Check a password against a stored PHC string. A corrupt hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

// Unknown accounts are checked against this hash and always fail
static MISSING_ACCOUNT_HASH: Lazy<String> = Lazy::new(|| hash_password("missing-account").unwrap_or_default());

/// Check a login attempt. With no account the password is still run through
/// Argon2 against a throwaway hash, and the attempt fails.
pub fn verify_account_password(password: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            verify_password(password, &MISSING_ACCOUNT_HASH);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_original_password() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("S3cret", &hash));
    }

    #[test]
    fn corrupt_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn missing_account_runs_a_real_verification_and_fails() {
        assert!(MISSING_ACCOUNT_HASH.starts_with("$argon2id$"));
        assert!(!verify_account_password("missing-account", None));

        let hash = hash_password("s3cret").unwrap();
        assert!(verify_account_password("s3cret", Some(&hash)));
        assert!(!verify_account_password("wrong", Some(&hash)));
    }
}
