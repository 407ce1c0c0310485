use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use crate::error::AuthError;

/// Hash a password with Argon2id for storage.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Storage(anyhow::anyhow!("password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

/// Check a candidate password against a stored hash. Any mismatch, including
/// an unparseable stored hash, answers `CredentialMismatch` so the caller
/// leaks nothing about why.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| AuthError::CredentialMismatch)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::CredentialMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong guess", &hash),
            Err(AuthError::CredentialMismatch)
        ));
    }

    #[test]
    fn corrupt_stored_hash_is_a_mismatch() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::CredentialMismatch)
        ));
    }
}
