//! Password hashing with Argon2

use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("stored password hash is malformed: {0}")]
    InvalidHash(String),

    #[error("failed to verify password: {0}")]
    Verification(String),

    #[error("password hash has not been derived")]
    MissingHash,
}

/// A user's secret: the derived hash, plus the plaintext while the request that set it is alive.
///
/// The plaintext never leaves memory; nothing in this type is serialized.
#[derive(Clone, Default)]
pub struct Password {
    plaintext: Option<String>,
    hash: Option<String>,
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("hash_set", &self.hash.is_some())
            .finish()
    }
}

impl Password {
    /// Credential loaded from the store
    pub fn from_hash(hash: String) -> Self {
        Self {
            plaintext: None,
            hash: Some(hash),
        }
    }

    /// Derive a salted Argon2id hash of `plaintext` and keep both.
    pub fn set(&mut self, plaintext: &str) -> Result<(), PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
            .to_string();

        self.plaintext = Some(plaintext.to_string());
        self.hash = Some(hash);
        Ok(())
    }

    /// Constant-time check of `plaintext` against the stored hash.
    ///
    /// A mismatch is `Ok(false)`; errors are reserved for unusable hashes.
    pub fn matches(&self, plaintext: &str) -> Result<bool, PasswordError> {
        let hash = self.hash()?;
        let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Verification(e.to_string())),
        }
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    /// The hash to persist. Asking before `set` or `from_hash` is a programming error.
    pub fn hash(&self) -> Result<&str, PasswordError> {
        self.hash.as_deref().ok_or(PasswordError::MissingHash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_matches() {
        let mut password = Password::default();
        password.set("correct horse battery").unwrap();

        assert!(password.matches("correct horse battery").unwrap());
        assert!(!password.matches("wrong horse battery").unwrap());
        assert_eq!(password.plaintext(), Some("correct horse battery"));
    }

    #[test]
    fn hashes_are_salted() {
        let mut first = Password::default();
        let mut second = Password::default();
        first.set("same secret").unwrap();
        second.set("same secret").unwrap();
        assert_ne!(first.hash().unwrap(), second.hash().unwrap());
    }

    #[test]
    fn unset_credential_has_no_hash() {
        let password = Password::default();
        assert!(matches!(password.hash(), Err(PasswordError::MissingHash)));
        assert!(matches!(password.matches("anything"), Err(PasswordError::MissingHash)));
    }

    #[test]
    fn garbage_hash_is_an_error_not_a_mismatch() {
        let password = Password::from_hash("not-a-phc-string".to_string());
        assert!(matches!(password.matches("x"), Err(PasswordError::InvalidHash(_))));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut password = Password::default();
        password.set("hunter22").unwrap();
        let rendered = format!("{:?}", password);
        assert!(!rendered.contains("hunter22"));
        assert!(!rendered.contains("argon2"));
    }
}
