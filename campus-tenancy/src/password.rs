// Password policy, hashing and verification

use crate::{Result, TenancyError};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
    },
};
use serde::{Deserialize, Serialize};

/// Minimum strength rules for account passwords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Minimum number of characters
    pub min_length: usize,
    /// Require at least one ASCII digit
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digit: false,
        }
    }
}

impl PasswordPolicy {
    /// Check a plaintext password against the policy.
    pub fn check(&self, password: &str) -> Result<()> {
        if password.trim().is_empty() {
            return Err(TenancyError::InvalidCredentials(
                "password must not be blank".to_string(),
            ));
        }
        if password.chars().count() < self.min_length {
            return Err(TenancyError::InvalidCredentials(format!(
                "password must be at least {} characters long",
                self.min_length
            )));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(TenancyError::InvalidCredentials(
                "password must contain at least one digit".to_string(),
            ));
        }
        Ok(())
    }
}

/// Password hashing algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// Bcrypt
    Bcrypt,
    /// Argon2id
    #[default]
    Argon2,
}

/// Hashes new passwords and verifies stored hashes of either algorithm.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    algorithm: HashAlgorithm,
}

impl PasswordHasher {
    /// Create a hasher producing hashes with `algorithm`.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String> {
        match self.algorithm {
            HashAlgorithm::Bcrypt => bcrypt::hash(password, bcrypt::DEFAULT_COST)
                .map_err(|e| TenancyError::Storage(format!("password hashing failed: {}", e))),
            HashAlgorithm::Argon2 => {
                let salt = SaltString::generate(&mut OsRng);
                Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map(|hash| hash.to_string())
                    .map_err(|e| TenancyError::Storage(format!("password hashing failed: {}", e)))
            }
        }
    }

    /// Verify a password against a stored hash, detecting the algorithm
    /// from the hash prefix.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        if hash.starts_with("$2") {
            bcrypt::verify(password, hash)
                .map_err(|e| TenancyError::Storage(format!("password verification failed: {}", e)))
        } else if hash.starts_with("$argon2") {
            let parsed = PasswordHash::new(hash)
                .map_err(|e| TenancyError::Storage(format!("malformed password hash: {}", e)))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        } else {
            Err(TenancyError::Storage("unknown password hash format".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_min_length() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("admin@123").is_ok());
        assert!(matches!(
            policy.check("short"),
            Err(TenancyError::InvalidCredentials(_))
        ));
        assert!(policy.check("        ").is_err());
    }

    #[test]
    fn test_policy_digit() {
        let policy = PasswordPolicy {
            min_length: 4,
            require_digit: true,
        };
        assert!(policy.check("abcdef").is_err());
        assert!(policy.check("abcde1").is_ok());
    }

    #[test]
    fn test_argon2_roundtrip() {
        let hasher = PasswordHasher::new(HashAlgorithm::Argon2);
        let hash = hasher.hash("admin@123").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify("admin@123", &hash).unwrap());
        assert!(!hasher.verify("admin@124", &hash).unwrap());
    }

    #[test]
    fn test_verify_detects_bcrypt() {
        let bcrypt_hash = PasswordHasher::new(HashAlgorithm::Bcrypt)
            .hash("admin@123")
            .unwrap();

        let verifier = PasswordHasher::default();
        assert!(verifier.verify("admin@123", &bcrypt_hash).unwrap());
    }

    #[test]
    fn test_unknown_hash_format() {
        let hasher = PasswordHasher::default();
        assert!(hasher.verify("admin@123", "plaintext").is_err());
    }
}
