//! Password hashing using Argon2id
//!
//! Uses Argon2id, the recommended algorithm for password hashing.
//! Parameters come from [`crate::config::PasswordConfig`].

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::config::PasswordConfig;
use crate::error::Error;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Password hasher using Argon2id, parameterized by [`PasswordConfig`].
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(&PasswordConfig::default())
    }
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Self {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .expect("invalid argon2 parameters");

        Self { params }
    }

    /// Hashes `password`, rejecting anything shorter than [`MIN_PASSWORD_LENGTH`].
    pub fn hash(&self, password: &str) -> Result<String, Error> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("failed to hash password: {e}")))?;

        Ok(hash.to_string())
    }

    /// Verifies `password` against a PHC-format `hash` in constant time.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, Error> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Internal(format!("invalid password hash format: {e}")))?;

        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("password verification failed: {e}"))),
        }
    }

    /// Reports whether `hash` was produced with parameters other than this
    /// hasher's current ones, so callers can opportunistically rehash on login.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return true;
        };

        if parsed_hash.algorithm != argon2::Algorithm::Argon2id.ident() {
            return true;
        }

        let Some(version) = parsed_hash.version else {
            return true;
        };
        if version != 19 {
            return true;
        }

        let params = &parsed_hash.params;
        let m = params.iter().find(|(k, _)| k.as_str() == "m").and_then(|(_, v)| v.decimal().ok());
        let t = params.iter().find(|(k, _)| k.as_str() == "t").and_then(|(_, v)| v.decimal().ok());
        let p = params.iter().find(|(k, _)| k.as_str() == "p").and_then(|(_, v)| v.decimal().ok());

        m != Some(self.params.m_cost()) || t != Some(self.params.t_cost()) || p != Some(self.params.p_cost())
    }

    pub fn min_password_length(&self) -> usize {
        MIN_PASSWORD_LENGTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = PasswordHasher::default();
        let password = "test_password_123";

        let hash = hasher.hash(password).expect("hash failed");
        assert!(hash.starts_with("$argon2id$"));

        assert!(hasher.verify(password, &hash).unwrap());
        assert!(!hasher.verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn rejects_short_passwords() {
        let hasher = PasswordHasher::default();
        let result = hasher.hash("short1");

        match result {
            Err(Error::Validation(msg)) => assert!(msg.contains("8 characters")),
            _ => panic!("expected Validation error"),
        }
    }

    #[test]
    fn needs_rehash_flags_changed_params() {
        let hasher1 = PasswordHasher::new(&PasswordConfig {
            memory_kib: 32768,
            iterations: 2,
            parallelism: 1,
        });
        let hash = hasher1.hash("test_password_123").unwrap();

        let hasher2 = PasswordHasher::new(&PasswordConfig {
            memory_kib: 65536,
            iterations: 2,
            parallelism: 1,
        });

        assert!(hasher2.needs_rehash(&hash));
        assert!(!hasher1.needs_rehash(&hash));
    }

    #[test]
    fn invalid_hash_format_is_an_error() {
        let hasher = PasswordHasher::default();
        assert!(hasher.verify("password", "not_a_valid_hash").is_err());
    }

    #[test]
    fn same_password_yields_distinct_hashes() {
        let hasher = PasswordHasher::default();
        let password = "test_password_123";

        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify(password, &hash1).unwrap());
        assert!(hasher.verify(password, &hash2).unwrap());
    }
}
