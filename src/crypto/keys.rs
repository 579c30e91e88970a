use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::CryptoError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const KEY_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 32;

/// Password-derived key: zeroed on drop
#[derive(Zeroize)]
#[zeroize(drop)]
struct DerivedKey {
    key_bytes: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Derive from password + salt using PBKDF2-SHA256
    fn derive(password: &str, salt: &[u8], iterations: u32) -> Self {
        let mut key_bytes = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key_bytes);
        Self { key_bytes }
    }
}

/// Stored form of a password: `"{iterations}${base64 key}"` plus a base64 salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str, iterations: u32) -> PasswordHash {
    let salt = generate_salt();
    let key = DerivedKey::derive(password, &salt, iterations);
    PasswordHash {
        hash: format!("{iterations}${}", STANDARD.encode(&key.key_bytes)),
        salt: STANDARD.encode(salt),
    }
}

/// Check a password against its stored hash in constant time.
pub fn verify_password(password: &str, stored: &PasswordHash) -> Result<bool, CryptoError> {
    let (iterations, encoded) = stored
        .hash
        .split_once('$')
        .ok_or(CryptoError::MalformedHash)?;
    let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
    let expected = STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::MalformedHash)?;
    let salt = STANDARD
        .decode(&stored.salt)
        .map_err(|_| CryptoError::MalformedHash)?;

    let key = DerivedKey::derive(password, &salt, iterations);
    Ok(key.key_bytes[..].ct_eq(expected.as_slice()).into())
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn correct_password_verifies() {
        let stored = hash_password("correct horse", FAST);
        assert!(verify_password("correct horse", &stored).unwrap());
    }

    #[test]
    fn wrong_password_fails() {
        let stored = hash_password("correct horse", FAST);
        assert!(!verify_password("battery staple", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("password", FAST);
        let b = hash_password("password", FAST);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn iteration_count_is_recorded() {
        let stored = hash_password("password", FAST);
        assert!(stored.hash.starts_with("1000$"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let stored = PasswordHash {
            hash: "no-separator".into(),
            salt: "AAAA".into(),
        };
        assert!(matches!(
            verify_password("x", &stored),
            Err(CryptoError::MalformedHash)
        ));
    }

    #[test]
    fn generate_salt_is_random() {
        let s1 = generate_salt();
        let s2 = generate_salt();
        assert_ne!(s1, s2);
    }
}
