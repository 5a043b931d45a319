//! API-key hashing (§4.A).
//!
//! The authoritative check is always an Argon2id verify against the stored
//! PHC-format hash. A fast keyed hash (HMAC-SHA-256 over a per-installation
//! pepper) is provided separately for the hot-path lookup cache only — it
//! must never replace the slow check, only skip it on a cache hit for a
//! value that was already verified once.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Derive the Argon2id PHC-format hash for a plaintext API key. This is the
/// value persisted in `app_api_keys.key_hash` (§6.5).
pub fn hash_api_key(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| Error::Other(format!("argon2 hash: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a plaintext API key against its stored Argon2id hash. This is the
/// authoritative check (§4.A); always consulted regardless of fast-cache
/// outcome.
pub fn verify_api_key(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// Compute the fast keyed digest used only for the in-memory lookup cache
/// key (never persisted, never treated as authoritative).
pub fn fast_cache_key(plaintext: &str, pepper: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(pepper).expect("HMAC accepts any key length");
    mac.update(plaintext.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of two fast-cache keys, so a cache probe never
/// leaks timing information about how much of the key matched.
pub fn cache_keys_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hash = hash_api_key("sk_abcdefgh12345678").unwrap();
        assert!(verify_api_key("sk_abcdefgh12345678", &hash));
    }

    #[test]
    fn verify_rejects_wrong_plaintext() {
        let hash = hash_api_key("sk_correct0000000000").unwrap();
        assert!(!verify_api_key("sk_wrong00000000000", &hash));
    }

    #[test]
    fn hash_is_never_plaintext() {
        let hash = hash_api_key("sk_supersecretvalue12").unwrap();
        assert!(!hash.contains("sk_supersecretvalue12"));
    }

    #[test]
    fn fast_cache_key_is_deterministic() {
        let pepper = b"installation-pepper";
        let a = fast_cache_key("sk_abc", pepper);
        let b = fast_cache_key("sk_abc", pepper);
        assert_eq!(a, b);
        assert!(cache_keys_equal(&a, &b));
    }

    #[test]
    fn fast_cache_key_differs_per_pepper() {
        let a = fast_cache_key("sk_abc", b"pepper-one");
        let b = fast_cache_key("sk_abc", b"pepper-two");
        assert_ne!(a, b);
    }
}
