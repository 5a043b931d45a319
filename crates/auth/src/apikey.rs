//! API-key minting, lookup, and revocation (§4.A, §4.I, §5).
//!
//! The authoritative check is always an Argon2id verify against the stored
//! hash (`logsentry_core::keyhash::verify_api_key`); nothing here ever
//! trusts the fast index on its own. The fast index exists purely because an
//! Argon2id hash cannot be reversed to find which app a candidate plaintext
//! belongs to — it is populated at mint time, when the plaintext is still in
//! hand, and consulted only to narrow the authoritative check down to a
//! single stored hash instead of scanning every key in the registry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use logsentry_core::keyhash::{fast_cache_key, hash_api_key, verify_api_key};
use logsentry_core::model::{App, ApiKey};
use logsentry_core::{Error, Result};
use parking_lot::RwLock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// How long a failed lookup is cached before the fast index is consulted
/// again for the same candidate (§5, shared resources).
const NEGATIVE_CACHE_TTL: Duration = Duration::from_secs(5);

struct FastIndexEntry {
    app_id: Uuid,
    key_hash: String,
}

/// In-process registry of apps and their API keys, indexed for O(1)
/// candidate lookup at ingest time.
pub struct ApiKeyRegistry {
    pepper: Vec<u8>,
    apps: RwLock<HashMap<Uuid, App>>,
    apps_by_owner_name: RwLock<HashMap<(String, String), Uuid>>,
    keys_by_app: RwLock<HashMap<Uuid, Vec<ApiKey>>>,
    fast_index: RwLock<HashMap<String, FastIndexEntry>>,
    /// `key_hash -> fast_key`, so revocation can retract the fast-index entry
    /// without the plaintext in hand.
    hash_to_fast_key: RwLock<HashMap<String, String>>,
    negative_cache: RwLock<HashMap<String, Instant>>,
}

impl ApiKeyRegistry {
    pub fn new(pepper: Vec<u8>) -> Self {
        Self {
            pepper,
            apps: RwLock::new(HashMap::new()),
            apps_by_owner_name: RwLock::new(HashMap::new()),
            keys_by_app: RwLock::new(HashMap::new()),
            fast_index: RwLock::new(HashMap::new()),
            hash_to_fast_key: RwLock::new(HashMap::new()),
            negative_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the owner's app by name. Names are unique per owner;
    /// a name collision reuses the existing app (§4.I step 2).
    pub fn get_or_create_app(&self, owner_id: &str, app_name: &str) -> App {
        let key = (owner_id.to_string(), app_name.to_string());
        if let Some(&id) = self.apps_by_owner_name.read().get(&key) {
            return self.apps.read()[&id].clone();
        }
        let app = App {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: app_name.to_string(),
            created_at: Utc::now(),
        };
        self.apps.write().insert(app.id, app.clone());
        self.apps_by_owner_name.write().insert(key, app.id);
        app
    }

    pub fn get_app(&self, app_id: Uuid) -> Option<App> {
        self.apps.read().get(&app_id).cloned()
    }

    /// Mint a new key for `app_id`. Returns the plaintext once; only the
    /// Argon2id hash is retained afterward (§4.I step 3).
    pub fn mint_key(&self, app_id: Uuid) -> Result<String> {
        let plaintext = format!("sk_{}", random_url_safe(32));
        let key_hash = hash_api_key(&plaintext)?;
        let record = ApiKey {
            app_id,
            key_hash: key_hash.clone(),
            created_at: Utc::now(),
            revoked_at: None,
        };
        self.keys_by_app
            .write()
            .entry(app_id)
            .or_default()
            .push(record);

        let fast_key = fast_cache_key(&plaintext, &self.pepper);
        self.hash_to_fast_key
            .write()
            .insert(key_hash.clone(), fast_key.clone());
        self.fast_index
            .write()
            .insert(fast_key, FastIndexEntry { app_id, key_hash });

        Ok(plaintext)
    }

    /// Resolve a candidate plaintext to its owning `app_id`. Always performs
    /// the authoritative Argon2id verify before returning success (§4.A,
    /// §4.G step 2).
    pub fn lookup(&self, plaintext: &str) -> Result<Uuid> {
        let fast_key = fast_cache_key(plaintext, &self.pepper);

        if let Some(seen_at) = self.negative_cache.read().get(&fast_key) {
            if seen_at.elapsed() < NEGATIVE_CACHE_TTL {
                return Err(Error::Unauthorized);
            }
        }

        let candidate = self.fast_index.read().get(&fast_key).map(|entry| {
            (entry.app_id, entry.key_hash.clone())
        });

        let Some((app_id, key_hash)) = candidate else {
            self.negative_cache.write().insert(fast_key, Instant::now());
            return Err(Error::Unauthorized);
        };

        if !verify_api_key(plaintext, &key_hash) {
            self.negative_cache.write().insert(fast_key, Instant::now());
            return Err(Error::Unauthorized);
        }

        let active = self
            .keys_by_app
            .read()
            .get(&app_id)
            .map(|keys| keys.iter().any(|k| k.key_hash == key_hash && k.is_active()))
            .unwrap_or(false);

        if !active {
            self.negative_cache.write().insert(fast_key, Instant::now());
            return Err(Error::Unauthorized);
        }

        Ok(app_id)
    }

    /// Revoke every active key belonging to `app_id`. Revoked keys remain in
    /// `keys_by_app` for audit but are pulled from the fast index so a
    /// subsequent `lookup` falls through to the negative path.
    pub fn revoke_all(&self, app_id: Uuid) {
        let mut keys_by_app = self.keys_by_app.write();
        let Some(keys) = keys_by_app.get_mut(&app_id) else {
            return;
        };
        let now = Utc::now();
        let mut hash_to_fast_key = self.hash_to_fast_key.write();
        let mut fast_index = self.fast_index.write();
        for key in keys.iter_mut().filter(|k| k.is_active()) {
            key.revoked_at = Some(now);
            if let Some(fast_key) = hash_to_fast_key.remove(&key.key_hash) {
                fast_index.remove(&fast_key);
            }
        }
    }
}

fn random_url_safe(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ApiKeyRegistry {
        ApiKeyRegistry::new(b"test-pepper".to_vec())
    }

    #[test]
    fn mint_then_lookup_resolves_app_id() {
        let reg = registry();
        let app = reg.get_or_create_app("owner-1", "my-service");
        let plaintext = reg.mint_key(app.id).unwrap();
        assert_eq!(reg.lookup(&plaintext).unwrap(), app.id);
    }

    #[test]
    fn lookup_rejects_unknown_key() {
        let reg = registry();
        assert!(reg.lookup("sk_does_not_exist").is_err());
    }

    #[test]
    fn get_or_create_app_reuses_name_collision() {
        let reg = registry();
        let first = reg.get_or_create_app("owner-1", "my-service");
        let second = reg.get_or_create_app("owner-1", "my-service");
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn different_owners_get_different_apps_for_same_name() {
        let reg = registry();
        let a = reg.get_or_create_app("owner-1", "shared-name");
        let b = reg.get_or_create_app("owner-2", "shared-name");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn revoked_key_no_longer_resolves() {
        let reg = registry();
        let app = reg.get_or_create_app("owner-1", "my-service");
        let plaintext = reg.mint_key(app.id).unwrap();
        reg.revoke_all(app.id);
        assert!(reg.lookup(&plaintext).is_err());
    }

    #[test]
    fn minted_key_has_sk_prefix() {
        let reg = registry();
        let app = reg.get_or_create_app("owner-1", "my-service");
        let plaintext = reg.mint_key(app.id).unwrap();
        assert!(plaintext.starts_with("sk_"));
    }
}
