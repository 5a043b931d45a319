//! Device-authorization polling handshake (§4.I), modeled loosely on
//! RFC 8628: `start` mints a device/user code pair, `complete` is called by
//! the authenticated browser-side page, `poll` is called by the waiting
//! CLI/SDK until it sees a terminal status.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use logsentry_core::model::{DeviceSession, DeviceSessionStatus};
use logsentry_core::{Error, Result};
use parking_lot::RwLock;
use rand::Rng;
use uuid::Uuid;

use crate::apikey::ApiKeyRegistry;

/// No vowels or look-alike characters, so a human reads the code over a
/// phone or types it without ambiguity (§4.I).
const USER_CODE_ALPHABET: &[u8] = b"BCDFGHJKLMNPQRSTVWXYZ";
const USER_CODE_LEN: usize = 8;

pub enum DevicePollOutcome {
    Pending,
    Expired,
    Consumed,
    Ok {
        api_key: String,
        app_id: Uuid,
    },
}

struct PollState {
    last_poll_at: Option<Instant>,
}

pub struct DeviceSessionStore {
    sessions: RwLock<HashMap<String, DeviceSession>>,
    user_code_index: RwLock<HashMap<String, String>>,
    poll_state: RwLock<HashMap<String, PollState>>,
    ttl: ChronoDuration,
    poll_interval: Duration,
}

impl DeviceSessionStore {
    pub fn new(ttl: ChronoDuration, poll_interval: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            user_code_index: RwLock::new(HashMap::new()),
            poll_state: RwLock::new(HashMap::new()),
            ttl,
            poll_interval,
        }
    }

    /// `POST /sdk/device/start` (§4.I).
    pub fn start(&self, app_name: String, description: Option<String>) -> DeviceSession {
        let device_code = random_base32_128bit();
        let user_code = random_user_code();
        let now = Utc::now();
        let session = DeviceSession {
            device_code: device_code.clone(),
            user_code: user_code.clone(),
            status: DeviceSessionStatus::Pending,
            app_name,
            description,
            user_id: None,
            app_id: None,
            api_key_plaintext: None,
            expires_at: now + self.ttl,
            created_at: now,
            approved_at: None,
        };
        self.sessions
            .write()
            .insert(device_code.clone(), session.clone());
        self.user_code_index.write().insert(user_code, device_code.clone());
        self.poll_state
            .write()
            .insert(device_code, PollState { last_poll_at: None });
        session
    }

    /// `POST /sdk/device/complete` (§4.I).
    pub fn complete(&self, registry: &ApiKeyRegistry, user_code: &str, user_id: &str) -> Result<Uuid> {
        let device_code = self
            .user_code_index
            .read()
            .get(user_code)
            .cloned()
            .ok_or_else(|| Error::NotFound("device session".into()))?;

        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&device_code)
            .ok_or_else(|| Error::NotFound("device session".into()))?;

        let now = Utc::now();
        if session.is_expired(now) {
            session.status = DeviceSessionStatus::Expired;
            return Err(Error::SessionExpired);
        }
        if session.status != DeviceSessionStatus::Pending {
            return Err(Error::NotFound("device session".into()));
        }

        let app = registry.get_or_create_app(user_id, &session.app_name);
        let plaintext = registry.mint_key(app.id)?;

        session.status = DeviceSessionStatus::Completed;
        session.user_id = Some(user_id.to_string());
        session.app_id = Some(app.id);
        session.api_key_plaintext = Some(plaintext);
        session.approved_at = Some(now);

        Ok(app.id)
    }

    /// `GET /sdk/device/poll?device_code=…` (§4.I). Idempotent except for
    /// the first successful read, which clears the plaintext atomically.
    pub fn poll(&self, device_code: &str) -> Result<DevicePollOutcome> {
        {
            let mut poll_state = self.poll_state.write();
            let state = poll_state
                .entry(device_code.to_string())
                .or_insert(PollState { last_poll_at: None });
            if let Some(last) = state.last_poll_at {
                if last.elapsed() < self.poll_interval {
                    return Err(Error::RateLimited);
                }
            }
            state.last_poll_at = Some(Instant::now());
        }

        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(device_code)
            .ok_or_else(|| Error::NotFound("device session".into()))?;

        let now = Utc::now();
        if session.is_expired(now) && session.status != DeviceSessionStatus::Completed {
            session.status = DeviceSessionStatus::Expired;
        }

        match session.status {
            DeviceSessionStatus::Pending | DeviceSessionStatus::Approved => {
                Ok(DevicePollOutcome::Pending)
            }
            DeviceSessionStatus::Expired | DeviceSessionStatus::Denied => {
                Ok(DevicePollOutcome::Expired)
            }
            DeviceSessionStatus::Completed => match session.api_key_plaintext.take() {
                Some(api_key) => {
                    let app_id = session.app_id.expect("completed session has app_id");
                    Ok(DevicePollOutcome::Ok { api_key, app_id })
                }
                None => Ok(DevicePollOutcome::Consumed),
            },
        }
    }

    /// Sweep sessions past `expires_at` (§5: janitor every 30 s). Returns the
    /// `user_code` of each session transitioned, for logging.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut swept = Vec::new();
        let mut sessions = self.sessions.write();
        for session in sessions.values_mut() {
            if session.status.can_transition_to(DeviceSessionStatus::Expired)
                && session.is_expired(now)
            {
                session.status = DeviceSessionStatus::Expired;
                swept.push(session.user_code.clone());
            }
        }
        swept
    }
}

fn random_user_code() -> String {
    let mut rng = rand::thread_rng();
    (0..USER_CODE_LEN)
        .map(|_| USER_CODE_ALPHABET[rng.gen_range(0..USER_CODE_ALPHABET.len())] as char)
        .collect()
}

fn random_base32_128bit() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DeviceSessionStore {
        DeviceSessionStore::new(ChronoDuration::seconds(600), Duration::from_secs(2))
    }

    #[test]
    fn user_code_uses_only_allowed_alphabet() {
        for _ in 0..50 {
            let code = random_user_code();
            assert_eq!(code.len(), USER_CODE_LEN);
            assert!(code.bytes().all(|b| USER_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn start_then_poll_is_pending() {
        let store = store();
        let session = store.start("my-app".into(), None);
        match store.poll(&session.device_code).unwrap() {
            DevicePollOutcome::Pending => {}
            _ => panic!("expected pending"),
        }
    }

    #[test]
    fn complete_then_poll_returns_key_once() {
        let store = store();
        let registry = ApiKeyRegistry::new(b"pepper".to_vec());
        let session = store.start("my-app".into(), None);

        store.complete(&registry, &session.user_code, "user-1").unwrap();

        match store.poll(&session.device_code).unwrap() {
            DevicePollOutcome::Ok { api_key, .. } => assert!(api_key.starts_with("sk_")),
            _ => panic!("expected ok on first read after completion"),
        }
    }

    #[test]
    fn second_poll_after_completion_is_consumed() {
        let store = store();
        let registry = ApiKeyRegistry::new(b"pepper".to_vec());
        let session = store.start("my-app".into(), None);
        store.complete(&registry, &session.user_code, "user-1").unwrap();

        let _ = store.poll(&session.device_code).unwrap();
        // Bypass the rate limiter for the purpose of this assertion.
        store
            .poll_state
            .write()
            .get_mut(&session.device_code)
            .unwrap()
            .last_poll_at = None;

        match store.poll(&session.device_code).unwrap() {
            DevicePollOutcome::Consumed => {}
            _ => panic!("expected consumed on second read"),
        }
    }

    #[test]
    fn complete_rejects_unknown_user_code() {
        let store = store();
        let registry = ApiKeyRegistry::new(b"pepper".to_vec());
        assert!(store.complete(&registry, "ZZZZZZZZ", "user-1").is_err());
    }

    #[test]
    fn sweep_expired_transitions_pending_sessions_past_ttl() {
        let store = DeviceSessionStore::new(ChronoDuration::seconds(-1), Duration::from_secs(2));
        let session = store.start("my-app".into(), None);
        let swept = store.sweep_expired(Utc::now());
        assert_eq!(swept, vec![session.user_code]);
    }
}
