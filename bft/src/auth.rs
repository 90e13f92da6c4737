//! HMAC-SHA256 message authentication over a canonical (sorted-key) JSON
//! serialisation of `{message, nonce, timestamp}`, with nonce-replay and
//! timestamp-freshness checks.

use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::{HashSet, VecDeque};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const MAX_TRACKED_NONCES: usize = 10_000;
const PRUNE_TO: usize = 5_000;
const CLOCK_SKEW_ALLOWANCE_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedMessage {
    pub message: serde_json::Value,
    pub mac: String,
    pub nonce: String,
    pub timestamp: f64,
}

/// Recursively sorts object keys so the JSON text is identical regardless
/// of insertion order, matching `json.dumps(..., sort_keys=True)`.
fn canonical_json(value: &serde_json::Value) -> String {
    fn sorted(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let ordered: std::collections::BTreeMap<String, serde_json::Value> = map.iter().map(|(k, v)| (k.clone(), sorted(v))).collect();
                serde_json::to_value(ordered).expect("BTreeMap<String, Value> always serializes")
            }
            serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string(&sorted(value)).expect("canonicalized value always serializes")
}

fn mac_for(secret_key: &[u8], message: &serde_json::Value, nonce: &str, timestamp: f64) -> String {
    let envelope = serde_json::json!({ "message": message, "nonce": nonce, "timestamp": timestamp });
    let msg_data = canonical_json(&envelope);
    let mut mac = HmacSha256::new_from_slice(secret_key).expect("HMAC accepts any key length");
    mac.update(msg_data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Tracks nonces seen so far to reject replays, pruning to the most recent
/// half once the tracked set exceeds 10,000 entries.
#[derive(Default)]
pub struct NonceTracker {
    seen: Mutex<(VecDeque<String>, HashSet<String>)>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn contains(&self, nonce: &str) -> bool {
        self.seen.lock().1.contains(nonce)
    }

    fn record(&self, nonce: &str) {
        let mut guard = self.seen.lock();
        guard.0.push_back(nonce.to_string());
        guard.1.insert(nonce.to_string());
        if guard.1.len() > MAX_TRACKED_NONCES {
            let excess = guard.0.len() - PRUNE_TO;
            for _ in 0..excess {
                if let Some(old) = guard.0.pop_front() {
                    guard.1.remove(&old);
                }
            }
        }
    }
}

fn now_unix_seconds() -> f64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).expect("system clock before epoch").as_secs_f64()
}

/// Wraps `message` with a fresh nonce, the current timestamp, and an
/// HMAC-SHA256 MAC over the canonical envelope.
pub fn create_authenticated_message(secret_key: &[u8], message: serde_json::Value) -> AuthenticatedMessage {
    let mut nonce_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);
    let timestamp = now_unix_seconds();
    let mac = mac_for(secret_key, &message, &nonce, timestamp);
    AuthenticatedMessage { message, mac, nonce, timestamp }
}

/// Verifies `auth_message` against replay, freshness and MAC, recording the
/// nonce as used on success or on any non-replay rejection (matching the
/// original, which only short-circuits before recording on replay itself).
pub fn verify_authenticated_message(secret_key: &[u8], tracker: &NonceTracker, message_validity_window_seconds: f64, auth_message: &AuthenticatedMessage) -> Result<(), String> {
    if tracker.contains(&auth_message.nonce) {
        return Err("replay attack detected: nonce already used".to_string());
    }

    let age = now_unix_seconds() - auth_message.timestamp;
    if age > message_validity_window_seconds {
        return Err(format!("message too old: {age:.1}s"));
    }
    if age < -CLOCK_SKEW_ALLOWANCE_SECONDS {
        return Err(format!("message from future: {:.1}s", -age));
    }

    let expected_mac = mac_for(secret_key, &auth_message.message, &auth_message.nonce, auth_message.timestamp);
    let valid = expected_mac.len() == auth_message.mac.len() && bool::from(expected_mac.as_bytes().ct_eq(auth_message.mac.as_bytes()));
    if !valid {
        return Err("invalid MAC: message tampered".to_string());
    }

    tracker.record(&auth_message.nonce);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_matching_key() {
        let key = b"shared-secret";
        let tracker = NonceTracker::new();
        let auth = create_authenticated_message(key, serde_json::json!({"kind": "vote", "value": "approve"}));
        assert!(verify_authenticated_message(key, &tracker, 60.0, &auth).is_ok());
    }

    #[test]
    fn rejects_tampered_mac() {
        let key = b"shared-secret";
        let tracker = NonceTracker::new();
        let mut auth = create_authenticated_message(key, serde_json::json!({"kind": "vote"}));
        auth.message = serde_json::json!({"kind": "tampered"});
        assert!(verify_authenticated_message(key, &tracker, 60.0, &auth).is_err());
    }

    #[test]
    fn rejects_replayed_nonce() {
        let key = b"shared-secret";
        let tracker = NonceTracker::new();
        let auth = create_authenticated_message(key, serde_json::json!({"kind": "vote"}));
        assert!(verify_authenticated_message(key, &tracker, 60.0, &auth).is_ok());
        assert!(verify_authenticated_message(key, &tracker, 60.0, &auth).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let key = b"shared-secret";
        let tracker = NonceTracker::new();
        let mut auth = create_authenticated_message(key, serde_json::json!({"kind": "vote"}));
        auth.timestamp -= 120.0;
        auth.mac = mac_for(key, &auth.message, &auth.nonce, auth.timestamp);
        assert!(verify_authenticated_message(key, &tracker, 60.0, &auth).is_err());
    }

    #[test]
    fn canonical_json_is_key_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }
}
