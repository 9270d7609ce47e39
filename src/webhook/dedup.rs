//! Time-bounded deduplication of inbound message ids
//!
//! The messaging vendor delivers at-least-once; a second delivery of the
//! same `MessageSid` inside the window must not reach the state machine.

use crate::constants::DEDUP_TTL_SECS;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Remembers recently processed message ids for a fixed window
#[derive(Debug)]
pub struct DedupCache {
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(DEDUP_TTL_SECS))
    }
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Record a message id. Returns `true` the first time an id is seen
    /// inside the window, `false` on a duplicate delivery.
    pub fn check_and_insert(&self, message_sid: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        match seen.get(message_sid) {
            Some(_) => false,
            None => {
                seen.insert(message_sid.to_string(), now);
                true
            }
        }
    }

    /// Number of ids currently remembered.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
