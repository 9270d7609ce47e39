//! Conversational trading over the messaging channel

pub mod commands;
pub mod format;
pub mod session;

pub use commands::{CloseTarget, Command};
pub use session::{Reply, SessionHandler};

use crate::constants::SESSION_TTL_SECS;
use crate::model::ChatSession;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Holds one session per phone and evicts idle ones.
///
/// Each phone's traffic is sequential, so load/save with a clone is enough;
/// there is no cross-phone contention on a session.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, ChatSession>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the session for a phone, creating it lazily. Idle sessions past
    /// the TTL are dropped on the way in.
    pub async fn load(
        &self,
        phone: &str,
        account_id: &str,
        user_name: Option<&str>,
    ) -> ChatSession {
        let mut sessions = self.sessions.lock().await;
        let horizon = Utc::now() - Duration::seconds(SESSION_TTL_SECS as i64);
        sessions.retain(|_, session| session.last_activity > horizon);

        match sessions.get(phone) {
            Some(session) if session.account_id == account_id => session.clone(),
            _ => {
                let mut session = ChatSession::new(phone, account_id);
                session.user_name = user_name.map(str::to_string);
                sessions.insert(phone.to_string(), session.clone());
                session
            }
        }
    }

    /// Persist the session after a handled message.
    pub async fn save(&self, session: ChatSession) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.phone.clone(), session);
    }

    /// Number of live sessions, for diagnostics.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
