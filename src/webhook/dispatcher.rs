//! Inbound webhook dispatch
//!
//! The HTTP shell hands every callback here. Validation and deduplication
//! happen synchronously so the caller can acknowledge the delivery at once;
//! the conversation itself runs on a spawned task. Processing errors never
//! propagate to the vendor: the client gets the generic error text and the
//! delivery is acknowledged either way.

use crate::chat::{SessionHandler, SessionManager};
use crate::engine::TradingEngine;
use crate::error::BrokerError;
use crate::market::MarketDataService;
use crate::model::Account;
use crate::webhook::dedup::DedupCache;
use crate::webhook::phone;
use crate::webhook::sender::MessageSender;
use crate::chat::format;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// One vendor callback, as decoded by the HTTP shell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message text
    pub body: String,
    /// Sender, e.g. `whatsapp:+971501234567`
    pub from: String,
    /// Vendor-unique delivery id, the deduplication key
    pub message_sid: String,
    /// Sender display name, when the vendor shares it
    pub profile_name: Option<String>,
}

/// What the HTTP shell should answer immediately
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivery acknowledged; the reply goes out asynchronously
    Accepted,
    /// Same `MessageSid` seen inside the window; answer with an empty body
    Duplicate,
    /// Required fields missing
    Rejected(String),
}

struct DispatcherShared {
    engine: Arc<TradingEngine>,
    handler: SessionHandler,
    sessions: SessionManager,
    sender: Arc<dyn MessageSender>,
    dedup: DedupCache,
    country_prefix: String,
}

/// Authorizes, sessionizes and answers vendor callbacks
#[derive(Clone)]
pub struct WebhookDispatcher {
    shared: Arc<DispatcherShared>,
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher").finish()
    }
}

impl WebhookDispatcher {
    pub fn new(
        engine: Arc<TradingEngine>,
        market: Arc<MarketDataService>,
        sender: Arc<dyn MessageSender>,
        country_prefix: impl Into<String>,
    ) -> Self {
        Self {
            shared: Arc::new(DispatcherShared {
                handler: SessionHandler::new(Arc::clone(&engine), market),
                engine,
                sessions: SessionManager::new(),
                sender,
                dedup: DedupCache::new(),
                country_prefix: country_prefix.into(),
            }),
        }
    }

    /// Take one callback. Returns as soon as the delivery can be
    /// acknowledged; the conversation continues on a background task.
    pub fn handle(&self, message: InboundMessage) -> DispatchOutcome {
        if message.from.trim().is_empty() || message.message_sid.trim().is_empty() {
            return DispatchOutcome::Rejected("From and MessageSid are required".into());
        }

        if !self.shared.dedup.check_and_insert(&message.message_sid) {
            info!("duplicate delivery {} dropped", message.message_sid);
            return DispatchOutcome::Duplicate;
        }

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            process(shared, message).await;
        });
        DispatchOutcome::Accepted
    }

    /// Process a callback to completion; tests use this to avoid racing the
    /// spawned task.
    pub async fn handle_sync(&self, message: InboundMessage) -> DispatchOutcome {
        if message.from.trim().is_empty() || message.message_sid.trim().is_empty() {
            return DispatchOutcome::Rejected("From and MessageSid are required".into());
        }
        if !self.shared.dedup.check_and_insert(&message.message_sid) {
            info!("duplicate delivery {} dropped", message.message_sid);
            return DispatchOutcome::Duplicate;
        }
        process(Arc::clone(&self.shared), message).await;
        DispatchOutcome::Accepted
    }

    /// Resolve an inbound sender to the account it may act for.
    ///
    /// An unknown number and a registered number whose account may not
    /// trade over chat are both `Unauthorized`; the caller decides how to
    /// word the refusal.
    pub fn authorize_sender(&self, from: &str) -> Result<Account, BrokerError> {
        authorize(&self.shared, from)
    }
}

fn authorize(shared: &DispatcherShared, from: &str) -> Result<Account, BrokerError> {
    let account = shared
        .engine
        .store()
        .find_account_by_phone(|stored| phone::matches(stored, from, &shared.country_prefix))
        .ok_or_else(|| {
            BrokerError::Unauthorized(format!("phone {from} is not registered for trading"))
        })?;
    if !account.can_chat() {
        return Err(BrokerError::Unauthorized(format!(
            "account {} may not trade over chat",
            account.id
        )));
    }
    Ok(account)
}

async fn process(shared: Arc<DispatcherShared>, message: InboundMessage) {
    let account = match authorize(&shared, &message.from) {
        Ok(account) => account,
        Err(err) => {
            warn!("webhook refused: {err}");
            deliver(&shared, &message.from, &format::access_denied(), None).await;
            return;
        }
    };

    let phone_key = phone::normalize(&message.from);
    let mut session = shared
        .sessions
        .load(&phone_key, &account.id, message.profile_name.as_deref())
        .await;

    let reply = shared.handler.handle(&mut session, &message.body).await;
    shared.sessions.save(session).await;

    deliver(
        &shared,
        &message.from,
        &reply.text,
        reply.related_order.as_deref(),
    )
    .await;
}

/// Send a reply; a failure is logged and annotated on the related order,
/// never bubbled, because the engine transaction already committed.
async fn deliver(
    shared: &DispatcherShared,
    to: &str,
    text: &str,
    related_order: Option<&str>,
) {
    if let Err(err) = shared.sender.send(to, text).await {
        warn!("reply to {to} failed: {err}");
        if let Some(order_id) = related_order {
            let order_key = order_id.to_string();
            let note = err.to_string();
            let result = shared.engine.store().transaction(move |state| {
                if let Some(order) = state.orders.get_mut(&order_key) {
                    order.notification_error = Some(note);
                }
                Ok(())
            });
            if let Err(store_err) = result {
                warn!("failed to annotate order {order_id}: {store_err}");
            }
        }
    }
}
