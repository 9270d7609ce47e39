//! Webhook dispatch for the conversational channel

pub mod dedup;
pub mod dispatcher;
pub mod phone;
pub mod sender;
pub mod signature;

pub use dedup::DedupCache;
pub use dispatcher::{DispatchOutcome, InboundMessage, WebhookDispatcher};
pub use sender::{MessageSender, VendorSender};
