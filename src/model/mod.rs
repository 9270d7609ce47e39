//! Data model for the brokerage engine

pub mod account;
pub mod ledger;
pub mod lp_position;
pub mod order;
pub mod session;
pub mod transaction;

pub use account::{Account, AccountStatus, AccountUpdate, NewAccount};
pub use ledger::{
    AssetKind, EntryDetails, EntryNature, EntryType, LedgerEntry, LpDetails, OrderDetails,
    TransactionDetails,
};
pub use lp_position::{LpPosition, PositionStatus};
pub use order::{Order, OrderSide, OrderStatus, OrderUpdate};
pub use session::{ChatSession, ChatState, OpenOrderRef, PendingOrder, VenuePositionRef};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
