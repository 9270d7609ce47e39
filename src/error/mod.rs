//! Error handling module for the brokerage engine

use crate::bridge::protocol::retcode_message;
use crate::constants::retcode;

/// Brokerage engine error types
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Config error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced account, order or position does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not allowed to touch the referenced record
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request failed validation before reaching the venue
    #[error("Validation error: {0}")]
    Validation(String),

    /// Account balance cannot cover the requested amount
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Venue rejected or failed the request
    #[error("Upstream error ({retcode}): {message}")]
    Upstream {
        /// Venue retcode, 0 when the failure happened before a retcode was produced
        retcode: u32,
        /// Human-readable failure description
        message: String,
    },

    /// Write collides with an existing unique record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bridge request timed out waiting for the venue
    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    /// Anything the other kinds do not cover
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// Build an `Upstream` error from a venue retcode using the standard message table.
    pub fn from_retcode(code: u32) -> Self {
        Self::Upstream {
            retcode: code,
            message: retcode_message(code).to_string(),
        }
    }

    /// Whether a bridge-layer retry with a widened deviation might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Upstream {
                retcode: retcode::PRICE_CHANGED | retcode::INVALID_REQUEST,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {value}"))
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(value: std::io::Error) -> Self {
        Self::Internal(format!("I/O error: {value}"))
    }
}
