//! Configuration module for the brokerage engine

mod base;
mod credentials;

pub use base::{AppConfig, MarginPolicy};
pub use credentials::{Mt5Credentials, VendorCredentials};
