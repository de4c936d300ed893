//! Affiliate ledger: binary-tree affiliate placement and multi-level
//! commission accounting.
//!
//! Affiliates sell with a coupon code. Confirmed orders credit the seller and
//! up to three ancestors in a binary placement tree, every credit recorded as
//! an append-only ledger entry. Cached balances are a projection of that
//! ledger; a resync job rebuilds them from scratch.

pub mod config;
pub mod error;
pub mod facade;
pub mod interfaces;
pub mod model;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::ErrorKind;
pub use facade::{AffiliateLedger, AffiliateLedgerBuilder, LedgerError};
