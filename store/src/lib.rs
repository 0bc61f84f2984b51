//! SQLite persistence for Gavel.
//!
//! Every table is scoped by tenant. ROI versions, bids and audit events are
//! append-only and enforced by triggers; assets are never deleted.

mod error;
mod rows;
mod sqlite_util;
mod store;
mod tx;

pub use error::{Result, StoreError};
pub use sqlite_util::now_timestamp;
pub use store::{AuctionStore, StoreOptions, StoredAuditEvent};
pub use tx::StoreTx;
