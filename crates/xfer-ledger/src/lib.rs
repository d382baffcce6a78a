//! # xfer-ledger — Account Balances Under Optimistic Locking
//!
//! Owns every mutation of account balances. The [`LedgerStore`] port is a
//! narrow record store with a single conditional write
//! ([`LedgerStore::compare_and_swap_balance`]); the
//! [`BalanceLedgerEngine`] builds the debit-then-credit transfer on top of
//! it with bounded retries.
//!
//! Two store implementations ship here:
//!
//! - [`InMemoryLedgerStore`] for development and tests.
//! - [`PgLedgerStore`] for PostgreSQL via SQLx, with embedded migrations.
//!
//! No lock is held across requests. Concurrent transfers touching the same
//! account race on the record's `version` and the loser retries.

pub mod engine;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use engine::{
    BalanceLedgerEngine, LedgerError, LedgerSide, LedgerTransfer, RetryPolicy, WriteState,
};
pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use record::{AccountRecord, OrganizationRecord};
pub use store::{LedgerStore, StoreError};
