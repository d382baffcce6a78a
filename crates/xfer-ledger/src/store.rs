//! # Ledger Store Port
//!
//! The record store the balance engine runs against. Reads are plain
//! lookups; the only balance write is conditional on the record's version.

use async_trait::async_trait;
use thiserror::Error;
use xfer_core::{AccountId, AccountReference, Amount, OrganizationId, WalletAddress};

use crate::record::{AccountRecord, OrganizationRecord};

/// Store-level failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection, pool or query failure.
    #[error("ledger store backend error: {0}")]
    Backend(String),

    /// A unique constraint was violated on insert.
    #[error("duplicate {0}")]
    Duplicate(String),

    /// An account insert referenced a missing organization.
    #[error("organization {0} does not exist")]
    MissingOrganization(OrganizationId),

    /// A stored row could not be mapped to a domain record.
    #[error("corrupt ledger row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Duplicate(db.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError>;

    /// Exact-match lookup by account reference.
    async fn find_account_by_reference(
        &self,
        reference: &AccountReference,
    ) -> Result<Option<AccountRecord>, StoreError>;

    async fn get_organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<OrganizationRecord>, StoreError>;

    /// Write `new_balance` only if the record is still at
    /// `expected_version`. Returns `false` when another writer got there
    /// first or the account no longer exists.
    async fn compare_and_swap_balance(
        &self,
        id: AccountId,
        expected_version: i64,
        new_balance: Amount,
    ) -> Result<bool, StoreError>;

    /// Onboarding: register an organization.
    async fn insert_organization(
        &self,
        name: &str,
        wallet_address: &WalletAddress,
    ) -> Result<OrganizationRecord, StoreError>;

    /// Onboarding: open an account with an opening balance.
    async fn insert_account(
        &self,
        organization_id: OrganizationId,
        reference: &AccountReference,
        balance: Amount,
    ) -> Result<AccountRecord, StoreError>;
}
