//! # In-Memory Ledger Store
//!
//! A [`LedgerStore`] backed by `HashMap`s for development and tests.
//!
//! All operations are synchronous under a `parking_lot::RwLock` that is
//! never held across an `.await`. The conditional write checks the version
//! and applies the new balance under one write guard, so it has the same
//! compare-and-swap semantics as the SQL `UPDATE ... WHERE version = $n`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use xfer_core::{AccountId, AccountReference, Amount, OrganizationId, WalletAddress};

use crate::record::{AccountRecord, OrganizationRecord};
use crate::store::{LedgerStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    organizations: HashMap<OrganizationId, OrganizationRecord>,
    accounts: HashMap<AccountId, AccountRecord>,
    next_organization_id: i64,
    next_account_id: i64,
}

/// Cloneable handle to a shared in-memory ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all account balances in minor units.
    pub fn total_balance(&self) -> i64 {
        self.tables
            .read()
            .accounts
            .values()
            .map(|a| a.balance.minor_units())
            .sum()
    }

    /// Snapshot of every account.
    pub fn accounts(&self) -> Vec<AccountRecord> {
        let mut all: Vec<_> = self.tables.read().accounts.values().cloned().collect();
        all.sort_by_key(|a| a.id);
        all
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.tables.read().accounts.get(&id).cloned())
    }

    async fn find_account_by_reference(
        &self,
        reference: &AccountReference,
    ) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .accounts
            .values()
            .find(|a| &a.reference == reference)
            .cloned())
    }

    async fn get_organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<OrganizationRecord>, StoreError> {
        Ok(self.tables.read().organizations.get(&id).cloned())
    }

    async fn compare_and_swap_balance(
        &self,
        id: AccountId,
        expected_version: i64,
        new_balance: Amount,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        match tables.accounts.get_mut(&id) {
            Some(account) if account.version == expected_version => {
                account.balance = new_balance;
                account.version += 1;
                account.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_organization(
        &self,
        name: &str,
        wallet_address: &WalletAddress,
    ) -> Result<OrganizationRecord, StoreError> {
        let mut tables = self.tables.write();
        if tables
            .organizations
            .values()
            .any(|o| &o.wallet_address == wallet_address)
        {
            return Err(StoreError::Duplicate(format!(
                "organization wallet {wallet_address}"
            )));
        }
        tables.next_organization_id += 1;
        let id = OrganizationId::new(tables.next_organization_id)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let record = OrganizationRecord {
            id,
            name: name.to_string(),
            wallet_address: wallet_address.clone(),
        };
        tables.organizations.insert(id, record.clone());
        Ok(record)
    }

    async fn insert_account(
        &self,
        organization_id: OrganizationId,
        reference: &AccountReference,
        balance: Amount,
    ) -> Result<AccountRecord, StoreError> {
        let mut tables = self.tables.write();
        if !tables.organizations.contains_key(&organization_id) {
            return Err(StoreError::MissingOrganization(organization_id));
        }
        if tables.accounts.values().any(|a| &a.reference == reference) {
            return Err(StoreError::Duplicate(format!("account reference {reference}")));
        }
        tables.next_account_id += 1;
        let id = AccountId::new(tables.next_account_id)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let record = AccountRecord {
            id,
            organization_id,
            reference: reference.clone(),
            balance,
            version: 0,
            updated_at: Utc::now(),
        };
        tables.accounts.insert(id, record.clone());
        Ok(record)
    }
}
