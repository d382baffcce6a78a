//! # PostgreSQL Ledger Store
//!
//! [`LedgerStore`] over a `PgPool`. Queries are runtime-checked
//! (`sqlx::query` / `query_as` with binds) so the crate builds without a
//! live database. Balances are stored as `BIGINT` minor units.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use xfer_core::{AccountId, AccountReference, Amount, OrganizationId, WalletAddress};

use crate::record::{AccountRecord, OrganizationRecord};
use crate::store::{LedgerStore, StoreError};

/// Foreign-key violation SQLSTATE.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, then apply embedded migrations.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        tracing::info!("Connected to PostgreSQL");

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Ledger migrations applied");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    organization_id: i64,
    reference: String,
    balance: i64,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_record(self) -> Result<AccountRecord, StoreError> {
        let corrupt = |e: &dyn std::fmt::Display| StoreError::Corrupt(format!("account {}: {e}", self.id));
        Ok(AccountRecord {
            id: AccountId::new(self.id).map_err(|e| corrupt(&e))?,
            organization_id: OrganizationId::new(self.organization_id).map_err(|e| corrupt(&e))?,
            reference: AccountReference::new(self.reference.clone()).map_err(|e| corrupt(&e))?,
            balance: Amount::from_minor(self.balance).map_err(|e| corrupt(&e))?,
            version: self.version,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    id: i64,
    name: String,
    wallet_address: String,
}

impl OrganizationRow {
    fn into_record(self) -> Result<OrganizationRecord, StoreError> {
        let corrupt = |e: &dyn std::fmt::Display| StoreError::Corrupt(format!("organization {}: {e}", self.id));
        Ok(OrganizationRecord {
            id: OrganizationId::new(self.id).map_err(|e| corrupt(&e))?,
            name: self.name.clone(),
            wallet_address: WalletAddress::parse(&self.wallet_address).map_err(|e| corrupt(&e))?,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "id, organization_id, reference, balance, version, updated_at";

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(AccountRow::into_record).transpose()
    }

    async fn find_account_by_reference(
        &self,
        reference: &AccountReference,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE reference = $1"
        ))
        .bind(reference.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(AccountRow::into_record).transpose()
    }

    async fn get_organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<OrganizationRecord>, StoreError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, wallet_address FROM organizations WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(OrganizationRow::into_record).transpose()
    }

    async fn compare_and_swap_balance(
        &self,
        id: AccountId,
        expected_version: i64,
        new_balance: Amount,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE accounts SET balance = $1, version = version + 1, updated_at = now()
             WHERE id = $2 AND version = $3",
        )
        .bind(new_balance.minor_units())
        .bind(id.get())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_organization(
        &self,
        name: &str,
        wallet_address: &WalletAddress,
    ) -> Result<OrganizationRecord, StoreError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "INSERT INTO organizations (name, wallet_address) VALUES ($1, $2)
             RETURNING id, name, wallet_address",
        )
        .bind(name)
        .bind(wallet_address.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.into_record()
    }

    async fn insert_account(
        &self,
        organization_id: OrganizationId,
        reference: &AccountReference,
        balance: Amount,
    ) -> Result<AccountRecord, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO accounts (organization_id, reference, balance) VALUES ($1, $2, $3)
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(organization_id.get())
        .bind(reference.as_str())
        .bind(balance.minor_units())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                StoreError::MissingOrganization(organization_id)
            }
            _ => StoreError::from(e),
        })?;
        row.into_record()
    }
}
