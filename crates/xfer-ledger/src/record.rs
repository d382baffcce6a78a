//! Persisted record shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xfer_core::{AccountId, AccountReference, Amount, OrganizationId, WalletAddress};

/// One user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub organization_id: OrganizationId,
    pub reference: AccountReference,
    pub balance: Amount,
    /// Optimistic-locking token. Incremented on every balance write.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// An organization and its chain wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: OrganizationId,
    pub name: String,
    pub wallet_address: WalletAddress,
}
