//! # Balance Ledger Engine
//!
//! Moves an amount from one account to another with optimistic locking.
//!
//! Each side is a read / compute / conditional-write loop:
//!
//! 1. Read the account's balance and `version`.
//! 2. Compute the new balance. A debit that would go negative fails with
//!    [`LedgerError::InsufficientBalance`] without writing.
//! 3. [`LedgerStore::compare_and_swap_balance`] at the version read in 1.
//! 4. On conflict, back off and retry from 1 until
//!    [`RetryPolicy::max_attempts`] is spent.
//!
//! The sender is debited before the receiver is credited. A failed debit
//! leaves both accounts untouched. A failed credit does NOT roll back the
//! debit: the error reports [`LedgerSide::Credit`] so reconciliation can
//! find the half-applied pair.
//!
//! A conditional write that times out may still have landed. The engine
//! re-reads the record: a record at `expected_version + 1` holding the
//! computed balance counts as written. Anything else is reported with
//! [`WriteState::Unknown`], never as "not applied".

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use xfer_core::{AccountId, Amount, ErrorKind, TransferError};

use crate::record::AccountRecord;
use crate::store::{LedgerStore, StoreError};

/// Conflict retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per side, including the first.
    pub max_attempts: u32,
    /// Sleep after the first conflict; doubles on each further conflict.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the `attempt`-th conflict (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1u32 << shift)
    }
}

/// Which half of the transfer an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSide {
    Debit,
    Credit,
}

impl LedgerSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::fmt::Display for LedgerSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("account {account} has {available}, cannot debit {requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Amount,
        requested: Amount,
    },

    #[error("{side}: account {account} not found")]
    AccountNotFound { side: LedgerSide, account: AccountId },

    #[error("{side}: account {account} balance was modified by another operation ({attempts} attempts)")]
    ConcurrentModification {
        side: LedgerSide,
        account: AccountId,
        attempts: u32,
    },

    #[error("{side}: account {account} balance would overflow")]
    Overflow { side: LedgerSide, account: AccountId },

    #[error("{side}: {source}")]
    Store {
        side: LedgerSide,
        #[source]
        source: StoreError,
    },

    #[error("{side}: ledger store call timed out after {after:?} (write {write_state})")]
    Timeout {
        side: LedgerSide,
        after: Duration,
        write_state: WriteState,
    },
}

/// What is known about the conditional write when a store call timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteState {
    /// The call that timed out was a read; nothing was written.
    NotAttempted,
    /// The write was issued and its outcome could not be confirmed.
    Unknown,
}

impl WriteState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for WriteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LedgerError {
    /// The side that failed. Insufficient balance is always a debit.
    pub fn side(&self) -> LedgerSide {
        match self {
            Self::InsufficientBalance { .. } => LedgerSide::Debit,
            Self::AccountNotFound { side, .. }
            | Self::ConcurrentModification { side, .. }
            | Self::Overflow { side, .. }
            | Self::Store { side, .. }
            | Self::Timeout { side, .. } => *side,
        }
    }
}

impl From<LedgerError> for TransferError {
    fn from(err: LedgerError) -> Self {
        let side = err.side();
        // Credit runs only after a committed debit.
        let sender_debited = side == LedgerSide::Credit;
        match err {
            LedgerError::InsufficientBalance {
                account,
                available,
                requested,
            } => TransferError::new(
                ErrorKind::InsufficientBalance,
                format!("insufficient balance: available {available}, requested {requested}"),
            )
            .with_details(json!({
                "account_id": account,
                "available": available,
                "requested": requested,
            })),
            LedgerError::AccountNotFound { account, .. } => TransferError::user_not_found(
                format!("account {account} not found during {side}"),
            )
            .with_details(json!({
                "side": side,
                "account_id": account,
                "sender_debited": sender_debited,
            })),
            LedgerError::ConcurrentModification {
                account, attempts, ..
            } => TransferError::database("balance was modified by another operation")
                .with_details(json!({
                    "side": side,
                    "cause": ErrorKind::ConcurrentModification,
                    "account_id": account,
                    "attempts": attempts,
                    "sender_debited": sender_debited,
                })),
            LedgerError::Overflow { account, .. } => {
                TransferError::database(format!("balance overflow during {side}")).with_details(
                    json!({
                        "side": side,
                        "account_id": account,
                        "sender_debited": sender_debited,
                    }),
                )
            }
            LedgerError::Store { .. } => {
                TransferError::database(format!("ledger store failure during {side}"))
                    .with_details(json!({
                        "side": side,
                        "sender_debited": sender_debited,
                    }))
            }
            LedgerError::Timeout {
                after, write_state, ..
            } => {
                // A debit whose write may have landed leaves the sender unknown.
                let sender_debited = match (side, write_state) {
                    (LedgerSide::Debit, WriteState::Unknown) => serde_json::Value::Null,
                    _ => json!(sender_debited),
                };
                TransferError::database(format!("ledger store timed out during {side}"))
                    .with_details(json!({
                        "side": side,
                        "timeout_ms": after.as_millis() as u64,
                        "write_state": write_state,
                        "sender_debited": sender_debited,
                    }))
            }
        }
    }
}

/// Result of a completed debit/credit pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransfer {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Amount,
    pub sender_previous_balance: Amount,
    pub sender_new_balance: Amount,
    pub receiver_previous_balance: Amount,
    pub receiver_new_balance: Amount,
    pub timestamp: DateTime<Utc>,
}

pub struct BalanceLedgerEngine {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
    call_timeout: Duration,
    conflicts: AtomicU64,
}

impl std::fmt::Debug for BalanceLedgerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceLedgerEngine")
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .field("conflicts", &self.conflicts())
            .finish()
    }
}

impl BalanceLedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            store,
            retry,
            call_timeout,
            conflicts: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Conditional writes lost to a concurrent writer since startup.
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Debit `sender`, then credit `receiver`.
    pub async fn transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
    ) -> Result<LedgerTransfer, LedgerError> {
        let (sender_previous_balance, sender_new_balance) =
            self.apply(LedgerSide::Debit, sender, amount).await?;

        let (receiver_previous_balance, receiver_new_balance) =
            match self.apply(LedgerSide::Credit, receiver, amount).await {
                Ok(balances) => balances,
                Err(e) => {
                    tracing::error!(
                        sender_id = %sender,
                        receiver_id = %receiver,
                        amount = %amount,
                        error = %e,
                        "credit failed after debit committed; pair requires reconciliation"
                    );
                    return Err(e);
                }
            };

        Ok(LedgerTransfer {
            sender_id: sender,
            receiver_id: receiver,
            amount,
            sender_previous_balance,
            sender_new_balance,
            receiver_previous_balance,
            receiver_new_balance,
            timestamp: Utc::now(),
        })
    }

    /// One side of the transfer. Returns `(previous, new)` balances.
    async fn apply(
        &self,
        side: LedgerSide,
        account: AccountId,
        amount: Amount,
    ) -> Result<(Amount, Amount), LedgerError> {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let current = self
                .timed(side, self.store.get_account(account))
                .await?
                .ok_or(LedgerError::AccountNotFound { side, account })?;

            let next = next_balance(side, &current, amount)?;

            let swapped = self.write(side, &current, next).await?;
            if swapped {
                tracing::debug!(
                    side = side.as_str(),
                    account_id = %account,
                    attempt,
                    previous = %current.balance,
                    new = %next,
                    "balance updated"
                );
                return Ok((current.balance, next));
            }

            self.conflicts.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                side = side.as_str(),
                account_id = %account,
                attempt,
                version = current.version,
                "optimistic lock conflict"
            );
            if attempt < max_attempts {
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }
        }

        tracing::warn!(
            side = side.as_str(),
            account_id = %account,
            attempts = max_attempts,
            "optimistic lock retries exhausted"
        );
        Err(LedgerError::ConcurrentModification {
            side,
            account,
            attempts: max_attempts,
        })
    }

    async fn timed<T>(
        &self,
        side: LedgerSide,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, LedgerError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|source| LedgerError::Store { side, source }),
            Err(_) => Err(LedgerError::Timeout {
                side,
                after: self.call_timeout,
                write_state: WriteState::NotAttempted,
            }),
        }
    }

    /// The conditional write. On timeout the record is re-read to find out
    /// whether the write landed before the call was abandoned.
    async fn write(
        &self,
        side: LedgerSide,
        current: &AccountRecord,
        next: Amount,
    ) -> Result<bool, LedgerError> {
        let call = self
            .store
            .compare_and_swap_balance(current.id, current.version, next);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|source| LedgerError::Store { side, source }),
            Err(_) => {
                let unknown = LedgerError::Timeout {
                    side,
                    after: self.call_timeout,
                    write_state: WriteState::Unknown,
                };
                let reread =
                    tokio::time::timeout(self.call_timeout, self.store.get_account(current.id))
                        .await;
                match reread {
                    Ok(Ok(Some(after)))
                        if after.version == current.version + 1 && after.balance == next =>
                    {
                        tracing::warn!(
                            side = side.as_str(),
                            account_id = %current.id,
                            version = after.version,
                            "conditional write timed out but is confirmed on re-read"
                        );
                        Ok(true)
                    }
                    _ => {
                        tracing::error!(
                            side = side.as_str(),
                            account_id = %current.id,
                            expected_version = current.version,
                            "conditional write timed out; outcome unknown"
                        );
                        Err(unknown)
                    }
                }
            }
        }
    }
}

fn next_balance(
    side: LedgerSide,
    current: &AccountRecord,
    amount: Amount,
) -> Result<Amount, LedgerError> {
    match side {
        LedgerSide::Debit => {
            current
                .balance
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    account: current.id,
                    available: current.balance,
                    requested: amount,
                })
        }
        LedgerSide::Credit => current
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                side,
                account: current.id,
            }),
    }
}
