//! Concurrency and conflict-retry behaviour of the balance ledger engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use xfer_core::{
    AccountId, AccountReference, Amount, ErrorKind, OrganizationId, TransferError, WalletAddress,
};
use xfer_ledger::{
    AccountRecord, BalanceLedgerEngine, InMemoryLedgerStore, LedgerError, LedgerSide, LedgerStore,
    OrganizationRecord, RetryPolicy, StoreError, WriteState,
};

/// Loses the first `losses` conditional writes against `target`, as if a
/// concurrent writer always got there first.
struct ContendedStore {
    inner: InMemoryLedgerStore,
    target: AccountId,
    losses: u32,
    lost: AtomicU32,
}

#[async_trait]
impl LedgerStore for ContendedStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        self.inner.get_account(id).await
    }

    async fn find_account_by_reference(
        &self,
        reference: &AccountReference,
    ) -> Result<Option<AccountRecord>, StoreError> {
        self.inner.find_account_by_reference(reference).await
    }

    async fn get_organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<OrganizationRecord>, StoreError> {
        self.inner.get_organization(id).await
    }

    async fn compare_and_swap_balance(
        &self,
        id: AccountId,
        expected_version: i64,
        new_balance: Amount,
    ) -> Result<bool, StoreError> {
        if id == self.target && self.lost.load(Ordering::SeqCst) < self.losses {
            self.lost.fetch_add(1, Ordering::SeqCst);
            return Ok(false);
        }
        self.inner
            .compare_and_swap_balance(id, expected_version, new_balance)
            .await
    }

    async fn insert_organization(
        &self,
        name: &str,
        wallet_address: &WalletAddress,
    ) -> Result<OrganizationRecord, StoreError> {
        self.inner.insert_organization(name, wallet_address).await
    }

    async fn insert_account(
        &self,
        organization_id: OrganizationId,
        reference: &AccountReference,
        balance: Amount,
    ) -> Result<AccountRecord, StoreError> {
        self.inner
            .insert_account(organization_id, reference, balance)
            .await
    }
}

/// Conditional writes against `target` stall for `stall`. With
/// `lands_first` the write is applied before stalling, like a database
/// that committed but whose acknowledgement never arrived.
struct StallingStore {
    inner: InMemoryLedgerStore,
    target: AccountId,
    stall: Duration,
    lands_first: bool,
}

#[async_trait]
impl LedgerStore for StallingStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        self.inner.get_account(id).await
    }

    async fn find_account_by_reference(
        &self,
        reference: &AccountReference,
    ) -> Result<Option<AccountRecord>, StoreError> {
        self.inner.find_account_by_reference(reference).await
    }

    async fn get_organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<OrganizationRecord>, StoreError> {
        self.inner.get_organization(id).await
    }

    async fn compare_and_swap_balance(
        &self,
        id: AccountId,
        expected_version: i64,
        new_balance: Amount,
    ) -> Result<bool, StoreError> {
        if id != self.target {
            return self
                .inner
                .compare_and_swap_balance(id, expected_version, new_balance)
                .await;
        }
        let swapped = if self.lands_first {
            self.inner
                .compare_and_swap_balance(id, expected_version, new_balance)
                .await?
        } else {
            false
        };
        tokio::time::sleep(self.stall).await;
        Ok(swapped)
    }

    async fn insert_organization(
        &self,
        name: &str,
        wallet_address: &WalletAddress,
    ) -> Result<OrganizationRecord, StoreError> {
        self.inner.insert_organization(name, wallet_address).await
    }

    async fn insert_account(
        &self,
        organization_id: OrganizationId,
        reference: &AccountReference,
        balance: Amount,
    ) -> Result<AccountRecord, StoreError> {
        self.inner
            .insert_account(organization_id, reference, balance)
            .await
    }
}

fn retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_backoff: Duration::from_millis(1),
    }
}

async fn seed(store: &InMemoryLedgerStore, balances_minor: &[i64]) -> Vec<AccountId> {
    let wallet = WalletAddress::parse(&format!("0x{}", "c".repeat(40))).unwrap();
    let org = store.insert_organization("Org", &wallet).await.unwrap();
    let mut ids = Vec::new();
    for &b in balances_minor {
        let account = store
            .insert_account(
                org.id,
                &AccountReference::generate(&wallet),
                Amount::from_minor(b).unwrap(),
            )
            .await
            .unwrap();
        ids.push(account.id);
    }
    ids
}

#[tokio::test]
async fn conflicts_within_budget_are_retried() {
    let inner = InMemoryLedgerStore::new();
    let ids = seed(&inner, &[10_000, 0]).await;
    let store = ContendedStore {
        inner: inner.clone(),
        target: ids[0],
        losses: 4,
        lost: AtomicU32::new(0),
    };
    let engine = BalanceLedgerEngine::new(Arc::new(store), retry(), Duration::from_secs(1));

    let out = engine
        .transfer(ids[0], ids[1], Amount::from_minor(2_500).unwrap())
        .await
        .unwrap();
    assert_eq!(out.sender_new_balance.minor_units(), 7_500);
    assert_eq!(engine.conflicts(), 4);
}

#[tokio::test]
async fn exhausted_debit_leaves_both_accounts_untouched() {
    let inner = InMemoryLedgerStore::new();
    let ids = seed(&inner, &[10_000, 0]).await;
    let store = ContendedStore {
        inner: inner.clone(),
        target: ids[0],
        losses: u32::MAX,
        lost: AtomicU32::new(0),
    };
    let engine = BalanceLedgerEngine::new(Arc::new(store), retry(), Duration::from_secs(1));

    let err = engine
        .transfer(ids[0], ids[1], Amount::from_minor(100).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ConcurrentModification {
            side: LedgerSide::Debit,
            attempts: 5,
            ..
        }
    ));
    let balances: Vec<_> = inner.accounts().iter().map(|a| a.balance.minor_units()).collect();
    assert_eq!(balances, vec![10_000, 0]);
}

#[tokio::test]
async fn exhausted_credit_keeps_the_debit() {
    let inner = InMemoryLedgerStore::new();
    let ids = seed(&inner, &[10_000, 0]).await;
    let store = ContendedStore {
        inner: inner.clone(),
        target: ids[1],
        losses: u32::MAX,
        lost: AtomicU32::new(0),
    };
    let engine = BalanceLedgerEngine::new(Arc::new(store), retry(), Duration::from_secs(1));

    let err = engine
        .transfer(ids[0], ids[1], Amount::from_minor(100).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.side(), LedgerSide::Credit);
    let balances: Vec<_> = inner.accounts().iter().map(|a| a.balance.minor_units()).collect();
    assert_eq!(balances, vec![9_900, 0]);
}

#[tokio::test]
async fn debit_that_lands_before_its_timeout_counts_as_written() {
    let inner = InMemoryLedgerStore::new();
    let ids = seed(&inner, &[100_000, 50_000]).await;
    let store = StallingStore {
        inner: inner.clone(),
        target: ids[0],
        stall: Duration::from_millis(500),
        lands_first: true,
    };
    let engine = BalanceLedgerEngine::new(Arc::new(store), retry(), Duration::from_millis(50));

    let out = engine
        .transfer(ids[0], ids[1], Amount::from_minor(20_000).unwrap())
        .await
        .unwrap();
    assert_eq!(out.sender_new_balance.minor_units(), 80_000);
    assert_eq!(out.receiver_new_balance.minor_units(), 70_000);
    let balances: Vec<_> = inner.accounts().iter().map(|a| a.balance.minor_units()).collect();
    assert_eq!(balances, vec![80_000, 70_000]);
}

#[tokio::test]
async fn unconfirmed_debit_timeout_is_reported_as_unknown() {
    let inner = InMemoryLedgerStore::new();
    let ids = seed(&inner, &[100_000, 50_000]).await;
    let store = StallingStore {
        inner: inner.clone(),
        target: ids[0],
        stall: Duration::from_millis(500),
        lands_first: false,
    };
    let engine = BalanceLedgerEngine::new(Arc::new(store), retry(), Duration::from_millis(50));

    let err = engine
        .transfer(ids[0], ids[1], Amount::from_minor(20_000).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Timeout {
            side: LedgerSide::Debit,
            write_state: WriteState::Unknown,
            ..
        }
    ));

    let te: TransferError = err.into();
    assert_eq!(te.kind, ErrorKind::DatabaseError);
    let details = te.details.unwrap();
    assert_eq!(details["side"], "debit");
    assert_eq!(details["write_state"], "unknown");
    assert!(details["sender_debited"].is_null());
}

#[tokio::test]
async fn unconfirmed_credit_timeout_still_reports_the_debit() {
    let inner = InMemoryLedgerStore::new();
    let ids = seed(&inner, &[100_000, 50_000]).await;
    let store = StallingStore {
        inner: inner.clone(),
        target: ids[1],
        stall: Duration::from_millis(500),
        lands_first: false,
    };
    let engine = BalanceLedgerEngine::new(Arc::new(store), retry(), Duration::from_millis(50));

    let err = engine
        .transfer(ids[0], ids[1], Amount::from_minor(20_000).unwrap())
        .await
        .unwrap_err();
    let te: TransferError = err.into();
    let details = te.details.unwrap();
    assert_eq!(details["side"], "credit");
    assert_eq!(details["write_state"], "unknown");
    assert_eq!(details["sender_debited"], true);
    assert_eq!(inner.get_account(ids[0]).await.unwrap().unwrap().balance.minor_units(), 80_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_lose_an_update() {
    let store = InMemoryLedgerStore::new();
    let ids = seed(&store, &[100_000, 0, 0]).await;
    let engine = Arc::new(BalanceLedgerEngine::new(
        Arc::new(store.clone()),
        RetryPolicy {
            max_attempts: 50,
            base_backoff: Duration::from_micros(100),
        },
        Duration::from_secs(5),
    ));

    let mut tasks = Vec::new();
    for i in 0..20 {
        let engine = Arc::clone(&engine);
        let sender = ids[0];
        let receiver = ids[1 + (i % 2)];
        tasks.push(tokio::spawn(async move {
            engine
                .transfer(sender, receiver, Amount::from_minor(1_000).unwrap())
                .await
        }));
    }

    let mut succeeded = 0i64;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::ConcurrentModification { side, .. }) => {
                assert_eq!(side, LedgerSide::Debit)
            }
            Err(other) => panic!("unexpected ledger error: {other}"),
        }
    }

    let accounts = store.accounts();
    assert_eq!(accounts[0].balance.minor_units(), 100_000 - succeeded * 1_000);
    assert_eq!(
        accounts[1].balance.minor_units() + accounts[2].balance.minor_units(),
        succeeded * 1_000
    );
    assert_eq!(store.total_balance(), 100_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_for_the_last_funds_never_overdraws() {
    let store = InMemoryLedgerStore::new();
    let ids = seed(&store, &[1_500, 0]).await;
    let engine = Arc::new(BalanceLedgerEngine::new(
        Arc::new(store.clone()),
        retry(),
        Duration::from_secs(5),
    ));

    let a = {
        let engine = Arc::clone(&engine);
        let (s, r) = (ids[0], ids[1]);
        tokio::spawn(async move { engine.transfer(s, r, Amount::from_minor(1_000).unwrap()).await })
    };
    let b = {
        let engine = Arc::clone(&engine);
        let (s, r) = (ids[0], ids[1]);
        tokio::spawn(async move { engine.transfer(s, r, Amount::from_minor(1_000).unwrap()).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert!(ok <= 1);

    let sender = store.get_account(ids[0]).await.unwrap().unwrap();
    assert_eq!(sender.balance.minor_units(), 1_500 - 1_000 * ok as i64);
    assert_eq!(store.total_balance(), 1_500);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn transfers_conserve_total_and_stay_non_negative(
        balances in proptest::collection::vec(0i64..50_000, 2..6),
        moves in proptest::collection::vec((0usize..6, 0usize..6, 1i64..20_000), 1..20),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let store = InMemoryLedgerStore::new();
            let ids = seed(&store, &balances).await;
            let total: i64 = balances.iter().sum();
            let engine = BalanceLedgerEngine::new(
                Arc::new(store.clone()),
                retry(),
                Duration::from_secs(1),
            );

            for (from, to, amount) in moves {
                let sender = ids[from % ids.len()];
                let receiver = ids[to % ids.len()];
                let before: HashMap<_, _> = store
                    .accounts()
                    .into_iter()
                    .map(|a| (a.id, a.balance))
                    .collect();
                let result = engine
                    .transfer(sender, receiver, Amount::from_minor(amount).unwrap())
                    .await;
                if let Err(LedgerError::InsufficientBalance { .. }) = result {
                    let after: HashMap<_, _> = store
                        .accounts()
                        .into_iter()
                        .map(|a| (a.id, a.balance))
                        .collect();
                    prop_assert_eq!(before, after);
                } else {
                    prop_assert!(result.is_ok());
                }
                prop_assert_eq!(store.total_balance(), total);
            }
            Ok(())
        })?;
    }
}
