//! # Transfer Orchestrator
//!
//! Runs one transfer through the workflow in [`crate::state`]:
//!
//! 1. **VALIDATING**: pure input checks, no I/O.
//! 2. **RESOLVING_PARTIES**: load sender, receiver and both organizations;
//!    reject early if the sender cannot cover the amount.
//! 3. **ROUTING**: same organization id ⇒ local settlement, otherwise chain.
//! 4. **SETTLING_LOCAL**: nothing to do; the ledger update is the transfer.
//!    **SETTLING_CHAIN**: proof, nullifier, memo, then chain submission.
//! 5. **UPDATING_LEDGER**: debit sender, credit receiver.
//!
//! ## Commit point
//!
//! A receipt from the chain gateway is irreversible. Every error before it
//! is a [`TransferOutcome::Failure`] with no ledger write. Every error after
//! it is a [`TransferOutcome::PartialSuccess`] carrying the receipt; there is
//! no code path from a receipt to a `Failure`.
//!
//! A 2xx from the gateway without a readable receipt is neither: no ledger
//! write is made, and the failure carries `details.may_have_committed` and
//! any `tx_hash` so reconciliation can settle it.
//!
//! ## Timeouts
//!
//! Each external call has its own timeout from [`OrchestratorConfig`].
//! Calls before the commit point are additionally capped by what is left of
//! the workflow deadline. Ledger updates are not, so a debit/credit pair is
//! never abandoned between its two writes by the deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;
use xfer_core::{
    validate, ChainError, ChainFailureKind, ChainGateway, EventPublisher, ErrorKind, Memo,
    Nullifier, ProofError, ProofRequest, ProofService, SettlementEvent, SettlementRequest,
    TransferError, TransferMemo, TransferRequest, TransferRequestInput,
};
use xfer_ledger::{
    AccountRecord, BalanceLedgerEngine, LedgerStore, OrganizationRecord, StoreError,
};

use crate::config::OrchestratorConfig;
use crate::outcome::{ChainSettlement, TransferOutcome, TransferType};
use crate::state::{Workflow, WorkflowState};

/// Everything resolved before routing.
#[derive(Debug, Clone)]
struct Parties {
    request: TransferRequest,
    sender: AccountRecord,
    receiver: AccountRecord,
    sender_org: OrganizationRecord,
    receiver_org: OrganizationRecord,
}

impl Parties {
    fn transfer_type(&self) -> TransferType {
        if self.sender.organization_id == self.receiver.organization_id {
            TransferType::SameOrganization
        } else {
            TransferType::CrossOrganization
        }
    }
}

pub struct TransferOrchestrator {
    store: Arc<dyn LedgerStore>,
    ledger: Arc<BalanceLedgerEngine>,
    proof: Arc<dyn ProofService>,
    chain: Arc<dyn ChainGateway>,
    events: Arc<dyn EventPublisher>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for TransferOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("ledger", &self.ledger)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransferOrchestrator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        proof: Arc<dyn ProofService>,
        chain: Arc<dyn ChainGateway>,
        events: Arc<dyn EventPublisher>,
        config: OrchestratorConfig,
    ) -> Self {
        let ledger = Arc::new(BalanceLedgerEngine::new(
            Arc::clone(&store),
            config.retry,
            config.ledger_timeout,
        ));
        Self {
            store,
            ledger,
            proof,
            chain,
            events,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn ledger(&self) -> &BalanceLedgerEngine {
        &self.ledger
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one transfer to completion. Never panics and never returns an
    /// error: every failure is folded into the outcome.
    pub async fn execute(&self, input: &TransferRequestInput) -> TransferOutcome {
        let transfer_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "transfer",
            %transfer_id,
            sender_id = tracing::field::Empty,
        );
        async move {
            let mut workflow = Workflow::start(self.config.workflow_deadline);
            let outcome = self.run(transfer_id, input, &mut workflow).await;
            log_outcome(&outcome, workflow.state());
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        transfer_id: Uuid,
        input: &TransferRequestInput,
        wf: &mut Workflow,
    ) -> TransferOutcome {
        let parties = match self.resolve(input, wf).await {
            Ok(parties) => parties,
            Err(error) => return failure(wf, transfer_id, None, error),
        };

        let transfer_type = parties.transfer_type();
        tracing::debug!(transfer_type = transfer_type.as_str(), "routed");
        match transfer_type {
            TransferType::SameOrganization => self.settle_local(transfer_id, &parties, wf).await,
            TransferType::CrossOrganization => self.settle_chain(transfer_id, &parties, wf).await,
        }
    }

    /// VALIDATING → RESOLVING_PARTIES → ROUTING.
    async fn resolve(
        &self,
        input: &TransferRequestInput,
        wf: &mut Workflow,
    ) -> Result<Parties, TransferError> {
        let request = validate(input).map_err(TransferError::from)?;
        tracing::Span::current().record("sender_id", request.sender_id.get());
        wf.advance(WorkflowState::ResolvingParties)?;

        let sender = self
            .lookup(wf, self.store.get_account(request.sender_id))
            .await?
            .ok_or_else(|| {
                TransferError::user_not_found(format!("sender {} not found", request.sender_id))
                    .with_details(json!({ "sender_id": request.sender_id }))
            })?;

        let receiver = self
            .lookup(
                wf,
                self.store
                    .find_account_by_reference(&request.receiver_reference),
            )
            .await?
            .ok_or_else(|| {
                TransferError::user_not_found("receiver not found").with_details(
                    json!({ "receiver_reference": request.receiver_reference }),
                )
            })?;

        let sender_org = self.organization(wf, &sender, "sender").await?;
        let receiver_org = if receiver.organization_id == sender.organization_id {
            sender_org.clone()
        } else {
            self.organization(wf, &receiver, "receiver").await?
        };

        if sender.balance < request.amount {
            return Err(TransferError::new(
                ErrorKind::InsufficientBalance,
                format!(
                    "insufficient balance: available {}, requested {}",
                    sender.balance, request.amount
                ),
            )
            .with_details(json!({
                "sender_id": sender.id,
                "available": sender.balance,
                "requested": request.amount,
            })));
        }

        wf.advance(WorkflowState::Routing)?;
        Ok(Parties {
            request,
            sender,
            receiver,
            sender_org,
            receiver_org,
        })
    }

    async fn organization(
        &self,
        wf: &Workflow,
        account: &AccountRecord,
        party: &'static str,
    ) -> Result<OrganizationRecord, TransferError> {
        self.lookup(wf, self.store.get_organization(account.organization_id))
            .await?
            .ok_or_else(|| {
                TransferError::organization_not_found(format!(
                    "organization {} of {party} not found",
                    account.organization_id
                ))
                .with_details(json!({
                    "party": party,
                    "organization_id": account.organization_id,
                }))
            })
    }

    /// A party-resolution read, bounded by the per-call ledger timeout and
    /// the workflow deadline.
    async fn lookup<T>(
        &self,
        wf: &Workflow,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, TransferError> {
        let limit = self.config.ledger_timeout.min(wf.remaining());
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "ledger store read failed");
                Err(TransferError::database("ledger store failure while resolving parties"))
            }
            Err(_) => Err(TransferError::database(format!(
                "ledger store did not answer within {limit:?}"
            ))),
        }
    }

    /// SETTLING_LOCAL → UPDATING_LEDGER → DONE.
    async fn settle_local(
        &self,
        transfer_id: Uuid,
        parties: &Parties,
        wf: &mut Workflow,
    ) -> TransferOutcome {
        let transfer_type = Some(TransferType::SameOrganization);
        if let Err(e) = wf
            .advance(WorkflowState::SettlingLocal)
            .and_then(|_| wf.advance(WorkflowState::UpdatingLedger))
        {
            return failure(wf, transfer_id, transfer_type, e);
        }

        match self
            .ledger
            .transfer(parties.sender.id, parties.receiver.id, parties.request.amount)
            .await
        {
            Ok(database) => match wf.advance(WorkflowState::Done) {
                Ok(()) => TransferOutcome::Success {
                    transfer_id,
                    transfer_type: TransferType::SameOrganization,
                    blockchain: None,
                    database,
                },
                Err(e) => failure(wf, transfer_id, transfer_type, e),
            },
            Err(e) => failure(wf, transfer_id, transfer_type, e.into()),
        }
    }

    /// SETTLING_CHAIN → UPDATING_LEDGER → DONE.
    async fn settle_chain(
        &self,
        transfer_id: Uuid,
        parties: &Parties,
        wf: &mut Workflow,
    ) -> TransferOutcome {
        let transfer_type = Some(TransferType::CrossOrganization);
        let blockchain = match self.submit(parties, wf).await {
            Ok(settlement) => settlement,
            Err(e) => return failure(wf, transfer_id, transfer_type, e),
        };

        // Committed on chain. Nothing below may produce a Failure.
        tracing::info!(
            tx_hash = %blockchain.receipt.tx_hash,
            block_number = blockchain.receipt.block_number,
            "chain settlement committed"
        );
        self.publish(transfer_id, &blockchain);

        let ledger_result = match wf.advance(WorkflowState::UpdatingLedger) {
            Ok(()) => self
                .ledger
                .transfer(parties.sender.id, parties.receiver.id, parties.request.amount)
                .await
                .map_err(TransferError::from),
            Err(e) => Err(e),
        };

        match ledger_result {
            Ok(database) => {
                if let Err(e) = wf.advance(WorkflowState::Done) {
                    tracing::error!(error = %e, "workflow bookkeeping failed after ledger update");
                }
                TransferOutcome::Success {
                    transfer_id,
                    transfer_type: TransferType::CrossOrganization,
                    blockchain: Some(blockchain),
                    database,
                }
            }
            Err(database_error) => {
                wf.fail();
                TransferOutcome::PartialSuccess {
                    transfer_id,
                    blockchain,
                    database_error,
                }
            }
        }
    }

    /// Everything up to and including the chain call.
    async fn submit(
        &self,
        parties: &Parties,
        wf: &mut Workflow,
    ) -> Result<ChainSettlement, TransferError> {
        wf.advance(WorkflowState::SettlingChain)?;
        let amount = parties.request.amount;

        let proof_request = ProofRequest {
            receiver_id: parties.receiver.id,
            receiver_reference: parties.receiver.reference.clone(),
            organization_id: parties.receiver.organization_id,
        };
        let limit = self.config.proof_timeout.min(wf.remaining());
        let bundle = match tokio::time::timeout(limit, self.proof.generate(&proof_request)).await {
            Ok(result) => result,
            Err(_) => Err(ProofError::Timeout(limit)),
        }
        .map_err(|e| {
            tracing::warn!(error = %e, "proof generation failed");
            TransferError::from(e)
        })?;

        let nullifier = Nullifier::generate();
        let memo = Memo::build(&TransferMemo::new(
            Some(&parties.sender.reference),
            Some(&parties.receiver.reference),
            &parties.sender_org.wallet_address,
            &parties.receiver_org.wallet_address,
            amount,
        ))?;
        memo.validate_length()?;

        let request = SettlementRequest {
            to_wallet: parties.receiver_org.wallet_address.clone(),
            amount,
            memo,
            nullifier,
            sender_reference: parties.sender.reference.clone(),
            receiver_reference: parties.receiver.reference.clone(),
            proof: bundle.proof,
            public_inputs: bundle.public_inputs,
        };

        let limit = self.config.chain_timeout.min(wf.remaining());
        let receipt = match tokio::time::timeout(limit, self.chain.submit(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::new(
                ChainFailureKind::Timeout,
                format!("no settlement confirmation within {limit:?}"),
            )),
        }
        .map_err(|e| {
            if e.may_have_committed() {
                tracing::error!(
                    tx_hash = ?e.tx_hash,
                    error = %e,
                    "chain outcome unknown; no ledger write made, reconciliation required"
                );
            } else {
                tracing::warn!(kind = ?e.kind, error = %e, "chain settlement failed");
            }
            TransferError::from(e)
        })?;

        Ok(ChainSettlement {
            receipt,
            nullifier: request.nullifier,
            memo: request.memo.as_str().to_string(),
            amount,
            sender_reference: request.sender_reference,
            receiver_reference: request.receiver_reference,
        })
    }

    /// Fire-and-forget audit event. The outcome is only logged.
    fn publish(&self, transfer_id: Uuid, settlement: &ChainSettlement) {
        let event = SettlementEvent {
            transfer_id,
            receipt: settlement.receipt.clone(),
            amount: settlement.amount,
            sender_reference: settlement.sender_reference.clone(),
            receiver_reference: settlement.receiver_reference.clone(),
            nullifier: settlement.nullifier,
            timestamp: Utc::now(),
        };
        let events = Arc::clone(&self.events);
        let limit: Duration = self.config.publish_timeout;
        tokio::spawn(
            async move {
                match tokio::time::timeout(limit, events.publish(&event)).await {
                    Ok(Ok(())) => tracing::debug!("settlement event published"),
                    Ok(Err(e)) => tracing::warn!(error = %e, "settlement event publish failed"),
                    Err(_) => tracing::warn!(?limit, "settlement event publish timed out"),
                }
            }
            .instrument(tracing::Span::current()),
        );
    }
}

fn failure(
    wf: &mut Workflow,
    transfer_id: Uuid,
    transfer_type: Option<TransferType>,
    error: TransferError,
) -> TransferOutcome {
    wf.fail();
    TransferOutcome::Failure {
        transfer_id,
        transfer_type,
        error,
    }
}

fn log_outcome(outcome: &TransferOutcome, state: WorkflowState) {
    let transfer_type = outcome.transfer_type().map(TransferType::as_str).unwrap_or("-");
    match outcome {
        TransferOutcome::Success { database, .. } => tracing::info!(
            state = state.as_str(),
            transfer_type,
            amount = %database.amount,
            receiver_id = %database.receiver_id,
            "transfer completed"
        ),
        TransferOutcome::PartialSuccess {
            blockchain,
            database_error,
            ..
        } => tracing::error!(
            state = state.as_str(),
            tx_hash = %blockchain.receipt.tx_hash,
            kind = database_error.kind.as_str(),
            error = %database_error,
            "chain settlement committed but ledger update failed; reconciliation required"
        ),
        TransferOutcome::Failure { error, .. } if may_have_committed(error) => tracing::error!(
            state = state.as_str(),
            transfer_type,
            kind = error.kind.as_str(),
            error = %error,
            "transfer failed but the chain may have committed; reconciliation required"
        ),
        TransferOutcome::Failure { error, .. } => tracing::warn!(
            state = state.as_str(),
            transfer_type,
            kind = error.kind.as_str(),
            error = %error,
            "transfer failed"
        ),
    }
}

fn may_have_committed(error: &TransferError) -> bool {
    error
        .details
        .as_ref()
        .and_then(|d| d.get("may_have_committed"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}
