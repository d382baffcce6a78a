//! # xfer-engine — Transfer Orchestration
//!
//! [`TransferOrchestrator`] takes a raw transfer request and drives it
//! through validation, party resolution, routing, settlement and the ledger
//! update, returning a [`TransferOutcome`]:
//!
//! - `Success` when everything completed.
//! - `PartialSuccess` when the chain settlement committed but the ledger
//!   update failed. The receipt is always reported.
//! - `Failure` when nothing irreversible happened.
//!
//! Same-organization transfers never touch the proof service or the chain.
//! Cross-organization transfers settle on chain first and then update the
//! ledger.
//!
//! The orchestrator holds no per-request state between calls; concurrent
//! executions share only the ledger store and the collaborator handles.

pub mod config;
pub mod orchestrator;
pub mod outcome;
pub mod state;

pub use config::OrchestratorConfig;
pub use orchestrator::TransferOrchestrator;
pub use outcome::{
    ChainSettlement, DatabaseFailure, DatabaseSection, TransferOutcome, TransferResponse, TransferType,
    CHAIN_COMMITTED_LEDGER_FAILED,
};
pub use state::{Workflow, WorkflowState};
