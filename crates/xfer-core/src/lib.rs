//! # xfer-core — Foundational Types for the Transfer Stack
//!
//! This crate is the leaf of the workspace dependency DAG. It defines the
//! value types every other crate speaks in, and the narrow contracts the
//! transfer orchestrator expects from its external collaborators.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `AccountId`,
//!    `OrganizationId`, `AccountReference`, `WalletAddress`, all newtypes
//!    with validated constructors. No bare integers or strings for
//!    identifiers.
//!
//! 2. **Fixed-point money.** [`Amount`] stores integer minor units and can
//!    never be negative. Floats only exist at the request boundary, where
//!    the validator converts them or rejects them.
//!
//! 3. **One closed error taxonomy.** [`ErrorKind`] enumerates every error a
//!    transfer can report. Lower layers convert into [`TransferError`]
//!    through explicit mappings, so adding a kind forces every consumer to
//!    handle it.
//!
//! 4. **Canonical memos.** Transfer memos are serialized through
//!    [`CanonicalJson`] (RFC 8785), so the 1024-byte bound is measured on
//!    exactly the bytes the chain receives.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `xfer-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod canonical;
pub mod error;
pub mod identity;
pub mod memo;
pub mod nullifier;
pub mod ports;
pub mod settlement;
pub mod validation;

// Re-export primary types for ergonomic imports.
pub use amount::{Amount, AmountError};
pub use canonical::{CanonicalJson, CanonicalizationError};
pub use error::{ErrorKind, TransferError};
pub use identity::{AccountId, AccountReference, IdentityError, OrganizationId, WalletAddress};
pub use memo::{Memo, MemoError, TransferMemo, MAX_MEMO_BYTES};
pub use nullifier::{Nullifier, NullifierError};
pub use ports::{ChainGateway, EventPublisher, ProofService};
pub use settlement::{
    ChainError, ChainFailureKind, ProofBundle, ProofError, ProofRequest, PublishError, Receipt,
    SettlementEvent, SettlementRequest,
};
pub use validation::{validate, InvalidInput, TransferRequest, TransferRequestInput};
