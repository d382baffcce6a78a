//! # Collaborator Ports
//!
//! Traits for the external systems a cross-organization transfer depends
//! on. The orchestrator holds them as `Arc<dyn Trait>`; HTTP adapters live
//! in `xfer-gateway`, and tests substitute recording fakes.

use async_trait::async_trait;

use crate::settlement::{
    ChainError, ProofBundle, ProofError, ProofRequest, PublishError, Receipt, SettlementEvent,
    SettlementRequest,
};

/// Produces opaque proof material for a receiver.
#[async_trait]
pub trait ProofService: Send + Sync {
    async fn generate(&self, request: &ProofRequest) -> Result<ProofBundle, ProofError>;
}

/// Submits a settlement on chain and waits for it to commit.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn submit(&self, request: &SettlementRequest) -> Result<Receipt, ChainError>;
}

/// Best-effort audit sink. Callers never act on the result beyond logging.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &SettlementEvent) -> Result<(), PublishError>;
}
