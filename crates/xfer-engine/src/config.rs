//! Orchestrator timeouts.

use std::time::Duration;

use xfer_ledger::RetryPolicy;

/// Per-call timeouts, the overall workflow deadline, and the ledger
/// retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub proof_timeout: Duration,
    pub chain_timeout: Duration,
    /// Applied to every individual ledger store call.
    pub ledger_timeout: Duration,
    /// How long a spawned event publish may run.
    pub publish_timeout: Duration,
    /// Budget for everything up to and including chain submission.
    /// Ledger updates are bounded only by `ledger_timeout` so that an
    /// in-flight debit/credit pair is never abandoned halfway.
    pub workflow_deadline: Duration,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            proof_timeout: Duration::from_secs(60),
            chain_timeout: Duration::from_secs(45),
            ledger_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(2),
            workflow_deadline: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}
