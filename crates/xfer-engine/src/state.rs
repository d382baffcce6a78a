//! # Workflow States
//!
//! VALIDATING → RESOLVING_PARTIES → ROUTING → {SETTLING_LOCAL | SETTLING_CHAIN}
//! → UPDATING_LEDGER → DONE
//!
//! Any non-terminal state may also move to FAILED. [`Workflow`] tracks the
//! current state of one run, rejects transitions outside this graph and
//! logs each one.

use std::time::{Duration, Instant};

use xfer_core::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Validating,
    ResolvingParties,
    Routing,
    SettlingLocal,
    SettlingChain,
    UpdatingLedger,
    /// Terminal.
    Done,
    /// Terminal.
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [WorkflowState] {
        use WorkflowState::*;
        match self {
            Validating => &[ResolvingParties, Failed],
            ResolvingParties => &[Routing, Failed],
            Routing => &[SettlingLocal, SettlingChain, Failed],
            SettlingLocal => &[UpdatingLedger, Failed],
            SettlingChain => &[UpdatingLedger, Failed],
            UpdatingLedger => &[Done, Failed],
            Done | Failed => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "VALIDATING",
            Self::ResolvingParties => "RESOLVING_PARTIES",
            Self::Routing => "ROUTING",
            Self::SettlingLocal => "SETTLING_LOCAL",
            Self::SettlingChain => "SETTLING_CHAIN",
            Self::UpdatingLedger => "UPDATING_LEDGER",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run's position in the state graph, plus its deadline.
#[derive(Debug)]
pub struct Workflow {
    state: WorkflowState,
    history: Vec<WorkflowState>,
    deadline: Instant,
}

impl Workflow {
    pub fn start(deadline: Duration) -> Self {
        tracing::debug!(state = WorkflowState::Validating.as_str(), "workflow started");
        Self {
            state: WorkflowState::Validating,
            history: vec![WorkflowState::Validating],
            deadline: Instant::now() + deadline,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    /// Time left before the deadline, zero once passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Move to `next`. An edge outside the graph is a bug in the caller
    /// and is reported as `INTERNAL_ERROR`.
    pub fn advance(&mut self, next: WorkflowState) -> Result<(), TransferError> {
        if !self.state.valid_transitions().contains(&next) {
            tracing::error!(from = self.state.as_str(), to = next.as_str(), "invalid workflow transition");
            return Err(TransferError::internal(format!(
                "invalid workflow transition {} -> {}",
                self.state, next
            )));
        }
        tracing::debug!(from = self.state.as_str(), to = next.as_str(), "workflow transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to FAILED unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(from = self.state.as_str(), "workflow failed");
            self.state = WorkflowState::Failed;
            self.history.push(WorkflowState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkflowState::*;

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(Done.valid_transitions().is_empty());
        assert!(Failed.valid_transitions().is_empty());
    }

    #[test]
    fn chain_path_is_accepted() {
        let mut wf = Workflow::start(Duration::from_secs(5));
        for next in [ResolvingParties, Routing, SettlingChain, UpdatingLedger, Done] {
            wf.advance(next).unwrap();
        }
        assert_eq!(
            wf.history(),
            &[Validating, ResolvingParties, Routing, SettlingChain, UpdatingLedger, Done]
        );
    }

    #[test]
    fn skipping_routing_is_rejected() {
        let mut wf = Workflow::start(Duration::from_secs(5));
        wf.advance(ResolvingParties).unwrap();
        let err = wf.advance(SettlingLocal).unwrap_err();
        assert_eq!(err.kind, xfer_core::ErrorKind::InternalError);
        assert_eq!(wf.state(), ResolvingParties);
    }

    #[test]
    fn fail_is_idempotent() {
        let mut wf = Workflow::start(Duration::from_secs(5));
        wf.fail();
        wf.fail();
        assert_eq!(wf.history(), &[Validating, Failed]);
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let wf = Workflow::start(Duration::ZERO);
        assert_eq!(wf.remaining(), Duration::ZERO);
    }
}
