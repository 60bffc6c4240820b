//! Message types for the evaluator actor

use tokio::sync::oneshot;

use crate::tips::Tip;

/// Result of one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Enabled agents that were evaluated this pass
    pub agents_evaluated: usize,

    /// Agents skipped because their evaluation timed out or failed
    pub agents_skipped: usize,

    /// Tips active after this pass
    pub active_tips: usize,
}

/// Commands accepted by the evaluator actor
#[derive(Debug)]
pub enum EvaluatorCommand {
    /// Run an evaluation pass immediately, bypassing the interval timer
    TickNow {
        respond_to: oneshot::Sender<TickSummary>,
    },

    /// Fetch the currently active tips
    GetTips {
        respond_to: oneshot::Sender<Vec<Tip>>,
    },

    /// Gracefully shut down the actor
    Shutdown,
}
