//! Shared state passed to all API handlers

use std::sync::Arc;

use crate::actors::EvaluatorHandle;
use crate::config::Thresholds;
use crate::events::EventRecorder;
use crate::ledger::JobLedger;
use crate::registry::AgentRegistry;
use crate::storage::StorageBackend;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: AgentRegistry,

    pub ledger: JobLedger,

    pub events: EventRecorder,

    /// Handle to the evaluator actor, used for on-demand ticks and tips
    pub evaluator: EvaluatorHandle,

    /// Direct storage access for read paths (health check, snapshots)
    pub storage: Arc<dyn StorageBackend>,

    pub thresholds: Thresholds,
}

impl ApiState {
    pub fn new(
        registry: AgentRegistry,
        ledger: JobLedger,
        events: EventRecorder,
        evaluator: EvaluatorHandle,
        storage: Arc<dyn StorageBackend>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            registry,
            ledger,
            events,
            evaluator,
            storage,
            thresholds,
        }
    }
}
