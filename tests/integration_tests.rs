//! Integration tests for the hub's registry, ledger and evaluator

#[path = "integration/helpers.rs"]
mod helpers;

#[path = "integration/registry_flow.rs"]
mod registry_flow;

#[path = "integration/evaluator_tick.rs"]
mod evaluator_tick;

#[path = "integration/concurrency.rs"]
mod concurrency;

#[path = "integration/webhook_delivery.rs"]
mod webhook_delivery;

#[cfg(feature = "storage-sqlite")]
#[path = "integration/storage_persistence.rs"]
mod storage_persistence;

#[cfg(feature = "api")]
#[path = "integration/api_endpoints.rs"]
mod api_endpoints;
