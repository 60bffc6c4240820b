//! Storage backends for agent, job, event and notification records
//!
//! This module provides a trait-based abstraction over the record store.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio actors
//! - **Snapshot reads**: `agent_snapshot` gives the evaluator a consistent
//!   per-agent view so metrics are never computed against a half-updated
//!   record set
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database, good for small/medium fleets
//! - **In-Memory** (fallback): No persistence, for testing or ephemeral runs

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{
    AgentConfig, AgentFilter, AgentSnapshot, EventFilter, HealthStatus, JobQuery, StorageBackend,
};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
#[cfg(feature = "storage-sqlite")]
pub use sqlite::SqliteBackend;
