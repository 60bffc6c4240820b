//! Actor-based evaluation pipeline
//!
//! The hub runs one long-lived evaluator actor as an independent async
//! task, controlled through a typed handle over an mpsc command channel.
//! Request/response exchanges use oneshot channels.
//!
//! ```text
//!   +----------------+  commands   +-------------------+
//!   |   API / main   | ----------> |  EvaluatorActor   |
//!   +----------------+             +---------+---------+
//!                                            | per tick
//!                                            v
//!                         storage snapshots, events,
//!                         notifications, retention cleanup
//! ```
//!
//! The actor owns all mutable evaluation state (liveness transitions,
//! active tips); everything else reaches it through messages.

pub mod evaluator;
pub mod messages;

pub use evaluator::EvaluatorHandle;
