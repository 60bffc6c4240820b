//! API route handlers

pub mod agents;
pub mod events;
pub mod health;
pub mod stats;
