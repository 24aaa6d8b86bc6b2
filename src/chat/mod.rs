//! Two-party chat: conversations, messages, read state, and the events that
//! drive realtime delivery.
//!
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]
//! - The in-process event relay in [`events`]

pub mod adapters;
pub mod domain;
pub mod events;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
