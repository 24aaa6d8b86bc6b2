//! Adapters implementing the chat ports.
//!
//! - [`memory`]: lock-guarded in-memory stores, directory, and verifier
//! - [`postgres`]: Diesel-backed conversation and message stores

pub mod memory;
pub mod postgres;
