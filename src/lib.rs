//! Tandem: realtime two-party chat.
//!
//! This crate provides durable two-party conversations with per-message read
//! state, and a WebSocket gateway that pushes new messages, read receipts,
//! conversation updates, and typing signals to connected participants.
//!
//! # Architecture
//!
//! Tandem follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (in-memory, `PostgreSQL`)
//!
//! # Modules
//!
//! - [`chat`]: Conversations, messages, the chat service, and the event bus
//! - [`gateway`]: Connection registry and realtime WebSocket transport
//! - [`config`]: Service tunables and server settings

pub mod chat;
pub mod config;
pub mod gateway;
