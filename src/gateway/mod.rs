//! Realtime transport for the chat subsystem.
//!
//! The gateway authenticates sockets, keeps the [`ConnectionRegistry`] of who
//! is online, answers chat requests made over the socket, relays typing
//! signals to the other participant, and fans chat events out to the two
//! participants they concern. Delivery is best effort: offline users miss
//! pushes and reconcile by re-fetching.

mod connection;
mod error;
mod protocol;
mod realtime;
mod registry;
mod server;

pub use connection::{ConnectionId, ConnectionPhase, Session};
pub use error::{GatewayError, GatewayResult};
pub use protocol::{ChatRequest, ClientFrame, ErrorBody, ServerFrame};
pub use realtime::RealtimeGateway;
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use server::{GatewayServer, bearer_credential};

#[cfg(test)]
mod tests;
