//! Application services for two-party chat.

mod api;
mod chat;
mod error;

pub use api::ChatApi;
pub use chat::{ChatService, MessagePage, SendMessageRequest};
pub use error::{ChatError, ChatResult, Resource};
