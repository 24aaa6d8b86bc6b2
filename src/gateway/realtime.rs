//! The realtime gateway: handshake, request dispatch, typing relay, and
//! scoped fan-out of chat events.

use super::{
    ChatRequest, ClientFrame, ConnectionHandle, ConnectionPhase, ConnectionRegistry, ErrorBody,
    GatewayError, GatewayResult, ServerFrame, Session,
};
use crate::{
    chat::{
        domain::{ChatEvent, ConversationId, MessageKind, UserId},
        events::EventSubscription,
        ports::{IdentityError, IdentityVerifier, UserDirectory},
        services::{ChatApi, ChatResult, MessagePage, SendMessageRequest},
    },
    config::ChatConfig,
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Accepts authenticated connections and routes chat traffic to them.
///
/// The gateway never touches the stores: requests go through [`ChatApi`],
/// and pushes are driven by events from the [`EventBus`](crate::chat::events::EventBus).
pub struct RealtimeGateway {
    chat: Arc<dyn ChatApi>,
    identity: Arc<dyn IdentityVerifier>,
    directory: Arc<dyn UserDirectory>,
    registry: ConnectionRegistry,
    outbound_capacity: usize,
    lookup_timeout: Duration,
}

impl RealtimeGateway {
    /// Creates a gateway with an empty registry.
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatApi>,
        identity: Arc<dyn IdentityVerifier>,
        directory: Arc<dyn UserDirectory>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            chat,
            identity,
            directory,
            registry: ConnectionRegistry::new(),
            outbound_capacity: config.outbound_queue_capacity.max(1),
            lookup_timeout: config.store_timeout,
        }
    }

    /// Returns the connection registry.
    #[must_use]
    pub const fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Verifies the handshake credential and registers the connection.
    ///
    /// On success the session is [`ConnectionPhase::Active`] and the returned
    /// receiver yields every frame destined for the socket.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] for a missing or rejected
    /// credential and [`GatewayError::IdentityUnavailable`] when the identity
    /// provider does not answer in time. A rejected connection is never
    /// registered.
    pub async fn connect(
        &self,
        credential: Option<&str>,
    ) -> GatewayResult<(Session, mpsc::Receiver<ServerFrame>)> {
        let (sender, receiver) = mpsc::channel(self.outbound_capacity);
        let mut session = Session::connecting(sender);
        let connection_id = session.connection_id();

        let user_id = match self.verify(credential).await {
            Ok(user_id) => user_id,
            Err(err) => {
                session.transition(ConnectionPhase::Disconnected)?;
                info!(%connection_id, error = %err, "connection rejected");
                return Err(err);
            }
        };
        let user_name = self.display_name(user_id).await;
        session.authenticate(user_id, user_name)?;

        let handle = ConnectionHandle::new(connection_id, session.sender());
        if let Some(previous) = self.registry.register(user_id, handle) {
            info!(%user_id, replaced = %previous.id(), "newer connection replaces registry entry");
        }
        session.transition(ConnectionPhase::Active)?;
        info!(%connection_id, %user_id, "connection active");
        Ok((session, receiver))
    }

    /// Deregisters the session, unless a newer connection for the same user
    /// has taken its place, and marks it disconnected.
    pub fn disconnect(&self, session: &mut Session) {
        if session.phase() == ConnectionPhase::Disconnected {
            return;
        }
        if let Some(user_id) = session.user_id() {
            let removed = self.registry.unregister(user_id, session.connection_id());
            debug!(connection_id = %session.connection_id(), %user_id, removed, "connection deregistered");
        }
        if let Err(err) = session.transition(ConnectionPhase::Disconnected) {
            warn!(error = %err, "unexpected disconnect transition failure");
        }
        info!(connection_id = %session.connection_id(), "connection closed");
    }

    /// Parses and handles one text frame, returning the reply to send back
    /// on the same connection, if any.
    pub async fn handle_text(&self, session: &Session, text: &str) -> Option<ServerFrame> {
        match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => self.handle_frame(session, frame).await,
            Err(err) => {
                debug!(connection_id = %session.connection_id(), error = %err, "malformed frame");
                Some(ServerFrame::error("protocol", err.to_string()))
            }
        }
    }

    /// Handles one decoded client frame.
    pub async fn handle_frame(&self, session: &Session, frame: ClientFrame) -> Option<ServerFrame> {
        let user_id = match session.active_user() {
            Ok(user_id) => user_id,
            Err(err) => return Some(ServerFrame::error(err.code(), err.to_string())),
        };
        match frame {
            ClientFrame::TypingStart { conversation_id } => {
                self.relay_typing(session, user_id, conversation_id, true)
                    .await;
                None
            }
            ClientFrame::TypingStop { conversation_id } => {
                self.relay_typing(session, user_id, conversation_id, false)
                    .await;
                None
            }
            ClientFrame::Request { id, op } => Some(self.handle_request(user_id, id, op).await),
        }
    }

    /// Pushes one event to the connected participants it concerns and
    /// returns how many connections accepted it.
    #[must_use]
    pub fn dispatch(&self, event: ChatEvent) -> usize {
        let mut delivered = 0;
        match event {
            ChatEvent::MessageSent {
                conversation_id,
                participants,
                message,
            } => {
                for user in participants.members() {
                    let frame = ServerFrame::NewMessage {
                        conversation_id,
                        message: message.clone(),
                    };
                    delivered += usize::from(self.registry.deliver(user, frame));
                }
            }
            ChatEvent::ConversationUpdated {
                sender_id,
                first_message,
                views,
                ..
            } => {
                for view in views {
                    let viewer = view.viewer;
                    let frame = if first_message && viewer != sender_id {
                        ServerFrame::NewConversation { conversation: view }
                    } else {
                        ServerFrame::ConversationUpdated { conversation: view }
                    };
                    delivered += usize::from(self.registry.deliver(viewer, frame));
                }
            }
            ChatEvent::MessageRead {
                conversation_id,
                participants,
                message_id,
                read_by,
                read_at,
            } => {
                for user in participants.members() {
                    let frame = ServerFrame::MessageRead {
                        conversation_id,
                        message_id,
                        read_by,
                        read_at,
                    };
                    delivered += usize::from(self.registry.deliver(user, frame));
                }
            }
        }
        delivered
    }

    /// Drains `subscription`, dispatching each event, until the bus closes.
    pub async fn run_dispatch(&self, mut subscription: EventSubscription) {
        while let Some(event) = subscription.next().await {
            let name = event.name();
            let conversation_id = event.conversation_id();
            let delivered = self.dispatch(event);
            debug!(event = name, %conversation_id, delivered, "event dispatched");
        }
        info!("event bus closed; dispatch loop finished");
    }

    async fn verify(&self, credential: Option<&str>) -> GatewayResult<UserId> {
        let token = credential
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| GatewayError::Unauthorized("missing credential".to_owned()))?;
        match tokio::time::timeout(self.lookup_timeout, self.identity.verify(token)).await {
            Ok(Ok(user_id)) => Ok(user_id),
            Ok(Err(IdentityError::InvalidCredential)) => {
                Err(GatewayError::Unauthorized("invalid credential".to_owned()))
            }
            Ok(Err(IdentityError::Unavailable(err))) => {
                Err(GatewayError::IdentityUnavailable(err.to_string()))
            }
            Err(_) => Err(GatewayError::IdentityUnavailable(
                "verification deadline exceeded".to_owned(),
            )),
        }
    }

    async fn display_name(&self, user_id: UserId) -> Option<String> {
        match tokio::time::timeout(self.lookup_timeout, self.directory.find_by_id(user_id)).await {
            Ok(Ok(found)) => found.map(|user| user.name),
            Ok(Err(err)) => {
                warn!(%user_id, error = %err, "display name lookup failed");
                None
            }
            Err(_) => {
                warn!(%user_id, "display name lookup timed out");
                None
            }
        }
    }

    async fn relay_typing(
        &self,
        session: &Session,
        user_id: UserId,
        conversation_id: ConversationId,
        is_typing: bool,
    ) {
        let participants = match self
            .chat
            .conversation_participants(conversation_id, user_id)
            .await
        {
            Ok(participants) => participants,
            Err(err) => {
                debug!(%conversation_id, %user_id, error = %err, "typing signal ignored");
                return;
            }
        };
        if let Some(recipient) = participants.other(user_id) {
            let frame = ServerFrame::UserTyping {
                conversation_id,
                user_id,
                user_name: session.user_name().map(str::to_owned),
                is_typing,
            };
            let delivered = self.registry.deliver(recipient, frame);
            debug!(%conversation_id, %user_id, is_typing, delivered, "typing relayed");
        }
    }

    async fn handle_request(&self, user_id: UserId, id: u64, op: ChatRequest) -> ServerFrame {
        let chat = &self.chat;
        match op {
            ChatRequest::CreateConversation { participant_id } => {
                respond(id, chat.create_conversation(user_id, participant_id).await)
            }
            ChatRequest::ListConversations => respond(id, chat.list_conversations(user_id).await),
            ChatRequest::GetConversation { conversation_id } => {
                respond(id, chat.get_conversation(conversation_id, user_id).await)
            }
            ChatRequest::SendMessage {
                conversation_id,
                content,
                message_type,
                media_url,
            } => match send_request(content, message_type.as_deref(), media_url) {
                Ok(request) => {
                    respond(id, chat.send_message(conversation_id, user_id, request).await)
                }
                Err(error) => ServerFrame::failure(id, error),
            },
            ChatRequest::GetMessages {
                conversation_id,
                limit,
                offset,
            } => {
                let page = MessagePage { limit, offset };
                respond(id, chat.get_messages(conversation_id, user_id, page).await)
            }
            ChatRequest::MarkMessageRead { message_id } => {
                respond(id, chat.mark_message_read(message_id, user_id).await)
            }
            ChatRequest::MarkConversationRead { conversation_id } => {
                respond(id, chat.mark_conversation_read(conversation_id, user_id).await)
            }
            ChatRequest::UnreadCount => respond(id, chat.get_unread_count(user_id).await),
            ChatRequest::DeleteConversation { conversation_id } => {
                respond(id, chat.delete_conversation(conversation_id, user_id).await)
            }
            ChatRequest::SearchUsers { query } => {
                respond(id, chat.search_users(&query, user_id).await)
            }
        }
    }
}

fn send_request(
    content: String,
    message_type: Option<&str>,
    media_url: Option<String>,
) -> Result<SendMessageRequest, ErrorBody> {
    let kind = message_type
        .map(MessageKind::try_from)
        .transpose()
        .map_err(|err| ErrorBody::new("invalid_argument", err.to_string(), false))?
        .unwrap_or(MessageKind::Text);
    let request = SendMessageRequest::text(content).with_kind(kind);
    Ok(match media_url {
        Some(url) => request.with_media_url(url),
        None => request,
    })
}

fn respond<T: Serialize>(id: u64, result: ChatResult<T>) -> ServerFrame {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(data) => ServerFrame::success(id, data),
            Err(err) => ServerFrame::failure(id, ErrorBody::new("internal", err.to_string(), false)),
        },
        Err(err) => ServerFrame::failure(id, ErrorBody::from(&err)),
    }
}
