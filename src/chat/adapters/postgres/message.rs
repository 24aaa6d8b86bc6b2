//! `PostgreSQL` message repository.

use super::{ChatPgPool, models::MessageRow, schema::messages};
use crate::chat::{
    domain::{
        ConversationId, Message, MessageContent, MessageId, MessageKind, PersistedMessageData,
        UserId,
    },
    ports::{MessageRepository, MessageRepositoryError, MessageRepositoryResult, PageRequest},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL`-backed message repository.
#[derive(Debug, Clone)]
pub struct PostgresMessageRepository {
    pool: ChatPgPool,
}

impl PostgresMessageRepository {
    /// Creates a repository from a connection pool.
    #[must_use]
    pub const fn new(pool: ChatPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> MessageRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> MessageRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(MessageRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(MessageRepositoryError::persistence)?
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn store(&self, message: &Message) -> MessageRepositoryResult<()> {
        let message_id = message.id();
        let row = to_row(message);
        self.run_blocking(move |connection| {
            diesel::insert_into(messages::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        MessageRepositoryError::DuplicateMessage(message_id)
                    }
                    _ => MessageRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: MessageId) -> MessageRepositoryResult<Option<Message>> {
        self.run_blocking(move |connection| {
            let row = messages::table
                .filter(messages::id.eq(id.into_inner()))
                .select(MessageRow::as_select())
                .first::<MessageRow>(connection)
                .optional()
                .map_err(MessageRepositoryError::persistence)?;
            row.map(row_to_message).transpose()
        })
        .await
    }

    async fn page_newest_first(
        &self,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> MessageRepositoryResult<Vec<Message>> {
        let limit = i64::try_from(page.limit).map_err(MessageRepositoryError::persistence)?;
        let offset = i64::try_from(page.offset).map_err(MessageRepositoryError::persistence)?;
        self.run_blocking(move |connection| {
            let rows = messages::table
                .filter(messages::conversation_id.eq(conversation_id.into_inner()))
                .order((messages::created_at.desc(), messages::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(MessageRow::as_select())
                .load::<MessageRow>(connection)
                .map_err(MessageRepositoryError::persistence)?;
            rows.into_iter().map(row_to_message).collect()
        })
        .await
    }

    async fn mark_read(
        &self,
        id: MessageId,
        reader: UserId,
        read_at: DateTime<Utc>,
    ) -> MessageRepositoryResult<Option<Message>> {
        self.run_blocking(move |connection| {
            let row = diesel::update(
                messages::table
                    .filter(messages::id.eq(id.into_inner()))
                    .filter(messages::is_read.eq(false))
                    .filter(messages::sender_id.ne(reader.into_inner())),
            )
            .set((
                messages::is_read.eq(true),
                messages::read_at.eq(Some(read_at)),
            ))
            .returning(MessageRow::as_returning())
            .get_result::<MessageRow>(connection)
            .optional()
            .map_err(MessageRepositoryError::persistence)?;
            row.map(row_to_message).transpose()
        })
        .await
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        read_at: DateTime<Utc>,
    ) -> MessageRepositoryResult<Vec<Message>> {
        self.run_blocking(move |connection| {
            let rows = diesel::update(
                messages::table
                    .filter(messages::conversation_id.eq(conversation_id.into_inner()))
                    .filter(messages::is_read.eq(false))
                    .filter(messages::sender_id.ne(reader.into_inner())),
            )
            .set((
                messages::is_read.eq(true),
                messages::read_at.eq(Some(read_at)),
            ))
            .returning(MessageRow::as_returning())
            .get_results::<MessageRow>(connection)
            .map_err(MessageRepositoryError::persistence)?;
            let mut transitioned = rows
                .into_iter()
                .map(row_to_message)
                .collect::<MessageRepositoryResult<Vec<_>>>()?;
            transitioned.sort_by_key(Message::created_at);
            Ok(transitioned)
        })
        .await
    }

    async fn count_unread(
        &self,
        conversation_ids: &[ConversationId],
        reader: UserId,
    ) -> MessageRepositoryResult<u64> {
        if conversation_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<uuid::Uuid> = conversation_ids
            .iter()
            .map(|id| id.into_inner())
            .collect();
        self.run_blocking(move |connection| {
            let count = messages::table
                .filter(messages::conversation_id.eq_any(ids))
                .filter(messages::is_read.eq(false))
                .filter(messages::sender_id.ne(reader.into_inner()))
                .count()
                .get_result::<i64>(connection)
                .map_err(MessageRepositoryError::persistence)?;
            u64::try_from(count).map_err(MessageRepositoryError::persistence)
        })
        .await
    }
}

fn to_row(message: &Message) -> MessageRow {
    MessageRow {
        id: message.id().into_inner(),
        conversation_id: message.conversation_id().into_inner(),
        sender_id: message.sender_id().into_inner(),
        content: message.content().as_str().to_owned(),
        message_kind: message.kind().as_str().to_owned(),
        media_url: message.media_url().map(str::to_owned),
        is_read: message.is_read(),
        read_at: message.read_at(),
        created_at: message.created_at(),
    }
}

fn row_to_message(row: MessageRow) -> MessageRepositoryResult<Message> {
    let kind =
        MessageKind::try_from(row.message_kind.as_str()).map_err(MessageRepositoryError::persistence)?;
    // Stored content was validated on the way in; only emptiness is rechecked.
    let content =
        MessageContent::new(&row.content, usize::MAX).map_err(MessageRepositoryError::persistence)?;

    Ok(Message::from_persisted(PersistedMessageData {
        id: MessageId::from_uuid(row.id),
        conversation_id: ConversationId::from_uuid(row.conversation_id),
        sender_id: UserId::from_uuid(row.sender_id),
        content,
        kind,
        media_url: row.media_url,
        is_read: row.is_read,
        read_at: row.read_at,
        created_at: row.created_at,
    }))
}
