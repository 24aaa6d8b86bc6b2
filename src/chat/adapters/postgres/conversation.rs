//! `PostgreSQL` conversation repository.

use super::{ChatPgPool, models::ConversationRow, schema::conversations};
use crate::chat::{
    domain::{
        Conversation, ConversationId, MessageId, ParticipantPair, PersistedConversationData,
        UserId,
    },
    ports::{ConversationRepository, ConversationRepositoryError, ConversationRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL`-backed conversation repository.
#[derive(Debug, Clone)]
pub struct PostgresConversationRepository {
    pool: ChatPgPool,
}

impl PostgresConversationRepository {
    /// Creates a repository from a connection pool.
    #[must_use]
    pub const fn new(pool: ChatPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ConversationRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ConversationRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(ConversationRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ConversationRepositoryError::persistence)?
    }
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn store(&self, conversation: &Conversation) -> ConversationRepositoryResult<()> {
        let conversation_id = conversation.id();
        let pair = conversation.participants();
        let row = to_row(conversation);

        self.run_blocking(move |connection| {
            diesel::insert_into(conversations::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if is_pair_unique_violation(info.as_ref()) =>
                    {
                        ConversationRepositoryError::DuplicatePair(pair)
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        ConversationRepositoryError::DuplicateConversation(conversation_id)
                    }
                    _ => ConversationRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> ConversationRepositoryResult<Option<Conversation>> {
        self.run_blocking(move |connection| {
            let row = conversations::table
                .filter(conversations::id.eq(id.into_inner()))
                .select(ConversationRow::as_select())
                .first::<ConversationRow>(connection)
                .optional()
                .map_err(ConversationRepositoryError::persistence)?;
            row.map(row_to_conversation).transpose()
        })
        .await
    }

    async fn find_by_participants(
        &self,
        participants: ParticipantPair,
    ) -> ConversationRepositoryResult<Option<Conversation>> {
        self.run_blocking(move |connection| {
            let row = conversations::table
                .filter(conversations::participant_low.eq(participants.low().into_inner()))
                .filter(conversations::participant_high.eq(participants.high().into_inner()))
                .select(ConversationRow::as_select())
                .first::<ConversationRow>(connection)
                .optional()
                .map_err(ConversationRepositoryError::persistence)?;
            row.map(row_to_conversation).transpose()
        })
        .await
    }

    async fn list_active_for_user(
        &self,
        user: UserId,
    ) -> ConversationRepositoryResult<Vec<Conversation>> {
        self.run_blocking(move |connection| {
            let user_uuid = user.into_inner();
            let rows = conversations::table
                .filter(conversations::is_active.eq(true))
                .filter(
                    conversations::participant_low
                        .eq(user_uuid)
                        .or(conversations::participant_high.eq(user_uuid)),
                )
                .order(conversations::last_activity.desc())
                .select(ConversationRow::as_select())
                .load::<ConversationRow>(connection)
                .map_err(ConversationRepositoryError::persistence)?;
            rows.into_iter().map(row_to_conversation).collect()
        })
        .await
    }

    async fn record_message(
        &self,
        id: ConversationId,
        message_id: MessageId,
        sent_at: DateTime<Utc>,
    ) -> ConversationRepositoryResult<Conversation> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, ConversationRepositoryError, _>(|tx| {
                // The guard keeps a delayed or retried write from pulling the
                // summary back to an older message.
                diesel::update(
                    conversations::table
                        .filter(conversations::id.eq(id.into_inner()))
                        .filter(
                            conversations::last_message_id
                                .is_null()
                                .or(conversations::last_activity.le(sent_at)),
                        ),
                )
                .set((
                    conversations::last_message_id.eq(Some(message_id.into_inner())),
                    conversations::last_activity.eq(sent_at),
                    conversations::updated_at.eq(sent_at),
                ))
                .execute(tx)
                .map_err(ConversationRepositoryError::persistence)?;

                let row = conversations::table
                    .filter(conversations::id.eq(id.into_inner()))
                    .select(ConversationRow::as_select())
                    .first::<ConversationRow>(tx)
                    .optional()
                    .map_err(ConversationRepositoryError::persistence)?
                    .ok_or(ConversationRepositoryError::NotFound(id))?;
                row_to_conversation(row)
            })
        })
        .await
    }

    async fn set_active(
        &self,
        id: ConversationId,
        active: bool,
        at: DateTime<Utc>,
    ) -> ConversationRepositoryResult<Conversation> {
        self.run_blocking(move |connection| {
            let row = diesel::update(conversations::table.filter(conversations::id.eq(id.into_inner())))
                .set((
                    conversations::is_active.eq(active),
                    conversations::updated_at.eq(at),
                ))
                .returning(ConversationRow::as_returning())
                .get_result::<ConversationRow>(connection)
                .optional()
                .map_err(ConversationRepositoryError::persistence)?
                .ok_or(ConversationRepositoryError::NotFound(id))?;
            row_to_conversation(row)
        })
        .await
    }
}

fn to_row(conversation: &Conversation) -> ConversationRow {
    let pair = conversation.participants();
    ConversationRow {
        id: conversation.id().into_inner(),
        participant_low: pair.low().into_inner(),
        participant_high: pair.high().into_inner(),
        last_message_id: conversation.last_message_id().map(MessageId::into_inner),
        last_activity: conversation.last_activity(),
        is_active: conversation.is_active(),
        created_at: conversation.created_at(),
        updated_at: conversation.updated_at(),
    }
}

fn row_to_conversation(row: ConversationRow) -> ConversationRepositoryResult<Conversation> {
    let participants = ParticipantPair::new(
        UserId::from_uuid(row.participant_low),
        UserId::from_uuid(row.participant_high),
    )
    .map_err(ConversationRepositoryError::persistence)?;

    Ok(Conversation::from_persisted(PersistedConversationData {
        id: ConversationId::from_uuid(row.id),
        participants,
        last_message_id: row.last_message_id.map(MessageId::from_uuid),
        last_activity: row.last_activity,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

fn is_pair_unique_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == "idx_conversations_participant_pair")
}

impl From<DieselError> for ConversationRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}
