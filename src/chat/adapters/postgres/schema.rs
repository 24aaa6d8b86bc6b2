//! Diesel schema for chat persistence.

diesel::table! {
    /// Two-party conversation summaries.
    conversations (id) {
        /// Conversation identifier.
        id -> Uuid,
        /// Participant with the smaller identifier.
        participant_low -> Uuid,
        /// Participant with the larger identifier.
        participant_high -> Uuid,
        /// Most recent message, if any.
        last_message_id -> Nullable<Uuid>,
        /// Sort key for conversation lists.
        last_activity -> Timestamptz,
        /// Soft-delete flag.
        is_active -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last mutation timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Messages scoped to a conversation.
    messages (id) {
        /// Message identifier.
        id -> Uuid,
        /// Owning conversation.
        conversation_id -> Uuid,
        /// Author.
        sender_id -> Uuid,
        /// Message text.
        content -> Text,
        /// Payload kind (`text`, `image`, `file`).
        #[max_length = 16]
        message_kind -> Varchar,
        /// Media reference for image and file messages.
        media_url -> Nullable<Text>,
        /// Read flag.
        is_read -> Bool,
        /// Read timestamp.
        read_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::joinable!(messages -> conversations (conversation_id));
diesel::allow_tables_to_appear_in_same_query!(conversations, messages);
