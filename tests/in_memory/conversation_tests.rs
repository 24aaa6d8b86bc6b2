//! Conversation creation, listing, and soft-delete through the service.

use std::collections::HashSet;
use std::sync::Arc;

use rstest::rstest;
use tandem::chat::{
    domain::ConversationId,
    services::{ChatError, Resource, SendMessageRequest},
};

use super::helpers::{ChatHarness, harness};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_creates_in_both_orders_share_one_conversation(harness: ChatHarness) {
    let chat = Arc::new(harness.chat);
    let cast = harness.cast;

    let mut tasks = Vec::new();
    for round in 0..16 {
        let service = Arc::clone(&chat);
        let (requester, participant) = if round < 8 {
            (cast.ada, cast.bob)
        } else {
            (cast.bob, cast.ada)
        };
        tasks.push(tokio::spawn(async move {
            service
                .create_conversation(requester, participant)
                .await
                .map(|view| view.conversation.id())
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        let id = task
            .await
            .expect("task joins")
            .expect("create succeeds");
        ids.insert(id);
    }
    assert_eq!(ids.len(), 1);

    let listed = chat
        .list_conversations(cast.ada)
        .await
        .expect("list succeeds");
    assert_eq!(listed.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn distinct_pairs_get_distinct_conversations(harness: ChatHarness) {
    let cast = harness.cast;
    let with_bob = harness
        .chat
        .create_conversation(cast.ada, cast.bob)
        .await
        .expect("create succeeds");
    let with_cy = harness
        .chat
        .create_conversation(cast.ada, cast.cy)
        .await
        .expect("create succeeds");

    assert_ne!(with_bob.conversation.id(), with_cy.conversation.id());
    assert!(
        harness
            .chat
            .list_conversations(cast.bob)
            .await
            .expect("list succeeds")
            .iter()
            .all(|view| view.conversation.includes(cast.bob))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn views_carry_counterpart_display_data(harness: ChatHarness) {
    let cast = harness.cast;
    let view = harness
        .chat
        .create_conversation(cast.ada, cast.cy)
        .await
        .expect("create succeeds");

    assert_eq!(view.participants.len(), 2);
    let counterpart = view.counterpart().expect("counterpart present");
    assert_eq!(counterpart.id, cast.cy);
    assert_eq!(counterpart.name, "Cy Twombly");
    assert!(view.last_message.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_conversation_is_not_found(harness: ChatHarness) {
    let missing = ConversationId::new();
    let result = harness
        .chat
        .get_conversation(missing, harness.cast.ada)
        .await;

    assert!(matches!(
        result,
        Err(ChatError::NotFound(Resource::Conversation(id))) if id == missing
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_hides_the_conversation_from_both_participants(harness: ChatHarness) {
    let cast = harness.cast;
    let conversation_id = harness
        .chat
        .create_conversation(cast.ada, cast.bob)
        .await
        .expect("create succeeds")
        .conversation
        .id();
    harness
        .chat
        .send_message(conversation_id, cast.ada, SendMessageRequest::text("bye"))
        .await
        .expect("send succeeds");
    let events_before = harness.publisher.events().len();

    harness
        .chat
        .delete_conversation(conversation_id, cast.bob)
        .await
        .expect("delete succeeds");

    for user in [cast.ada, cast.bob] {
        assert!(
            harness
                .chat
                .list_conversations(user)
                .await
                .expect("list succeeds")
                .is_empty()
        );
    }
    assert!(matches!(
        harness
            .chat
            .send_message(conversation_id, cast.ada, SendMessageRequest::text("hello?"))
            .await,
        Err(ChatError::NotFound(_))
    ));
    assert_eq!(harness.publisher.events().len(), events_before);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn outsider_cannot_delete(harness: ChatHarness) {
    let cast = harness.cast;
    let conversation_id = harness
        .chat
        .create_conversation(cast.ada, cast.bob)
        .await
        .expect("create succeeds")
        .conversation
        .id();

    let result = harness.chat.delete_conversation(conversation_id, cast.cy).await;

    assert!(matches!(result, Err(ChatError::NotFound(_))));
    assert!(
        harness
            .chat
            .get_conversation(conversation_id, cast.ada)
            .await
            .is_ok()
    );
}
