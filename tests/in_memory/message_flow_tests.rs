//! Message sending, history, read state, and the events they produce.

use std::collections::HashSet;
use std::sync::Arc;

use rstest::rstest;
use tandem::chat::{
    domain::{ChatEvent, ConversationId, MessageId, MessageKind},
    services::{ChatError, MessagePage, SendMessageRequest},
};

use super::helpers::{ChatHarness, harness};

async fn open(harness: &ChatHarness) -> ConversationId {
    harness
        .chat
        .create_conversation(harness.cast.ada, harness.cast.bob)
        .await
        .expect("create succeeds")
        .conversation
        .id()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn paging_back_from_newest_reassembles_the_whole_history(harness: ChatHarness) {
    let conversation_id = open(&harness).await;
    let cast = harness.cast;
    let mut sent: Vec<MessageId> = Vec::new();
    let senders = [cast.ada, cast.bob, cast.bob].into_iter().cycle();
    for (index, sender) in senders.take(25).enumerate() {
        let message = harness
            .chat
            .send_message(
                conversation_id,
                sender,
                SendMessageRequest::text(format!("line {index}")),
            )
            .await
            .expect("send succeeds");
        sent.push(message.id());
    }

    let mut pages = Vec::new();
    let mut offset = 0;
    loop {
        let page = harness
            .chat
            .get_messages(conversation_id, cast.ada, MessagePage::new(10, offset))
            .await
            .expect("page succeeds");
        if page.is_empty() {
            break;
        }
        offset += page.len();
        pages.push(page);
    }

    assert_eq!(pages.len(), 3);
    let assembled: Vec<MessageId> = pages
        .iter()
        .rev()
        .flat_map(|page| page.iter().map(|message| message.id()))
        .collect();
    assert_eq!(assembled, sent);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn media_messages_round_trip_their_reference(harness: ChatHarness) {
    let conversation_id = open(&harness).await;
    let request = SendMessageRequest::text("holiday.png")
        .with_kind(MessageKind::Image)
        .with_media_url("https://cdn.example.com/holiday.png");

    let sent = harness
        .chat
        .send_message(conversation_id, harness.cast.ada, request)
        .await
        .expect("send succeeds");
    let history = harness
        .chat
        .get_messages(conversation_id, harness.cast.bob, MessagePage::default())
        .await
        .expect("history succeeds");

    assert_eq!(history, vec![sent.clone()]);
    assert_eq!(sent.kind(), MessageKind::Image);
    assert_eq!(sent.media_url(), Some("https://cdn.example.com/holiday.png"));
}

#[rstest]
#[case(SendMessageRequest::text("x".repeat(1001)))]
#[case(SendMessageRequest::text("see attached").with_kind(MessageKind::File))]
#[case(SendMessageRequest::text("hi").with_media_url("https://cdn.example.com/a.png"))]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_payloads_store_nothing(harness: ChatHarness, #[case] request: SendMessageRequest) {
    let conversation_id = open(&harness).await;

    let result = harness
        .chat
        .send_message(conversation_id, harness.cast.ada, request)
        .await;

    assert!(matches!(result, Err(ChatError::InvalidArgument(_))));
    assert!(harness.publisher.events().is_empty());
    let history = harness
        .chat
        .get_messages(conversation_id, harness.cast.ada, MessagePage::default())
        .await
        .expect("history succeeds");
    assert!(history.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_event_matches_the_state_it_reports(harness: ChatHarness) {
    let conversation_id = open(&harness).await;
    let cast = harness.cast;
    let message = harness
        .chat
        .send_message(conversation_id, cast.bob, SendMessageRequest::text("ping"))
        .await
        .expect("send succeeds");
    harness
        .chat
        .mark_message_read(message.id(), cast.ada)
        .await
        .expect("read succeeds");

    for event in harness.publisher.take() {
        assert_eq!(event.conversation_id(), conversation_id);
        match event {
            ChatEvent::MessageSent { message: sent, participants, .. } => {
                assert!(participants.contains(sent.sender_id()));
                assert_eq!(sent.id(), message.id());
            }
            ChatEvent::ConversationUpdated { views, .. } => {
                assert_eq!(views.len(), 2);
                for view in views {
                    assert_eq!(view.conversation.last_message_id(), Some(message.id()));
                }
            }
            ChatEvent::MessageRead { message_id, read_by, .. } => {
                assert_eq!(message_id, message.id());
                assert_eq!(read_by, cast.ada);
                let stored = harness
                    .chat
                    .get_messages(conversation_id, cast.bob, MessagePage::default())
                    .await
                    .expect("history succeeds");
                assert!(stored.iter().all(|m| m.is_read()));
            }
        }
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unread_count_spans_conversations_and_ignores_own_messages(harness: ChatHarness) {
    let cast = harness.cast;
    let with_bob = open(&harness).await;
    let with_cy = harness
        .chat
        .create_conversation(cast.cy, cast.ada)
        .await
        .expect("create succeeds")
        .conversation
        .id();
    for (conversation_id, sender, text) in [
        (with_bob, cast.bob, "one"),
        (with_bob, cast.bob, "two"),
        (with_cy, cast.cy, "three"),
        (with_cy, cast.ada, "mine"),
    ] {
        harness
            .chat
            .send_message(conversation_id, sender, SendMessageRequest::text(text))
            .await
            .expect("send succeeds");
    }

    assert_eq!(harness.chat.get_unread_count(cast.ada).await.expect("count"), 3);
    assert_eq!(harness.chat.get_unread_count(cast.cy).await.expect("count"), 1);

    harness
        .chat
        .mark_conversation_read(with_bob, cast.ada)
        .await
        .expect("bulk read succeeds");
    assert_eq!(harness.chat.get_unread_count(cast.ada).await.expect("count"), 1);

    harness
        .chat
        .delete_conversation(with_cy, cast.cy)
        .await
        .expect("delete succeeds");
    assert_eq!(harness.chat.get_unread_count(cast.ada).await.expect("count"), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_reads_emit_a_single_receipt(harness: ChatHarness) {
    let conversation_id = open(&harness).await;
    let cast = harness.cast;
    let message = harness
        .chat
        .send_message(conversation_id, cast.ada, SendMessageRequest::text("once"))
        .await
        .expect("send succeeds");
    harness.publisher.take();

    let (first_read, second_read) = tokio::join!(
        harness.chat.mark_message_read(message.id(), cast.bob),
        harness.chat.mark_message_read(message.id(), cast.bob),
    );

    let first = first_read.expect("read succeeds");
    let second = second_read.expect("read succeeds");
    assert_eq!(first.read_at(), second.read_at());
    let receipts = harness
        .publisher
        .take()
        .into_iter()
        .filter(|event| matches!(event, ChatEvent::MessageRead { .. }))
        .count();
    assert_eq!(receipts, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_sends_leave_the_summary_on_the_newest_message(harness: ChatHarness) {
    let conversation_id = open(&harness).await;
    let cast = harness.cast;
    let chat = Arc::new(harness.chat);

    let mut tasks = Vec::new();
    for round in 0..12 {
        let service = Arc::clone(&chat);
        tasks.push(tokio::spawn(async move {
            service
                .send_message(
                    conversation_id,
                    cast.bob,
                    SendMessageRequest::text(format!("burst {round}")),
                )
                .await
        }));
    }
    let mut sent = Vec::new();
    for task in tasks {
        sent.push(task.await.expect("task joins").expect("send succeeds"));
    }

    let newest = sent
        .iter()
        .map(|message| message.created_at())
        .max()
        .expect("messages were sent");
    let view = chat
        .get_conversation(conversation_id, cast.ada)
        .await
        .expect("conversation visible");
    let last = view.last_message.expect("summary points at a message");
    assert_eq!(last.created_at(), newest);
    assert_eq!(view.unread_count, 12);
    assert_eq!(chat.get_unread_count(cast.ada).await.expect("count"), 12);

    let history = chat
        .get_messages(conversation_id, cast.ada, MessagePage::new(100, 0))
        .await
        .expect("history loads");
    let ids: HashSet<MessageId> = history.iter().map(|message| message.id()).collect();
    assert_eq!(ids.len(), 12);
    let sent_events = harness
        .publisher
        .events()
        .iter()
        .filter(|event| matches!(event, ChatEvent::MessageSent { .. }))
        .count();
    assert_eq!(sent_events, 12);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reads_racing_sends_never_unread_or_double_count(harness: ChatHarness) {
    let conversation_id = open(&harness).await;
    let cast = harness.cast;
    let chat = Arc::new(harness.chat);
    for round in 0..5 {
        chat.send_message(
            conversation_id,
            cast.bob,
            SendMessageRequest::text(format!("before {round}")),
        )
        .await
        .expect("send succeeds");
    }

    let sender = Arc::clone(&chat);
    let sends = tokio::spawn(async move {
        for round in 0..10 {
            sender
                .send_message(
                    conversation_id,
                    cast.bob,
                    SendMessageRequest::text(format!("during {round}")),
                )
                .await
                .expect("send succeeds");
            tokio::task::yield_now().await;
        }
    });
    let reader = Arc::clone(&chat);
    let reads = tokio::spawn(async move {
        for _ in 0..10 {
            reader
                .mark_conversation_read(conversation_id, cast.ada)
                .await
                .expect("read succeeds");
            tokio::task::yield_now().await;
        }
    });
    sends.await.expect("sender joins");
    reads.await.expect("reader joins");

    let receipts: Vec<MessageId> = harness
        .publisher
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ChatEvent::MessageRead { message_id, .. } => Some(message_id),
            _ => None,
        })
        .collect();
    let receipted: HashSet<MessageId> = receipts.iter().copied().collect();
    assert_eq!(receipted.len(), receipts.len(), "a message was read twice");

    let history = chat
        .get_messages(conversation_id, cast.ada, MessagePage::new(100, 0))
        .await
        .expect("history loads");
    assert_eq!(history.len(), 15);
    for message in &history {
        assert_eq!(message.is_read(), receipted.contains(&message.id()));
    }
    let still_unread = history.iter().filter(|message| !message.is_read()).count();
    let unread = chat.get_unread_count(cast.ada).await.expect("count");
    assert_eq!(usize::try_from(unread).expect("count fits"), still_unread);

    chat.mark_conversation_read(conversation_id, cast.ada)
        .await
        .expect("read succeeds");
    assert_eq!(chat.get_unread_count(cast.ada).await.expect("count"), 0);
    let total_receipts = harness
        .publisher
        .events()
        .iter()
        .filter(|event| matches!(event, ChatEvent::MessageRead { .. }))
        .count();
    assert_eq!(total_receipts, 15);
}
