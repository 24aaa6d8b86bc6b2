//! Then steps for conversation lifecycle BDD scenarios.

use super::world::{ConversationWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::then;
use tandem::chat::{domain::ChatEvent, services::ChatError};

#[then("both openings resolve to the same conversation")]
fn same_conversation(world: &ConversationWorld) -> Result<(), eyre::Report> {
    let ids: Vec<_> = world
        .openings
        .iter()
        .map(|view| view.conversation.id())
        .collect();
    let Some((first, rest)) = ids.split_first() else {
        return Err(eyre::eyre!("no conversation has been opened"));
    };
    if rest.is_empty() || rest.iter().any(|id| id != first) {
        return Err(eyre::eyre!("expected repeated openings of one conversation, got {ids:?}"));
    }
    Ok(())
}

#[then(r#"the unread count for "{user}" is {count:u64}"#)]
fn unread_count_is(world: &ConversationWorld, user: String, count: u64) -> Result<(), eyre::Report> {
    let id = world.user(&user)?;
    let actual = run_async(world.service.get_unread_count(id)).wrap_err("count unread")?;
    if actual != count {
        return Err(eyre::eyre!("expected {count} unread for {user}, found {actual}"));
    }
    Ok(())
}

#[then("{count:usize} read receipts were published")]
fn read_receipts_published(world: &ConversationWorld, count: usize) -> Result<(), eyre::Report> {
    let receipts = world
        .events
        .snapshot()
        .iter()
        .filter(|event| matches!(event, ChatEvent::MessageRead { .. }))
        .count();
    if receipts != count {
        return Err(eyre::eyre!("expected {count} read receipts, found {receipts}"));
    }
    Ok(())
}

#[then("the send is rejected as invalid")]
fn send_rejected(world: &ConversationWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_send
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no message was sent"))?;
    if !matches!(result, Err(ChatError::InvalidArgument(_))) {
        return Err(eyre::eyre!("expected an invalid argument error, got {result:?}"));
    }
    Ok(())
}

#[then("no events were published")]
fn no_events(world: &ConversationWorld) -> Result<(), eyre::Report> {
    let events = world.events.snapshot();
    if !events.is_empty() {
        return Err(eyre::eyre!("expected no events, got {events:?}"));
    }
    Ok(())
}

#[then("the conversation is active with its last message intact")]
fn conversation_revived(world: &ConversationWorld) -> Result<(), eyre::Report> {
    let view = world
        .openings
        .last()
        .ok_or_else(|| eyre::eyre!("no conversation has been opened"))?;
    if !view.conversation.is_active() {
        return Err(eyre::eyre!("conversation is still inactive"));
    }
    let content = view
        .last_message
        .as_ref()
        .map(|message| message.content().as_str());
    if content != Some("hello") {
        return Err(eyre::eyre!("expected last message \"hello\", found {content:?}"));
    }
    Ok(())
}
