//! When steps for conversation lifecycle BDD scenarios.

use super::world::{ConversationWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use tandem::chat::services::SendMessageRequest;

#[when(r#""{requester}" opens a conversation with "{participant}""#)]
fn open_conversation(
    world: &mut ConversationWorld,
    requester: String,
    participant: String,
) -> Result<(), eyre::Report> {
    let from = world.user(&requester)?;
    let to = world.user(&participant)?;
    let view = run_async(world.service.create_conversation(from, to))
        .wrap_err("open conversation")?;
    world.openings.push(view);
    Ok(())
}

#[when(r#""{sender}" sends "{content}""#)]
fn send_message(
    world: &mut ConversationWorld,
    sender: String,
    content: String,
) -> Result<(), eyre::Report> {
    let from = world.user(&sender)?;
    let conversation_id = world.conversation_id()?;
    let result = run_async(world.service.send_message(
        conversation_id,
        from,
        SendMessageRequest::text(content),
    ));
    world.last_send = Some(result);
    Ok(())
}

#[when(r#""{reader}" reads the conversation"#)]
fn read_conversation(world: &mut ConversationWorld, reader: String) -> Result<(), eyre::Report> {
    let by = world.user(&reader)?;
    let conversation_id = world.conversation_id()?;
    run_async(world.service.mark_conversation_read(conversation_id, by))
        .wrap_err("mark conversation read")?;
    Ok(())
}
