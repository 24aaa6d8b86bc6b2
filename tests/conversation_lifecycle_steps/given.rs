//! Given steps for conversation lifecycle BDD scenarios.

use super::world::{ConversationWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use tandem::chat::services::SendMessageRequest;

#[given(r#"users "{first}" and "{second}" are registered"#)]
fn users_registered(world: &mut ConversationWorld, first: String, second: String) {
    world.register(&first);
    world.register(&second);
}

#[given(r#""{requester}" has opened a conversation with "{participant}""#)]
fn conversation_opened(
    world: &mut ConversationWorld,
    requester: String,
    participant: String,
) -> Result<(), eyre::Report> {
    let from = world.user(&requester)?;
    let to = world.user(&participant)?;
    let view = run_async(world.service.create_conversation(from, to))
        .wrap_err("open conversation in scenario setup")?;
    world.openings.push(view);
    Ok(())
}

#[given(r#""{sender}" has sent "{content}""#)]
fn message_sent(
    world: &mut ConversationWorld,
    sender: String,
    content: String,
) -> Result<(), eyre::Report> {
    let from = world.user(&sender)?;
    let conversation_id = world.conversation_id()?;
    run_async(
        world
            .service
            .send_message(conversation_id, from, SendMessageRequest::text(content)),
    )
    .wrap_err("send message in scenario setup")?;
    Ok(())
}

#[given(r#""{requester}" has deleted the conversation"#)]
fn conversation_deleted(
    world: &mut ConversationWorld,
    requester: String,
) -> Result<(), eyre::Report> {
    let by = world.user(&requester)?;
    let conversation_id = world.conversation_id()?;
    run_async(world.service.delete_conversation(conversation_id, by))
        .wrap_err("delete conversation in scenario setup")?;
    Ok(())
}
