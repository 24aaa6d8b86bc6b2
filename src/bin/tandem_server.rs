//! Runs the realtime chat server.
//!
//! Settings come from the command line or the environment (a `.env` file is
//! honoured):
//!
//! ```text
//! TANDEM_USERS_FILE=users.json TANDEM_LISTEN_ADDR=0.0.0.0:9001 tandem_server
//! ```
//!
//! Without `DATABASE_URL` conversations and messages live in memory and are
//! lost on exit. With it, the schema under `migrations/` must already be
//! applied (for example with `diesel migration run`); the server does not
//! migrate on startup.

use clap::Parser;
use mockable::DefaultClock;
use std::sync::Arc;
use tandem::{
    chat::{
        adapters::{
            memory::{
                InMemoryConversationRepository, InMemoryMessageRepository, InMemoryUserDirectory,
                seed,
            },
            postgres::{PostgresConversationRepository, PostgresMessageRepository, build_pool},
        },
        events::EventBus,
        ports::{ConversationRepository, MessageRepository},
        services::{ChatApi, ChatService},
    },
    config::{ChatConfig, ServerConfig},
    gateway::{GatewayServer, RealtimeGateway},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = ServerConfig::parse();
    let chat_config = settings.chat_config();
    let (users, identity) = seed::load_seed(&settings.users_file)?;
    let directory = Arc::new(users);
    let bus = Arc::new(EventBus::new(chat_config.event_bus_capacity));

    let chat: Arc<dyn ChatApi> = if let Some(url) = settings.database_url.as_deref() {
        let pool = build_pool(url, settings.db_pool_size)?;
        info!("using PostgreSQL stores");
        assemble(
            Arc::new(PostgresConversationRepository::new(pool.clone())),
            Arc::new(PostgresMessageRepository::new(pool)),
            Arc::clone(&directory),
            Arc::clone(&bus),
            chat_config.clone(),
        )
    } else {
        info!("using in-memory stores");
        assemble(
            Arc::new(InMemoryConversationRepository::new()),
            Arc::new(InMemoryMessageRepository::new()),
            Arc::clone(&directory),
            Arc::clone(&bus),
            chat_config.clone(),
        )
    };

    let gateway = Arc::new(RealtimeGateway::new(
        chat,
        Arc::new(identity),
        directory,
        &chat_config,
    ));
    let dispatch_gateway = Arc::clone(&gateway);
    let subscription = bus.subscribe();
    let dispatcher = tokio::spawn(async move { dispatch_gateway.run_dispatch(subscription).await });

    let server = GatewayServer::bind(settings.listen_addr, gateway).await?;
    tokio::select! {
        result = server.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutdown requested");
        }
    }
    dispatcher.abort();
    Ok(())
}

fn assemble<CR, MR>(
    conversations: Arc<CR>,
    messages: Arc<MR>,
    directory: Arc<InMemoryUserDirectory>,
    bus: Arc<EventBus>,
    config: ChatConfig,
) -> Arc<dyn ChatApi>
where
    CR: ConversationRepository + 'static,
    MR: MessageRepository + 'static,
{
    Arc::new(ChatService::new(
        conversations,
        messages,
        directory,
        bus,
        Arc::new(DefaultClock),
        config,
    ))
}
