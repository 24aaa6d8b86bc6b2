//! Configuration for the chat core and the server binary.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the chat service and realtime gateway.
///
/// # Examples
///
/// ```
/// use tandem::config::ChatConfig;
///
/// let config = ChatConfig::default();
/// assert_eq!(config.max_content_chars, 1000);
/// assert_eq!(config.default_page_size, 50);
/// ```
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Maximum message length in characters.
    pub max_content_chars: usize,
    /// Page size used when a caller omits `limit`.
    pub default_page_size: usize,
    /// Upper bound applied to caller-supplied `limit`.
    pub max_page_size: usize,
    /// Shortest user search query that reaches the directory.
    pub min_search_chars: usize,
    /// Deadline for each store or directory call.
    pub store_timeout: Duration,
    /// Inline attempts at updating the conversation summary after a send.
    pub summary_retry_attempts: u32,
    /// Delay between inline summary attempts, and the first background delay.
    pub summary_retry_backoff: Duration,
    /// Background attempts once inline summary updates are exhausted.
    pub summary_repair_attempts: u32,
    /// Events buffered per event-bus subscriber.
    pub event_bus_capacity: usize,
    /// Frames buffered per connection before pushes to it are dropped.
    pub outbound_queue_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 1000,
            default_page_size: 50,
            max_page_size: 100,
            min_search_chars: 2,
            store_timeout: Duration::from_secs(5),
            summary_retry_attempts: 3,
            summary_retry_backoff: Duration::from_millis(50),
            summary_repair_attempts: 10,
            event_bus_capacity: 1024,
            outbound_queue_capacity: 64,
        }
    }
}

impl ChatConfig {
    /// Creates a configuration with tighter limits for constrained hosts.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_content_chars: 500,
            default_page_size: 20,
            max_page_size: 50,
            min_search_chars: 3,
            store_timeout: Duration::from_secs(2),
            summary_retry_attempts: 2,
            summary_retry_backoff: Duration::from_millis(25),
            summary_repair_attempts: 5,
            event_bus_capacity: 256,
            outbound_queue_capacity: 32,
        }
    }

    /// Sets the store deadline.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

/// Command-line and environment settings for `tandem_server`.
#[derive(Debug, Clone, Parser)]
#[command(name = "tandem_server", version, about = "Realtime two-party chat server")]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    #[arg(long, env = "TANDEM_LISTEN_ADDR", default_value = "127.0.0.1:9001")]
    pub listen_addr: SocketAddr,

    /// `PostgreSQL` connection string; in-memory stores are used when absent.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum pooled database connections.
    #[arg(long, env = "TANDEM_DB_POOL_SIZE", default_value_t = 8)]
    pub db_pool_size: u32,

    /// JSON file listing users and their bearer tokens.
    #[arg(long, env = "TANDEM_USERS_FILE", value_name = "FILE")]
    pub users_file: PathBuf,

    /// Deadline for each store call, in milliseconds.
    #[arg(long, env = "TANDEM_STORE_TIMEOUT_MS", default_value_t = 5000)]
    pub store_timeout_ms: u64,

    /// Use the tighter [`ChatConfig::strict`] limits.
    #[arg(long, env = "TANDEM_STRICT_LIMITS")]
    pub strict_limits: bool,
}

impl ServerConfig {
    /// Derives the chat tunables from the server settings.
    #[must_use]
    pub fn chat_config(&self) -> ChatConfig {
        let base = if self.strict_limits {
            ChatConfig::strict()
        } else {
            ChatConfig::default()
        };
        base.with_store_timeout(Duration::from_millis(self.store_timeout_ms))
    }
}
