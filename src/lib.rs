pub mod audit;
pub mod commands;
pub mod config;
pub mod data;
pub mod duration;
pub mod handlers;
pub mod ledger;
pub mod logging;
pub mod lookup;
pub mod moderation;
pub mod permissions;
pub mod presence;
pub mod relay;

// Tracing targets
pub const BOT_NAME: &str = "modqueue_console";
pub const COMMAND_TARGET: &str = "modqueue_console::command";
pub const ERROR_TARGET: &str = "modqueue_console::error";
pub const EVENT_TARGET: &str = "modqueue_console::handlers";
pub const RELAY_TARGET: &str = "modqueue_console::relay";
pub const AUDIT_TARGET: &str = "modqueue_console::audit";
pub const CONSOLE_TARGET: &str = "modqueue_console";

/// Identity recorded as the issuer of automatic actions
pub const SYSTEM_ACTOR: &str = "SYSTEM";

pub use data::Data;
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
