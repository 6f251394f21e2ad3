use crate::{Data, EVENT_TARGET, presence};
use poise::serenity_prelude::{self as serenity, Context, EventHandler, GuildId, Ready};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

#[derive(Debug, Default)]
pub struct Handler {
    /// Set once the presence loop runs, so reconnects don't start another
    presence_started: AtomicBool,
}

impl Handler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to start the presence loop. Only the first call wins.
    fn claim_presence(&self) -> bool {
        !self.presence_started.swap(true, Ordering::SeqCst)
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!(target: EVENT_TARGET, "Connected as {user_name}, shard {shard_id}");

        if !self.claim_presence() {
            return;
        }
        let data = ctx.data.read().await.get::<Data>().cloned();
        match data {
            Some(data) => {
                presence::spawn(ctx, data);
            }
            None => {
                error!(target: EVENT_TARGET, "Bot data missing from the client data map");
                self.presence_started.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                target: EVENT_TARGET,
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!(target: EVENT_TARGET, "Cache ready! The bot is in {guild_count} guild(s)");
    }
}
