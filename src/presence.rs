//! Population mirror
//!
//! Copies the live player count and visit total of the configured universe
//! into the bot's activity, two voice channel names and a periodic stats
//! message.

use crate::lookup::GameStats;
use crate::{Data, EVENT_TARGET};
use poise::serenity_prelude::{self as serenity, ActivityData, ChannelId, EditChannel};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Activity and voice channel refresh period
pub const STATUS_INTERVAL: Duration = Duration::from_secs(10);
/// Stats channel message period
pub const STATS_INTERVAL: Duration = Duration::from_secs(600);
/// Visit milestones are multiples of this
pub const MILESTONE_STEP: u64 = 10_000;

const DIVIDER: &str = "-------------------------------------------------------";

/// `1234567` -> `1,234,567`
#[must_use]
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[must_use]
pub fn activity_text(playing: u64, game_name: &str) -> String {
    format!("{} players are currently playing {game_name}", group_digits(playing))
}

#[must_use]
pub fn visits_channel_name(visits: u64) -> String {
    format!("👥 Visits: {}", group_digits(visits))
}

#[must_use]
pub fn playing_channel_name(playing: u64) -> String {
    format!("🎮 Playing: {}", group_digits(playing))
}

/// The next multiple of [`MILESTONE_STEP`] strictly above `visits`
#[must_use]
pub fn next_milestone(visits: u64) -> u64 {
    (visits / MILESTONE_STEP + 1) * MILESTONE_STEP
}

#[must_use]
pub fn stats_message(stats: GameStats) -> String {
    format!(
        "{DIVIDER}\n{DIVIDER}\n🎮 Active players: {}\n{DIVIDER}\n{DIVIDER}\n👥 Visits: {}\n🎯 Next milestone: {}/{}\n{DIVIDER}\n{DIVIDER}",
        group_digits(stats.playing),
        group_digits(stats.visits),
        group_digits(stats.visits),
        group_digits(next_milestone(stats.visits)),
    )
}

/// Names last written to the voice channels, so unchanged ones are skipped
#[derive(Debug, Default)]
struct ChannelNames {
    visits: Option<String>,
    playing: Option<String>,
}

async fn fetch_stats(data: &Data) -> Option<GameStats> {
    let moderation = data.moderation();
    let Some(universe_id) = moderation.settings().universe_id() else {
        debug!(target: EVENT_TARGET, "No universe configured, skipping presence update");
        return None;
    };
    match moderation.directory().game_stats(&universe_id).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(target: EVENT_TARGET, universe_id = %universe_id, "Failed to fetch game stats: {e}");
            None
        }
    }
}

async fn rename(ctx: &serenity::Context, channel: Option<u64>, name: String, last: &mut Option<String>) {
    let Some(channel) = channel else {
        return;
    };
    if last.as_deref() == Some(name.as_str()) {
        return;
    }
    match ChannelId::new(channel)
        .edit(ctx, EditChannel::new().name(name.clone()))
        .await
    {
        Ok(_) => *last = Some(name),
        Err(e) => warn!(target: EVENT_TARGET, channel_id = channel, "Failed to rename channel: {e}"),
    }
}

async fn update_status(ctx: &serenity::Context, data: &Data, names: &mut ChannelNames) {
    let Some(stats) = fetch_stats(data).await else {
        return;
    };
    ctx.set_activity(Some(ActivityData::watching(activity_text(
        stats.playing,
        &data.config.game_name,
    ))));

    rename(
        ctx,
        data.config.visits_vc_id,
        visits_channel_name(stats.visits),
        &mut names.visits,
    )
    .await;
    rename(
        ctx,
        data.config.playing_vc_id,
        playing_channel_name(stats.playing),
        &mut names.playing,
    )
    .await;
}

async fn post_stats(ctx: &serenity::Context, data: &Data) {
    let Some(channel) = data.config.stats_channel_id else {
        return;
    };
    let Some(stats) = fetch_stats(data).await else {
        return;
    };
    if let Err(e) = ChannelId::new(channel)
        .say(&ctx.http, stats_message(stats))
        .await
    {
        warn!(target: EVENT_TARGET, channel_id = channel, "Failed to post stats message: {e}");
    }
}

/// Spawn the refresh loops. Both run once immediately.
pub fn spawn(ctx: serenity::Context, data: Data) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(target: EVENT_TARGET, "Starting presence updates");

        let mut status_ticker = tokio::time::interval(STATUS_INTERVAL);
        status_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats_ticker = tokio::time::interval(STATS_INTERVAL);
        stats_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut names = ChannelNames::default();

        loop {
            tokio::select! {
                _ = status_ticker.tick() => update_status(&ctx, &data, &mut names).await,
                _ = stats_ticker.tick() => post_stats(&ctx, &data).await,
            }
        }
    })
}
