//! Slash commands
//!
//! Each command only turns its options into an [`Operation`], hands it to the
//! moderation service and renders the result as an ephemeral reply.

use crate::ledger::Actor;
use crate::lookup::PlayerRef;
use crate::moderation::{
    CashChange, GameSetting, ModerationError, Operation, Outcome, STRIKE_THRESHOLD,
    WARNING_THRESHOLD,
};
use crate::permissions::Rank;
use crate::presence::group_digits;
use crate::relay::RelayAction;
use crate::{Context, Data, ERROR_TARGET, Error, SYSTEM_ACTOR};
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{self as serenity, CreateAttachment};
use poise::{ChoiceParameter, CreateReply, command};
use std::fmt::Write as _;
use tracing::error;

/// File name of the banned users export
pub const BANS_CSV_FILE: &str = "banned_users.csv";

/// Message content limit, leaving room for the truncation marker
const MAX_REPLY_CHARS: usize = 1900;

/// Ranks offered by the whitelist command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ChoiceParameter)]
pub enum RankChoice {
    Moderator,
    Admin,
    Manager,
    Owner,
}

impl From<RankChoice> for Rank {
    fn from(choice: RankChoice) -> Self {
        match choice {
            RankChoice::Moderator => Self::Moderator,
            RankChoice::Admin => Self::Admin,
            RankChoice::Manager => Self::Manager,
            RankChoice::Owner => Self::Owner,
        }
    }
}

/// All commands, in registration order
#[must_use]
pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        whitelist(),
        removewhitelist(),
        whitelistedusers(),
        kick(),
        ban(),
        unban(),
        tempban(),
        checkban(),
        warn(),
        checkwarn(),
        clearwarnings(),
        punishmenthistory(),
        bannedusers(),
        unbanwave(),
        restartallservers(),
        blacklistcrew(),
        removecrewblacklist(),
        blacklistedcrews(),
        whois(),
        check_ccu(),
        viewlogs(),
        announce(),
        message(),
        mute(),
        strike(),
        grouprank(),
        addcash(),
        removecash(),
        setcash(),
        changeplaceid(),
        changeuniverseid(),
    ]
}

async fn run(ctx: Context<'_>, operation: Operation) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let actor = ctx.author().id.get();
    let name = operation.name();
    let reply = match ctx.data().moderation().execute(actor, operation).await {
        Ok(outcome) => render(&outcome),
        Err(e) => {
            if is_internal(&e) {
                error!(
                    target: ERROR_TARGET,
                    operation = name,
                    user_id = actor,
                    error = %e,
                    "Operation failed"
                );
            }
            CreateReply::default().content(error_message(&e))
        }
    };
    ctx.send(reply.ephemeral(true)).await?;
    Ok(())
}

async fn run_for_player(
    ctx: Context<'_>,
    input: &str,
    build: impl FnOnce(PlayerRef) -> Operation,
) -> Result<(), Error> {
    match PlayerRef::parse(input) {
        Some(player) => run(ctx, build(player)).await,
        None => {
            let reply = CreateReply::default()
                .content(error_message(&ModerationError::InvalidPlayerReference))
                .ephemeral(true);
            ctx.send(reply).await?;
            Ok(())
        }
    }
}

fn is_internal(error: &ModerationError) -> bool {
    matches!(error, ModerationError::Lookup(_) | ModerationError::Ledger(_))
}

fn error_message(error: &ModerationError) -> String {
    if is_internal(error) {
        "❌ An error occurred while executing this command.".to_string()
    } else {
        format!("❌ {error}")
    }
}

fn render(outcome: &Outcome) -> CreateReply {
    let reply = CreateReply::default().content(describe(outcome));
    match outcome {
        Outcome::BanExport { csv, .. } => {
            reply.attachment(CreateAttachment::bytes(csv.clone().into_bytes(), BANS_CSV_FILE))
        }
        _ => reply,
    }
}

fn actor_label(actor: Actor) -> String {
    match actor {
        Actor::Staff(id) => format!("<@{id}>"),
        Actor::System => SYSTEM_ACTOR.to_string(),
    }
}

fn date(at: DateTime<Utc>) -> String {
    format!("<t:{}:f>", at.timestamp())
}

fn relay_note(relayed: bool) -> &'static str {
    if relayed {
        ""
    } else {
        "\n⚠️ The game servers did not confirm this action. It has still been recorded."
    }
}

fn truncate(mut text: String) -> String {
    if let Some((cut, _)) = text.char_indices().nth(MAX_REPLY_CHARS) {
        text.truncate(cut);
        text.push_str("\n…");
    }
    text
}

/// Reply text for an outcome
fn describe(outcome: &Outcome) -> String {
    let text = match outcome {
        Outcome::RankGranted(member) => {
            format!("✅ Whitelisted <@{}> as **{}**", member.id, member.rank)
        }
        Outcome::RankRevoked { staff_id, previous } => match previous {
            Some(member) => format!(
                "✅ Removed <@{staff_id}> from the whitelist (was **{}**)",
                member.rank
            ),
            None => format!("<@{staff_id}> was not whitelisted"),
        },
        Outcome::Staff(members) => {
            if members.is_empty() {
                "No whitelisted users.".to_string()
            } else {
                let mut text = format!("**Whitelisted Users** ({})\n", members.len());
                for member in members {
                    let _ = writeln!(text, "<@{}> - {}", member.id, member.rank);
                }
                text
            }
        }
        Outcome::BansCleared { count, relayed } => {
            format!("✅ Unbanned **{count}** users{}", relay_note(*relayed))
        }
        Outcome::GroupBlacklisted { group, relayed } => format!(
            "✅ Blacklisted crew **{}** ({}){}",
            group.name,
            group.id,
            relay_note(*relayed)
        ),
        Outcome::GroupUnblacklisted {
            group_id,
            removed,
            relayed,
        } => {
            if *removed {
                format!(
                    "✅ Removed crew {group_id} from the blacklist{}",
                    relay_note(*relayed)
                )
            } else {
                format!("Crew {group_id} was not blacklisted{}", relay_note(*relayed))
            }
        }
        Outcome::BlacklistedGroups(groups) => {
            if groups.is_empty() {
                "No blacklisted crews.".to_string()
            } else {
                let mut text = format!("**Blacklisted Crews** ({})\n", groups.len());
                for group in groups {
                    let _ = writeln!(
                        text,
                        "{} - by {} on {}",
                        group.group_id,
                        actor_label(group.blacklisted_by),
                        date(group.blacklisted_at)
                    );
                }
                text
            }
        }
        Outcome::GroupRankChanged {
            player,
            role,
            relayed,
        } => format!(
            "✅ Changed **{}**'s group rank to **{}**{}",
            player.name,
            role.name,
            relay_note(*relayed)
        ),
        Outcome::SettingChanged { setting, value } => {
            format!("✅ Successfully changed {} to **{value}**", setting.key())
        }
        Outcome::WarningsCleared { player, count } => {
            format!("✅ Cleared **{count}** warnings for **{}**", player.name)
        }
        Outcome::BanExport { count, .. } => {
            format!("📄 Exported **{count}** banned users to `{BANS_CSV_FILE}`")
        }
        Outcome::StaffLogs { staff_id, entries } => {
            if entries.is_empty() {
                format!("No moderation logs for <@{staff_id}>")
            } else {
                let mut text = format!(
                    "**Moderation Logs for** <@{staff_id}>\nTotal Actions: **{}**\n",
                    entries.len()
                );
                for entry in entries {
                    let _ = writeln!(
                        text,
                        "`#{}` {} - {} ({}) - {}: {}",
                        entry.id,
                        entry.action_label(),
                        entry.display_name,
                        entry.subject_id,
                        date(entry.timestamp),
                        entry.reason
                    );
                }
                text
            }
        }
        Outcome::StrikeIssued {
            strike,
            total,
            removed,
        } => {
            let mut text = format!(
                "⚠️ Strike issued to <@{}> ({total}/{STRIKE_THRESHOLD})\nReason: {}",
                strike.staff_id, strike.reason
            );
            if let Some(rank) = removed {
                let _ = write!(
                    text,
                    "\n🚫 <@{}> reached {STRIKE_THRESHOLD} strikes and lost the **{rank}** rank",
                    strike.staff_id
                );
            }
            text
        }
        Outcome::History { player, entries } => {
            if entries.is_empty() {
                format!("No punishment history for **{}**", player.name)
            } else {
                let mut text = format!(
                    "**Punishment History for {}**\nTotal Punishments: **{}**\n",
                    player.name,
                    entries.len()
                );
                for entry in entries {
                    let _ = writeln!(
                        text,
                        "`#{}` {} by {} on {}\nReason: {} | Proof: {}",
                        entry.id,
                        entry.action_label(),
                        actor_label(entry.moderator),
                        date(entry.timestamp),
                        entry.reason,
                        entry.proof
                    );
                }
                text
            }
        }
        Outcome::Relayed {
            player,
            action,
            relayed,
        } => {
            let name = player.as_ref().map_or("", |p| p.name.as_str());
            let text = match action {
                RelayAction::Message { .. } => format!("✅ Message sent to **{name}**"),
                RelayAction::Announce { .. } => "✅ Announcement sent to all servers".to_string(),
                RelayAction::AddCash { amount, .. } => {
                    format!("✅ Added **{amount}** cash to **{name}**")
                }
                RelayAction::RemoveCash { amount, .. } => {
                    format!("✅ Removed **{amount}** cash from **{name}**")
                }
                RelayAction::SetCash { amount, .. } => {
                    format!("✅ Set **{name}**'s cash to **{amount}**")
                }
                RelayAction::RestartAllServers => "✅ Restarting all servers".to_string(),
                other => format!("✅ Sent `{}`", other.name()),
            };
            format!("{text}{}", relay_note(*relayed))
        }
        Outcome::Kicked { player, relayed } => {
            format!("✅ Kicked **{}** from the game{}", player.name, relay_note(*relayed))
        }
        Outcome::Banned { ban, relayed } => {
            let until = ban
                .expires_at
                .map_or_else(|| "permanently".to_string(), |t| format!("until {}", date(t)));
            format!(
                "🔨 Banned **{}** ({}) {until}\nReason: {}{}",
                ban.display_name,
                ban.subject_id,
                ban.reason,
                relay_note(*relayed)
            )
        }
        Outcome::Unbanned {
            player,
            had_ban,
            relayed,
        } => {
            let note = if *had_ban {
                ""
            } else {
                " (no active ban was recorded)"
            };
            format!("✅ Unbanned **{}**{note}{}", player.name, relay_note(*relayed))
        }
        Outcome::BanStatus { player, ban } => match ban {
            None => format!("✅ **{}** is not banned", player.name),
            Some(ban) => {
                let expires = ban
                    .expires_at
                    .map_or_else(|| "Permanent".to_string(), date);
                format!(
                    "🔨 **{}** is banned\nReason: {}\nProof: {}\nBanned by: {}\nBanned at: {}\nExpires: {expires}",
                    player.name,
                    ban.reason,
                    ban.proof,
                    actor_label(ban.issued_by),
                    date(ban.issued_at)
                )
            }
        },
        Outcome::Warned {
            warning,
            total,
            auto_ban,
            relayed,
        } => {
            let mut text = format!(
                "⚠️ Warned **{}** ({total}/{WARNING_THRESHOLD})\nReason: {}",
                warning.display_name, warning.reason
            );
            if let Some(ban) = auto_ban {
                let until = ban.expires_at.map_or_else(String::new, |t| format!(" until {}", date(t)));
                let _ = write!(text, "\n🔨 Auto-banned{until} for reaching {WARNING_THRESHOLD} warnings");
            }
            text.push_str(relay_note(*relayed));
            text
        }
        Outcome::Warnings { player, warnings } => {
            if warnings.is_empty() {
                format!("**{}** has no warnings", player.name)
            } else {
                let mut text = format!(
                    "**Warnings for {}**\nTotal Warnings: **{}**\n",
                    player.name,
                    warnings.len()
                );
                for warning in warnings {
                    let _ = writeln!(
                        text,
                        "`#{}` {} by {} on {}",
                        warning.id,
                        warning.reason,
                        actor_label(warning.issued_by),
                        date(warning.issued_at)
                    );
                }
                text
            }
        }
        Outcome::Muted {
            player,
            duration,
            relayed,
            ..
        } => format!("🔇 Muted **{}** for {duration}{}", player.name, relay_note(*relayed)),
        Outcome::PlayerDetails(details) => {
            let created = details.created.map_or_else(|| "Unknown".to_string(), date);
            format!(
                "**{}** (@{})\nUser ID: {}\nCreated: {created}\nFriends: {} | Followers: {} | Following: {}\nBanned on platform: {}\n{}",
                details.player.display_name,
                details.player.name,
                details.player.id,
                group_digits(details.friend_count),
                group_digits(details.follower_count),
                group_digits(details.following_count),
                if details.is_banned { "Yes" } else { "No" },
                details.description
            )
        }
        Outcome::Population(stats) => format!(
            "🎮 Playing: **{}**\n👥 Visits: **{}**",
            group_digits(stats.playing),
            group_digits(stats.visits)
        ),
    };
    truncate(text)
}

/// Add a staff member to the whitelist
#[command(slash_command, guild_only)]
pub async fn whitelist(
    ctx: Context<'_>,
    #[description = "User to whitelist"] user: serenity::User,
    #[description = "Rank to assign"] rank: RankChoice,
) -> Result<(), Error> {
    run(
        ctx,
        Operation::GrantRank {
            staff_id: user.id.get(),
            rank: rank.into(),
        },
    )
    .await
}

/// Remove a staff member from the whitelist
#[command(slash_command, guild_only)]
pub async fn removewhitelist(
    ctx: Context<'_>,
    #[description = "User to remove"] user: serenity::User,
) -> Result<(), Error> {
    run(
        ctx,
        Operation::RevokeRank {
            staff_id: user.id.get(),
        },
    )
    .await
}

/// View all whitelisted users
#[command(slash_command, guild_only)]
pub async fn whitelistedusers(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, Operation::ListStaff).await
}

/// Kick a player from the game
#[command(slash_command, guild_only)]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Reason for kick"] reason: String,
    #[description = "Proof/Evidence"] proof: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::Kick {
        player,
        reason,
        proof,
    })
    .await
}

/// Ban a player from the game
#[command(slash_command, guild_only)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Reason for ban"] reason: String,
    #[description = "Proof/Evidence"] proof: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::Ban {
        player,
        reason,
        proof,
    })
    .await
}

/// Unban a player from the game
#[command(slash_command, guild_only)]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Reason for unban"] reason: String,
    #[description = "Proof/Evidence"] proof: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::Unban {
        player,
        reason,
        proof,
    })
    .await
}

/// Temporarily ban a player
#[command(slash_command, guild_only)]
pub async fn tempban(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Duration (e.g., 3d 2h 1m)"] duration: String,
    #[description = "Reason for tempban"] reason: String,
    #[description = "Proof/Evidence"] proof: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::Tempban {
        player,
        duration,
        reason,
        proof,
    })
    .await
}

/// Check if a player is banned
#[command(slash_command, guild_only)]
pub async fn checkban(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::CheckBan { player }).await
}

/// Warn a player
#[command(slash_command, guild_only)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Reason for warning"] reason: String,
    #[description = "Proof/Evidence"] proof: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::Warn {
        player,
        reason,
        proof,
    })
    .await
}

/// Check warnings for a player
#[command(slash_command, guild_only)]
pub async fn checkwarn(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::CheckWarnings { player }).await
}

/// Clear all warnings for a player
#[command(slash_command, guild_only)]
pub async fn clearwarnings(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::ClearWarnings { player }).await
}

/// View punishment history for a player
#[command(slash_command, guild_only)]
pub async fn punishmenthistory(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::ViewHistory { player }).await
}

/// Get a list of all banned users
#[command(slash_command, guild_only)]
pub async fn bannedusers(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, Operation::ExportBans).await
}

/// Unban all banned users
#[command(slash_command, guild_only)]
pub async fn unbanwave(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, Operation::UnbanWave).await
}

/// Restart all game servers
#[command(slash_command, guild_only)]
pub async fn restartallservers(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, Operation::RestartServers).await
}

/// Blacklist a game group
#[command(slash_command, guild_only)]
pub async fn blacklistcrew(
    ctx: Context<'_>,
    #[description = "Group ID to blacklist"] groupid: u64,
) -> Result<(), Error> {
    run(ctx, Operation::BlacklistGroup { group_id: groupid }).await
}

/// Remove a group from the blacklist
#[command(slash_command, guild_only)]
pub async fn removecrewblacklist(
    ctx: Context<'_>,
    #[description = "Group ID to remove"] groupid: u64,
) -> Result<(), Error> {
    run(ctx, Operation::UnblacklistGroup { group_id: groupid }).await
}

/// View all blacklisted groups
#[command(slash_command, guild_only)]
pub async fn blacklistedcrews(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, Operation::ListBlacklistedGroups).await
}

/// Get detailed information about a player
#[command(slash_command, guild_only)]
pub async fn whois(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::LookupPlayer { player }).await
}

/// Check current concurrent users
#[command(slash_command, guild_only, rename = "check-ccu")]
pub async fn check_ccu(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, Operation::CheckPopulation).await
}

/// View moderation logs for a staff member
#[command(slash_command, guild_only)]
pub async fn viewlogs(
    ctx: Context<'_>,
    #[description = "Staff member"] user: serenity::User,
) -> Result<(), Error> {
    run(
        ctx,
        Operation::ViewStaffLogs {
            staff_id: user.id.get(),
        },
    )
    .await
}

/// Send an announcement to all servers
#[command(slash_command, guild_only)]
pub async fn announce(
    ctx: Context<'_>,
    #[description = "Message to announce"] message: String,
) -> Result<(), Error> {
    run(ctx, Operation::Announce { message }).await
}

/// Send a message to a specific player
#[command(slash_command, guild_only)]
pub async fn message(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Message to send"] message: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::MessagePlayer { player, message }).await
}

/// Mute a player in-game
#[command(slash_command, guild_only)]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Duration (e.g., 1h 30m)"] duration: String,
    #[description = "Reason for mute"] reason: String,
    #[description = "Proof/Evidence"] proof: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::Mute {
        player,
        duration,
        reason,
        proof,
    })
    .await
}

/// Issue a strike to a staff member
#[command(slash_command, guild_only)]
pub async fn strike(
    ctx: Context<'_>,
    #[description = "Staff member"] user: serenity::User,
    #[description = "Reason for strike"] reason: String,
    #[description = "Proof/Evidence"] proof: String,
) -> Result<(), Error> {
    run(
        ctx,
        Operation::Strike {
            staff_id: user.id.get(),
            reason,
            proof,
        },
    )
    .await
}

/// Change a player's group rank
#[command(slash_command, guild_only)]
pub async fn grouprank(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Role name or role ID"] role: String,
) -> Result<(), Error> {
    run_for_player(ctx, &player, |player| Operation::SetGroupRank { player, role }).await
}

async fn cash(
    ctx: Context<'_>,
    player: &str,
    change: CashChange,
    amount: i64,
) -> Result<(), Error> {
    run_for_player(ctx, player, |player| Operation::Cash {
        player,
        change,
        amount,
    })
    .await
}

/// Add cash to a player
#[command(slash_command, guild_only)]
pub async fn addcash(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Amount to add"] amount: i64,
) -> Result<(), Error> {
    cash(ctx, &player, CashChange::Add, amount).await
}

/// Remove cash from a player
#[command(slash_command, guild_only)]
pub async fn removecash(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Amount to remove"] amount: i64,
) -> Result<(), Error> {
    cash(ctx, &player, CashChange::Remove, amount).await
}

/// Set a player's cash
#[command(slash_command, guild_only)]
pub async fn setcash(
    ctx: Context<'_>,
    #[description = "Username or UserID"] player: String,
    #[description = "Amount to set"] amount: i64,
) -> Result<(), Error> {
    cash(ctx, &player, CashChange::Set, amount).await
}

/// Change the Place ID
#[command(slash_command, guild_only)]
pub async fn changeplaceid(
    ctx: Context<'_>,
    #[description = "New Place ID"] placeid: String,
) -> Result<(), Error> {
    run(
        ctx,
        Operation::SetGameSetting {
            setting: GameSetting::PlaceId,
            value: placeid.trim().to_string(),
        },
    )
    .await
}

/// Change the Universe ID
#[command(slash_command, guild_only)]
pub async fn changeuniverseid(
    ctx: Context<'_>,
    #[description = "New Universe ID"] universeid: String,
) -> Result<(), Error> {
    run(
        ctx,
        Operation::SetGameSetting {
            setting: GameSetting::UniverseId,
            value: universeid.trim().to_string(),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ban, LedgerError, Strike, Warning};
    use crate::lookup::{GameStats, LookupError, Player};
    use crate::permissions::StaffMember;
    use chrono::Duration;

    fn player() -> Player {
        Player {
            id: 77,
            name: "griefer".into(),
            display_name: "Griefer".into(),
        }
    }

    #[test]
    fn test_all_commands_are_guild_only_slash_commands() {
        let commands = commands();
        assert_eq!(commands.len(), 31);
        for cmd in &commands {
            assert!(cmd.guild_only, "{} should be guild only", cmd.name);
            assert!(cmd.create_as_slash_command().is_some(), "{}", cmd.name);
            assert!(cmd.description.is_some(), "{} needs a description", cmd.name);
        }
    }

    #[test]
    fn test_command_names() {
        let names: Vec<String> = commands().into_iter().map(|c| c.name).collect();
        for expected in [
            "whitelist",
            "tempban",
            "checkwarn",
            "punishmenthistory",
            "bannedusers",
            "check-ccu",
            "grouprank",
            "changeuniverseid",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_command_parameters() {
        let cmd = tempban();
        let params: Vec<&str> = cmd.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, ["player", "duration", "reason", "proof"]);
        assert!(cmd.parameters.iter().all(|p| p.required));

        assert_eq!(grouprank().parameters.len(), 2);
        assert!(bannedusers().parameters.is_empty());
    }

    #[test]
    fn test_rank_choice_conversion() {
        assert_eq!(Rank::from(RankChoice::Moderator), Rank::Moderator);
        assert_eq!(Rank::from(RankChoice::Owner), Rank::Owner);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            error_message(&ModerationError::PermissionDenied {
                required: Rank::Owner
            }),
            "❌ You need the owner rank or higher to do that"
        );
        assert_eq!(
            error_message(&ModerationError::Lookup(LookupError::MissingCredential)),
            "❌ An error occurred while executing this command."
        );
        assert!(is_internal(&ModerationError::Ledger(LedgerError::Io {
            path: "data/bans.yaml".into(),
            source: std::io::Error::other("disk"),
        })));
        assert!(!is_internal(&ModerationError::PlayerNotFound("x".into())));
    }

    #[test]
    fn test_describe_auto_ban_warning() {
        let warning = Warning::new(77, "griefer", "spawn killing", "clip", Actor::Staff(1));
        let ban = Ban::new(
            77,
            "griefer",
            "3 Warnings Auto-Ban",
            "Automated",
            Actor::System,
            Some(Utc::now() + Duration::days(3)),
        );
        let text = describe(&Outcome::Warned {
            warning,
            total: 3,
            auto_ban: Some(ban),
            relayed: true,
        });
        assert!(text.contains("(3/3)"));
        assert!(text.contains("Auto-banned"));
        assert!(!text.contains("did not confirm"));
    }

    #[test]
    fn test_describe_strike_rank_removal() {
        let text = describe(&Outcome::StrikeIssued {
            strike: Strike::new(9, "abuse", "log", Actor::Staff(1)),
            total: 3,
            removed: Some(Rank::Admin),
        });
        assert!(text.contains("(3/3)"));
        assert!(text.contains("lost the **admin** rank"));
    }

    #[test]
    fn test_describe_notes_unconfirmed_relay() {
        let text = describe(&Outcome::Kicked {
            player: player(),
            relayed: false,
        });
        assert!(text.starts_with("✅ Kicked **griefer**"));
        assert!(text.contains("did not confirm"));
    }

    #[test]
    fn test_describe_lists() {
        let staff = describe(&Outcome::Staff(vec![StaffMember {
            id: 5,
            rank: Rank::Manager,
            granted_by: Actor::System,
            granted_at: Utc::now(),
        }]));
        assert!(staff.contains("<@5> - manager"));

        let empty = describe(&Outcome::Warnings {
            player: player(),
            warnings: Vec::new(),
        });
        assert_eq!(empty, "**griefer** has no warnings");

        let population = describe(&Outcome::Population(GameStats {
            playing: 1234,
            visits: 1_250_000,
        }));
        assert!(population.contains("1,234"));
        assert!(population.contains("1,250,000"));
    }

    #[test]
    fn test_long_replies_are_truncated() {
        let long = "x".repeat(MAX_REPLY_CHARS + 500);
        let text = truncate(long);
        assert!(text.chars().count() <= MAX_REPLY_CHARS + 2);
        assert!(text.ends_with('…'));
        assert_eq!(truncate("short".into()), "short");
    }
}
