//! Operations staff can request and what they produce

use crate::audit::AuditEvent;
use crate::ledger::{Actor, Ban, BlacklistedGroup, HistoryEntry, Strike, Warning};
use crate::lookup::{GameStats, GroupInfo, GroupRole, Player, PlayerDetails, PlayerRef};
use crate::permissions::{Rank, StaffMember};
use crate::relay::RelayAction;

/// Amount change applied to a player's in-game cash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashChange {
    Add,
    Remove,
    Set,
}

/// Runtime config key an owner may change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameSetting {
    PlaceId,
    UniverseId,
}

impl GameSetting {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::PlaceId => crate::ledger::runtime_config::PLACE_ID,
            Self::UniverseId => crate::ledger::runtime_config::UNIVERSE_ID,
        }
    }
}

/// Every privileged operation the console supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    // owner
    GrantRank {
        staff_id: u64,
        rank: Rank,
    },
    RevokeRank {
        staff_id: u64,
    },
    ListStaff,
    UnbanWave,
    RestartServers,
    BlacklistGroup {
        group_id: u64,
    },
    UnblacklistGroup {
        group_id: u64,
    },
    ListBlacklistedGroups,
    /// `role` is a role id or a case-insensitive role name
    SetGroupRank {
        player: PlayerRef,
        role: String,
    },
    SetGameSetting {
        setting: GameSetting,
        value: String,
    },

    // manager
    ClearWarnings {
        player: PlayerRef,
    },
    ExportBans,
    ViewStaffLogs {
        staff_id: u64,
    },
    Announce {
        message: String,
    },
    Strike {
        staff_id: u64,
        reason: String,
        proof: String,
    },

    // admin and manager
    Cash {
        player: PlayerRef,
        change: CashChange,
        amount: i64,
    },

    // admin
    ViewHistory {
        player: PlayerRef,
    },
    MessagePlayer {
        player: PlayerRef,
        message: String,
    },

    // moderator
    Kick {
        player: PlayerRef,
        reason: String,
        proof: String,
    },
    Ban {
        player: PlayerRef,
        reason: String,
        proof: String,
    },
    Unban {
        player: PlayerRef,
        reason: String,
        proof: String,
    },
    /// `duration` is a compact expression such as `3d 2h`
    Tempban {
        player: PlayerRef,
        duration: String,
        reason: String,
        proof: String,
    },
    CheckBan {
        player: PlayerRef,
    },
    Warn {
        player: PlayerRef,
        reason: String,
        proof: String,
    },
    CheckWarnings {
        player: PlayerRef,
    },
    Mute {
        player: PlayerRef,
        duration: String,
        reason: String,
        proof: String,
    },
    LookupPlayer {
        player: PlayerRef,
    },
    CheckPopulation,
}

impl Operation {
    /// Minimum rank needed to perform this operation
    #[must_use]
    pub fn required_rank(&self) -> Rank {
        match self {
            Self::GrantRank { .. }
            | Self::RevokeRank { .. }
            | Self::ListStaff
            | Self::UnbanWave
            | Self::RestartServers
            | Self::BlacklistGroup { .. }
            | Self::UnblacklistGroup { .. }
            | Self::ListBlacklistedGroups
            | Self::SetGroupRank { .. }
            | Self::SetGameSetting { .. } => Rank::Owner,
            Self::ClearWarnings { .. }
            | Self::ExportBans
            | Self::ViewStaffLogs { .. }
            | Self::Announce { .. }
            | Self::Strike { .. }
            | Self::Cash {
                change: CashChange::Set,
                ..
            } => Rank::Manager,
            Self::Cash { .. } | Self::ViewHistory { .. } | Self::MessagePlayer { .. } => {
                Rank::Admin
            }
            Self::Kick { .. }
            | Self::Ban { .. }
            | Self::Unban { .. }
            | Self::Tempban { .. }
            | Self::CheckBan { .. }
            | Self::Warn { .. }
            | Self::CheckWarnings { .. }
            | Self::Mute { .. }
            | Self::LookupPlayer { .. }
            | Self::CheckPopulation => Rank::Moderator,
        }
    }

    /// Short name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GrantRank { .. } => "grant_rank",
            Self::RevokeRank { .. } => "revoke_rank",
            Self::ListStaff => "list_staff",
            Self::UnbanWave => "unban_wave",
            Self::RestartServers => "restart_servers",
            Self::BlacklistGroup { .. } => "blacklist_group",
            Self::UnblacklistGroup { .. } => "unblacklist_group",
            Self::ListBlacklistedGroups => "list_blacklisted_groups",
            Self::SetGroupRank { .. } => "set_group_rank",
            Self::SetGameSetting { .. } => "set_game_setting",
            Self::ClearWarnings { .. } => "clear_warnings",
            Self::ExportBans => "export_bans",
            Self::ViewStaffLogs { .. } => "view_staff_logs",
            Self::Announce { .. } => "announce",
            Self::Strike { .. } => "strike",
            Self::Cash { .. } => "cash",
            Self::ViewHistory { .. } => "view_history",
            Self::MessagePlayer { .. } => "message_player",
            Self::Kick { .. } => "kick",
            Self::Ban { .. } => "ban",
            Self::Unban { .. } => "unban",
            Self::Tempban { .. } => "tempban",
            Self::CheckBan { .. } => "check_ban",
            Self::Warn { .. } => "warn",
            Self::CheckWarnings { .. } => "check_warnings",
            Self::Mute { .. } => "mute",
            Self::LookupPlayer { .. } => "lookup_player",
            Self::CheckPopulation => "check_population",
        }
    }
}

/// Result of a successful operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    RankGranted(StaffMember),
    RankRevoked {
        staff_id: u64,
        previous: Option<StaffMember>,
    },
    Staff(Vec<StaffMember>),
    BansCleared {
        count: usize,
        relayed: bool,
    },
    GroupBlacklisted {
        group: GroupInfo,
        relayed: bool,
    },
    GroupUnblacklisted {
        group_id: u64,
        removed: bool,
        relayed: bool,
    },
    BlacklistedGroups(Vec<BlacklistedGroup>),
    GroupRankChanged {
        player: Player,
        role: GroupRole,
        relayed: bool,
    },
    SettingChanged {
        setting: GameSetting,
        value: String,
    },
    WarningsCleared {
        player: Player,
        count: usize,
    },
    BanExport {
        count: usize,
        csv: String,
    },
    StaffLogs {
        staff_id: u64,
        entries: Vec<HistoryEntry>,
    },
    StrikeIssued {
        strike: Strike,
        total: usize,
        /// Set when this strike cost the member their rank
        removed: Option<Rank>,
    },
    History {
        player: Player,
        entries: Vec<HistoryEntry>,
    },
    /// Pure relay operations: messages, announcements, cash, restarts
    Relayed {
        player: Option<Player>,
        action: RelayAction,
        relayed: bool,
    },
    Kicked {
        player: Player,
        relayed: bool,
    },
    Banned {
        ban: Ban,
        relayed: bool,
    },
    Unbanned {
        player: Player,
        had_ban: bool,
        relayed: bool,
    },
    BanStatus {
        player: Player,
        ban: Option<Ban>,
    },
    Warned {
        warning: Warning,
        total: usize,
        /// Set when this warning triggered the automatic ban
        auto_ban: Option<Ban>,
        relayed: bool,
    },
    Warnings {
        player: Player,
        warnings: Vec<Warning>,
    },
    Muted {
        player: Player,
        duration: String,
        duration_ms: u64,
        relayed: bool,
    },
    PlayerDetails(PlayerDetails),
    Population(GameStats),
}

fn player_label(player: &Player) -> String {
    format!("{} ({})", player.name, player.id)
}

impl Outcome {
    /// Audit record for this outcome
    #[must_use]
    pub fn audit_event(&self, actor: Actor) -> AuditEvent {
        match self {
            Self::RankGranted(member) => AuditEvent::new(actor, "Staff Whitelisted")
                .field("Staff Member", format!("<@{}>", member.id))
                .field("Rank", member.rank),
            Self::RankRevoked { staff_id, previous } => {
                AuditEvent::new(actor, "Staff Removed")
                    .field("Staff Member", format!("<@{staff_id}>"))
                    .field(
                        "Previous Rank",
                        previous.as_ref().map_or("none", |m| m.rank.as_str()),
                    )
            }
            Self::Staff(members) => {
                AuditEvent::new(actor, "View Staff List").field("Total Staff", members.len())
            }
            Self::BansCleared { count, .. } => {
                AuditEvent::new(actor, "Unban Wave").field("Bans Removed", count)
            }
            Self::GroupBlacklisted { group, .. } => AuditEvent::new(actor, "Blacklist Crew")
                .field("Group", format!("{} ({})", group.name, group.id)),
            Self::GroupUnblacklisted { group_id, .. } => {
                AuditEvent::new(actor, "Remove Crew Blacklist").field("Group ID", group_id)
            }
            Self::BlacklistedGroups(groups) => {
                AuditEvent::new(actor, "View Blacklisted Crews").field("Total", groups.len())
            }
            Self::GroupRankChanged { player, role, .. } => AuditEvent::new(actor, "Group Rank")
                .field("Player", player_label(player))
                .field("New Rank", &role.name),
            Self::SettingChanged { setting, value } => {
                AuditEvent::new(actor, "Change Setting")
                    .field("Key", setting.key())
                    .field("Value", value)
            }
            Self::WarningsCleared { player, count } => AuditEvent::new(actor, "Clear Warnings")
                .field("Player", player_label(player))
                .field("Warnings Cleared", count),
            Self::BanExport { count, .. } => {
                AuditEvent::new(actor, "Export Banned Users").field("Total Bans", count)
            }
            Self::StaffLogs { staff_id, entries } => AuditEvent::new(actor, "View Logs")
                .field("Staff Member", format!("<@{staff_id}>"))
                .field("Entries", entries.len()),
            Self::StrikeIssued { strike, total, .. } => AuditEvent::new(actor, "Strike")
                .field("Staff Member", format!("<@{}>", strike.staff_id))
                .field("Reason", &strike.reason)
                .field("Proof", &strike.proof)
                .field("Total Strikes", total),
            Self::History { player, entries } => AuditEvent::new(actor, "Punishment History")
                .field("Player", player_label(player))
                .field("Entries", entries.len()),
            Self::Relayed { player, action, .. } => {
                let event = AuditEvent::new(actor, action.name()).field("Action", action.name());
                match player {
                    Some(player) => event.field("Player", player_label(player)),
                    None => event,
                }
            }
            Self::Kicked { player, .. } => {
                AuditEvent::new(actor, "Kick").field("Player", player_label(player))
            }
            Self::Banned { ban, .. } => {
                let expires = ban
                    .expires_at
                    .map_or_else(|| "Permanent".to_string(), |t| t.to_rfc3339());
                AuditEvent::new(actor, if ban.is_permanent() { "Ban" } else { "Tempban" })
                    .field("Player", format!("{} ({})", ban.display_name, ban.subject_id))
                    .field("Reason", &ban.reason)
                    .field("Proof", &ban.proof)
                    .field("Expires", expires)
            }
            Self::Unbanned { player, .. } => {
                AuditEvent::new(actor, "Unban").field("Player", player_label(player))
            }
            Self::BanStatus { player, ban } => AuditEvent::new(actor, "Check Ban")
                .field("Player", player_label(player))
                .field("Banned", ban.is_some()),
            Self::Warned {
                warning,
                total,
                auto_ban,
                ..
            } => AuditEvent::new(actor, "Warn")
                .field(
                    "Player",
                    format!("{} ({})", warning.display_name, warning.subject_id),
                )
                .field("Reason", &warning.reason)
                .field("Proof", &warning.proof)
                .field("Total Warnings", total)
                .field("Auto-Ban", auto_ban.is_some()),
            Self::Warnings { player, warnings } => AuditEvent::new(actor, "Check Warnings")
                .field("Player", player_label(player))
                .field("Total", warnings.len()),
            Self::Muted {
                player, duration, ..
            } => AuditEvent::new(actor, "Mute")
                .field("Player", player_label(player))
                .field("Duration", duration),
            Self::PlayerDetails(details) => {
                AuditEvent::new(actor, "Whois").field("Player", player_label(&details.player))
            }
            Self::Population(stats) => AuditEvent::new(actor, "Check CCU")
                .field("Playing", stats.playing)
                .field("Visits", stats.visits),
        }
    }
}
