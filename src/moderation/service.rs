//! Moderation service
//!
//! Authorizes an operation, applies it to the ledger, runs escalation, relays
//! the intent to the game and records the audit trail.

use crate::audit::{AuditEvent, AuditSink};
use crate::duration;
use crate::ledger::{
    Actor, Ban, BlacklistedGroup, HistoryEntry, Ledger, PunishmentKind, RuntimeConfig, Strike,
    Warning,
};
use crate::lookup::{GroupRole, Player, PlayerDirectory, PlayerRef};
use crate::moderation::{
    CashChange, GameSetting, ModerationError, ModerationResult, Operation, Outcome,
};
use crate::permissions::{Permissions, Rank};
use crate::relay::{ActionRelay, RelayAction};
use chrono::{DateTime, Duration, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

/// Warnings that trigger the automatic ban
pub const WARNING_THRESHOLD: usize = 3;
/// Strikes that cost a staff member their rank
pub const STRIKE_THRESHOLD: usize = 3;
/// Length of the automatic ban
pub const AUTO_BAN_DAYS: i64 = 3;
pub const AUTO_BAN_REASON: &str = "3 Warnings Auto-Ban";
pub const AUTO_BAN_PROOF: &str = "Automated";
/// Entries shown by the staff log view
pub const STAFF_LOG_LIMIT: usize = 25;

/// Entry point for every staff operation
pub struct ModerationService {
    ledger: Arc<Ledger>,
    permissions: Arc<Permissions>,
    settings: Arc<RuntimeConfig>,
    relay: Arc<dyn ActionRelay>,
    directory: Arc<dyn PlayerDirectory>,
    audit: Arc<dyn AuditSink>,
    group_id: Option<u64>,
}

/// Outcome of one expiry sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Bans removed and announced
    pub lifted: usize,
    /// Bans that were reissued between scan and removal
    pub skipped: usize,
    /// Bans whose removal could not be saved; they stay for the next sweep
    pub failed: usize,
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render bans as `Username,UserID,Reason,BannedBy,BannedAt,ExpiresAt`
#[must_use]
pub fn bans_csv(bans: &[Ban]) -> String {
    let mut csv = String::from("Username,UserID,Reason,BannedBy,BannedAt,ExpiresAt\n");
    for ban in bans {
        let expires = ban
            .expires_at
            .map_or_else(|| "Permanent".to_string(), |t| t.to_rfc3339());
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{}",
            csv_field(&ban.display_name),
            ban.subject_id,
            csv_field(&ban.reason),
            ban.issued_by,
            ban.issued_at.to_rfc3339(),
            expires
        );
    }
    csv
}

/// Pick a role by id, falling back to a case-insensitive name match
fn select_role(roles: Vec<GroupRole>, wanted: &str) -> Option<GroupRole> {
    let wanted = wanted.trim();
    let by_id = wanted.parse::<u64>().ok();
    let mut by_name = None;
    for role in roles {
        if Some(role.id) == by_id {
            return Some(role);
        }
        if by_name.is_none() && role.name.eq_ignore_ascii_case(wanted) {
            by_name = Some(role);
        }
    }
    by_name
}

impl ModerationService {
    pub fn new(
        ledger: Arc<Ledger>,
        permissions: Arc<Permissions>,
        settings: Arc<RuntimeConfig>,
        relay: Arc<dyn ActionRelay>,
        directory: Arc<dyn PlayerDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            ledger,
            permissions,
            settings,
            relay,
            directory,
            audit,
            group_id: None,
        }
    }

    /// Community group used by group rank changes
    #[must_use]
    pub fn with_group(mut self, group_id: Option<u64>) -> Self {
        self.group_id = group_id;
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    #[must_use]
    pub fn permissions(&self) -> &Arc<Permissions> {
        &self.permissions
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<RuntimeConfig> {
        &self.settings
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<dyn PlayerDirectory> {
        &self.directory
    }

    /// Run `operation` on behalf of `actor`.
    ///
    /// # Errors
    /// Returns an error if the actor lacks the required rank, a lookup fails
    /// or the ledger cannot be written. Relay failures are not errors.
    pub async fn execute(&self, actor: u64, operation: Operation) -> ModerationResult<Outcome> {
        let required = operation.required_rank();
        if !self.permissions.authorize(actor, required) {
            warn!(
                actor,
                operation = operation.name(),
                required = %required,
                "Permission denied"
            );
            return Err(ModerationError::PermissionDenied { required });
        }

        let name = operation.name();
        let actor = Actor::Staff(actor);
        let outcome = self.dispatch(actor, operation).await?;

        info!(actor = %actor, operation = name, "Operation completed");
        self.audit.record(outcome.audit_event(actor)).await;
        Ok(outcome)
    }

    async fn dispatch(&self, actor: Actor, operation: Operation) -> ModerationResult<Outcome> {
        match operation {
            Operation::GrantRank { staff_id, rank } => {
                let member = self.permissions.ranks().grant(staff_id, rank, actor).await?;
                Ok(Outcome::RankGranted(member))
            }
            Operation::RevokeRank { staff_id } => {
                let previous = self.permissions.ranks().revoke(staff_id).await?;
                Ok(Outcome::RankRevoked { staff_id, previous })
            }
            Operation::ListStaff => Ok(Outcome::Staff(self.permissions.ranks().list())),
            Operation::UnbanWave => self.unban_wave().await,
            Operation::RestartServers => {
                Ok(self.relay_only(None, RelayAction::RestartAllServers).await)
            }
            Operation::BlacklistGroup { group_id } => self.blacklist_group(actor, group_id).await,
            Operation::UnblacklistGroup { group_id } => {
                let removed = self.ledger.remove_blacklisted_group(group_id).await?;
                let relayed = self
                    .deliver(RelayAction::RemoveCrewBlacklist { group_id })
                    .await;
                Ok(Outcome::GroupUnblacklisted {
                    group_id,
                    removed,
                    relayed,
                })
            }
            Operation::ListBlacklistedGroups => Ok(Outcome::BlacklistedGroups(
                self.ledger.list_blacklisted_groups(),
            )),
            Operation::SetGroupRank { player, role } => self.set_group_rank(&player, &role).await,
            Operation::SetGameSetting { setting, value } => {
                let value = value.trim().to_string();
                self.settings.set(setting.key(), value.clone()).await?;
                Ok(Outcome::SettingChanged { setting, value })
            }
            Operation::ClearWarnings { player } => {
                let player = self.resolve(&player).await?;
                let count = self.ledger.clear_warnings(player.id).await?;
                Ok(Outcome::WarningsCleared { player, count })
            }
            Operation::ExportBans => {
                let bans = self.ledger.list_bans();
                Ok(Outcome::BanExport {
                    count: bans.len(),
                    csv: bans_csv(&bans),
                })
            }
            Operation::ViewStaffLogs { staff_id } => {
                if self.permissions.rank_of(staff_id).is_none() {
                    return Err(ModerationError::NotStaff(staff_id));
                }
                let entries = self
                    .ledger
                    .list_history_by_moderator(staff_id, STAFF_LOG_LIMIT);
                Ok(Outcome::StaffLogs { staff_id, entries })
            }
            Operation::Announce { message } => {
                Ok(self.relay_only(None, RelayAction::Announce { message }).await)
            }
            Operation::Strike {
                staff_id,
                reason,
                proof,
            } => self.strike(actor, staff_id, reason, proof).await,
            Operation::Cash {
                player,
                change,
                amount,
            } => {
                let player = self.resolve(&player).await?;
                let user_id = player.id;
                let action = match change {
                    CashChange::Add => RelayAction::AddCash { user_id, amount },
                    CashChange::Remove => RelayAction::RemoveCash { user_id, amount },
                    CashChange::Set => RelayAction::SetCash { user_id, amount },
                };
                Ok(self.relay_only(Some(player), action).await)
            }
            Operation::ViewHistory { player } => {
                let player = self.resolve(&player).await?;
                let entries = self.ledger.list_history(player.id);
                Ok(Outcome::History { player, entries })
            }
            Operation::MessagePlayer { player, message } => {
                let player = self.resolve(&player).await?;
                let action = RelayAction::Message {
                    user_id: player.id,
                    message,
                };
                Ok(self.relay_only(Some(player), action).await)
            }
            Operation::Kick {
                player,
                reason,
                proof,
            } => {
                let player = self.resolve(&player).await?;
                let relayed = self
                    .deliver(RelayAction::Kick {
                        user_id: player.id,
                        reason: reason.clone(),
                    })
                    .await;
                self.append_history(&player, PunishmentKind::Kick, reason, proof, actor)
                    .await?;
                Ok(Outcome::Kicked { player, relayed })
            }
            Operation::Ban {
                player,
                reason,
                proof,
            } => {
                let player = self.resolve(&player).await?;
                self.ban(actor, &player, reason, proof, None, PunishmentKind::Ban)
                    .await
            }
            Operation::Tempban {
                player,
                duration: text,
                reason,
                proof,
            } => {
                let player = self.resolve(&player).await?;
                let expires_at = duration::expires_at(Utc::now(), &text);
                let kind = PunishmentKind::Tempban(text);
                self.ban(actor, &player, reason, proof, Some(expires_at), kind)
                    .await
            }
            Operation::Unban {
                player,
                reason,
                proof,
            } => {
                let player = self.resolve(&player).await?;
                let had_ban = self.ledger.remove_ban(player.id).await?.is_some();
                let relayed = self
                    .deliver(RelayAction::Unban { user_id: player.id })
                    .await;
                self.append_history(&player, PunishmentKind::Unban, reason, proof, actor)
                    .await?;
                Ok(Outcome::Unbanned {
                    player,
                    had_ban,
                    relayed,
                })
            }
            Operation::CheckBan { player } => {
                let player = self.resolve(&player).await?;
                let ban = self.ledger.get_active_ban(player.id);
                Ok(Outcome::BanStatus { player, ban })
            }
            Operation::Warn {
                player,
                reason,
                proof,
            } => {
                let player = self.resolve(&player).await?;
                self.warn(actor, &player, reason, proof).await
            }
            Operation::CheckWarnings { player } => {
                let player = self.resolve(&player).await?;
                let warnings = self.ledger.list_warnings(player.id);
                Ok(Outcome::Warnings { player, warnings })
            }
            Operation::Mute {
                player,
                duration: text,
                reason,
                proof,
            } => {
                let player = self.resolve(&player).await?;
                let duration_ms = duration::parse(&text);
                let relayed = self
                    .deliver(RelayAction::Mute {
                        user_id: player.id,
                        duration_ms,
                        reason: reason.clone(),
                    })
                    .await;
                self.append_history(
                    &player,
                    PunishmentKind::Mute(text.clone()),
                    reason,
                    proof,
                    actor,
                )
                .await?;
                Ok(Outcome::Muted {
                    player,
                    duration: text,
                    duration_ms,
                    relayed,
                })
            }
            Operation::LookupPlayer { player } => {
                let resolved = self.resolve(&player).await?;
                let details = self
                    .directory
                    .details(resolved.id)
                    .await?
                    .ok_or_else(|| ModerationError::PlayerNotFound(player.to_string()))?;
                Ok(Outcome::PlayerDetails(details))
            }
            Operation::CheckPopulation => {
                let universe_id = self
                    .settings
                    .universe_id()
                    .ok_or(ModerationError::NotConfigured(GameSetting::UniverseId.key()))?;
                let stats = self
                    .directory
                    .game_stats(&universe_id)
                    .await?
                    .ok_or(ModerationError::StatsUnavailable)?;
                Ok(Outcome::Population(stats))
            }
        }
    }

    async fn resolve(&self, player: &PlayerRef) -> ModerationResult<Player> {
        self.directory
            .resolve(player)
            .await?
            .ok_or_else(|| ModerationError::PlayerNotFound(player.to_string()))
    }

    /// Relay an action, logging instead of failing when the modqueue is down
    async fn deliver(&self, action: RelayAction) -> bool {
        match self.relay.send(&action).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    target: crate::RELAY_TARGET,
                    action = %action,
                    error = %e,
                    "Relay failed, ledger state kept"
                );
                false
            }
        }
    }

    async fn relay_only(&self, player: Option<Player>, action: RelayAction) -> Outcome {
        let relayed = self.deliver(action.clone()).await;
        Outcome::Relayed {
            player,
            action,
            relayed,
        }
    }

    async fn append_history(
        &self,
        player: &Player,
        action: PunishmentKind,
        reason: String,
        proof: String,
        moderator: Actor,
    ) -> ModerationResult<HistoryEntry> {
        let entry = HistoryEntry::new(player.id, &player.name, action, reason, proof, moderator);
        Ok(self.ledger.append_history(entry).await?)
    }

    async fn ban(
        &self,
        actor: Actor,
        player: &Player,
        reason: String,
        proof: String,
        expires_at: Option<DateTime<Utc>>,
        kind: PunishmentKind,
    ) -> ModerationResult<Outcome> {
        let ban = Ban::new(
            player.id,
            &player.name,
            reason.clone(),
            proof.clone(),
            actor,
            expires_at,
        );
        let replaced = self.ledger.upsert_ban(ban.clone()).await?;
        info!(
            subject_id = player.id,
            permanent = ban.is_permanent(),
            replaced = replaced.is_some(),
            "Ban issued"
        );

        let relayed = self
            .deliver(RelayAction::Ban {
                user_id: player.id,
                reason: reason.clone(),
                expires_at,
            })
            .await;
        self.append_history(player, kind, reason, proof, actor)
            .await?;
        Ok(Outcome::Banned { ban, relayed })
    }

    async fn warn(
        &self,
        actor: Actor,
        player: &Player,
        reason: String,
        proof: String,
    ) -> ModerationResult<Outcome> {
        let warning = Warning::new(player.id, &player.name, reason.clone(), proof.clone(), actor);
        let (warning, total) = self.ledger.record_warning(warning).await?;

        let relayed = self
            .deliver(RelayAction::Warn {
                user_id: player.id,
                reason: reason.clone(),
            })
            .await;
        self.append_history(player, PunishmentKind::Warn, reason, proof, actor)
            .await?;

        let auto_ban = if total == WARNING_THRESHOLD {
            Some(self.auto_ban(player).await?)
        } else {
            None
        };

        Ok(Outcome::Warned {
            warning,
            total,
            auto_ban,
            relayed,
        })
    }

    /// Ban issued by the console when a player reaches the warning threshold
    async fn auto_ban(&self, player: &Player) -> ModerationResult<Ban> {
        let expires_at = Utc::now() + Duration::days(AUTO_BAN_DAYS);
        let ban = Ban::new(
            player.id,
            &player.name,
            AUTO_BAN_REASON,
            AUTO_BAN_PROOF,
            Actor::System,
            Some(expires_at),
        );
        self.ledger.upsert_ban(ban.clone()).await?;
        warn!(subject_id = player.id, "Warning threshold reached, auto-ban issued");

        self.deliver(RelayAction::Ban {
            user_id: player.id,
            reason: AUTO_BAN_REASON.to_string(),
            expires_at: Some(expires_at),
        })
        .await;
        self.append_history(
            player,
            PunishmentKind::AutoBan,
            AUTO_BAN_REASON.to_string(),
            AUTO_BAN_PROOF.to_string(),
            Actor::System,
        )
        .await?;
        Ok(ban)
    }

    async fn strike(
        &self,
        actor: Actor,
        staff_id: u64,
        reason: String,
        proof: String,
    ) -> ModerationResult<Outcome> {
        let ranks = self.permissions.ranks();
        let member = ranks
            .get(staff_id)
            .ok_or(ModerationError::NotStaff(staff_id))?;

        let (strike, total) = self
            .ledger
            .record_strike(Strike::new(staff_id, reason, proof, actor))
            .await?;

        let removed = if total == STRIKE_THRESHOLD {
            ranks.revoke(staff_id).await?;
            warn!(staff_id, strikes = total, "Strike threshold reached, rank removed");
            self.audit
                .record(
                    AuditEvent::new(Actor::System, "Staff Member Removed")
                        .field("Staff Member", format!("<@{staff_id}>"))
                        .field("Reason", "3 Strikes - Automatic Removal")
                        .field("Total Strikes", total),
                )
                .await;
            Some(member.rank)
        } else {
            None
        };

        Ok(Outcome::StrikeIssued {
            strike,
            total,
            removed,
        })
    }

    async fn unban_wave(&self) -> ModerationResult<Outcome> {
        let removed = self.ledger.clear_bans().await?;
        info!(count = removed.len(), "Unban wave cleared all bans");
        let relayed = self.deliver(RelayAction::UnbanWave).await;
        Ok(Outcome::BansCleared {
            count: removed.len(),
            relayed,
        })
    }

    async fn blacklist_group(&self, actor: Actor, group_id: u64) -> ModerationResult<Outcome> {
        let group = self
            .directory
            .group_info(group_id)
            .await?
            .ok_or(ModerationError::GroupNotFound(group_id))?;

        self.ledger
            .blacklist_group(BlacklistedGroup {
                group_id,
                blacklisted_by: actor,
                blacklisted_at: Utc::now(),
            })
            .await?;
        let relayed = self.deliver(RelayAction::BlacklistCrew { group_id }).await;
        Ok(Outcome::GroupBlacklisted { group, relayed })
    }

    async fn set_group_rank(&self, player: &PlayerRef, role: &str) -> ModerationResult<Outcome> {
        let group_id = self
            .group_id
            .ok_or(ModerationError::NotConfigured("GROUP_ID"))?;
        let player = self.resolve(player).await?;
        let roles = self.directory.group_roles(group_id).await?;
        let role = select_role(roles, role)
            .ok_or_else(|| ModerationError::RoleNotFound(role.to_string()))?;

        self.directory
            .set_group_role(group_id, player.id, role.id)
            .await?;
        let relayed = self
            .deliver(RelayAction::GroupRank {
                user_id: player.id,
                role_id: role.id,
                role_name: role.name.clone(),
            })
            .await;
        Ok(Outcome::GroupRankChanged {
            player,
            role,
            relayed,
        })
    }

    /// Lift every ban that has run out at `now`.
    ///
    /// Each ban is handled on its own; one failure never stops the rest.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for ban in self.ledger.expired_bans(now) {
            match self.ledger.remove_ban_if_unchanged(&ban).await {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(subject_id = ban.subject_id, error = %e, "Failed to lift expired ban");
                    report.failed += 1;
                    continue;
                }
            }

            self.deliver(RelayAction::Unban {
                user_id: ban.subject_id,
            })
            .await;

            let entry = HistoryEntry::new(
                ban.subject_id,
                &ban.display_name,
                PunishmentKind::ExpiredUnban,
                ban.reason.clone(),
                ban.proof.clone(),
                Actor::System,
            );
            if let Err(e) = self.ledger.append_history(entry).await {
                warn!(subject_id = ban.subject_id, error = %e, "Failed to record expired unban");
            }

            info!(subject_id = ban.subject_id, "Expired ban lifted");
            report.lifted += 1;
        }

        report
    }

    /// Rank held by `actor`, with the super-admin always an owner
    #[must_use]
    pub fn rank_of(&self, actor: u64) -> Option<Rank> {
        self.permissions.rank_of(actor)
    }
}
