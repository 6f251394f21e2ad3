//! Ledger records
//!
//! Rows stored by the case ledger: active bans, warnings, strikes, the
//! punishment history audit trail and blacklisted groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who performed an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// Automatic action taken by the console itself
    System,
    /// A staff member, by chat identity
    Staff(u64),
}

impl Actor {
    /// The staff identity, if this actor is a person
    #[must_use]
    pub fn staff_id(&self) -> Option<u64> {
        match self {
            Self::System => None,
            Self::Staff(id) => Some(*id),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "{}", crate::SYSTEM_ACTOR),
            Self::Staff(id) => write!(f, "{id}"),
        }
    }
}

/// An active ban. At most one exists per subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    /// Game platform identity of the banned player
    pub subject_id: u64,
    pub display_name: String,
    pub reason: String,
    pub proof: String,
    pub issued_by: Actor,
    pub issued_at: DateTime<Utc>,
    /// `None` for a permanent ban
    pub expires_at: Option<DateTime<Utc>>,
}

impl Ban {
    /// Create a ban issued now
    pub fn new(
        subject_id: u64,
        display_name: impl Into<String>,
        reason: impl Into<String>,
        proof: impl Into<String>,
        issued_by: Actor,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            subject_id,
            display_name: display_name.into(),
            reason: reason.into(),
            proof: proof.into(),
            issued_by,
            issued_at: Utc::now(),
            expires_at,
        }
    }

    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Check if this ban has run out at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// A warning issued to a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Assigned by the ledger on insert
    pub id: u64,
    pub subject_id: u64,
    pub display_name: String,
    pub reason: String,
    pub proof: String,
    pub issued_by: Actor,
    pub issued_at: DateTime<Utc>,
}

impl Warning {
    /// Create an unsaved warning issued now
    pub fn new(
        subject_id: u64,
        display_name: impl Into<String>,
        reason: impl Into<String>,
        proof: impl Into<String>,
        issued_by: Actor,
    ) -> Self {
        Self {
            id: 0,
            subject_id,
            display_name: display_name.into(),
            reason: reason.into(),
            proof: proof.into(),
            issued_by,
            issued_at: Utc::now(),
        }
    }
}

/// A strike against a staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strike {
    /// Assigned by the ledger on insert
    pub id: u64,
    pub staff_id: u64,
    pub reason: String,
    pub proof: String,
    pub issued_by: Actor,
    pub issued_at: DateTime<Utc>,
}

impl Strike {
    /// Create an unsaved strike issued now
    pub fn new(
        staff_id: u64,
        reason: impl Into<String>,
        proof: impl Into<String>,
        issued_by: Actor,
    ) -> Self {
        Self {
            id: 0,
            staff_id,
            reason: reason.into(),
            proof: proof.into(),
            issued_by,
            issued_at: Utc::now(),
        }
    }
}

/// Kind of punishment recorded in the history trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunishmentKind {
    Kick,
    Ban,
    Unban,
    /// Carries the duration expression the moderator typed
    Tempban(String),
    Warn,
    Mute(String),
    /// Triggered by the third warning
    AutoBan,
    /// Tempban reversed by the expiry sweeper
    ExpiredUnban,
}

impl fmt::Display for PunishmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kick => write!(f, "Kick"),
            Self::Ban => write!(f, "Ban"),
            Self::Unban => write!(f, "Unban"),
            Self::Tempban(duration) => write!(f, "Tempban ({duration})"),
            Self::Warn => write!(f, "Warn"),
            Self::Mute(duration) => write!(f, "Mute ({duration})"),
            Self::AutoBan => write!(f, "Auto-Ban"),
            Self::ExpiredUnban => write!(f, "Unban (Expired)"),
        }
    }
}

/// One entry of the punishment history audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Assigned by the ledger on insert
    pub id: u64,
    pub subject_id: u64,
    pub display_name: String,
    pub action: PunishmentKind,
    pub reason: String,
    pub proof: String,
    pub moderator: Actor,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Create an unsaved history entry stamped now
    pub fn new(
        subject_id: u64,
        display_name: impl Into<String>,
        action: PunishmentKind,
        reason: impl Into<String>,
        proof: impl Into<String>,
        moderator: Actor,
    ) -> Self {
        Self {
            id: 0,
            subject_id,
            display_name: display_name.into(),
            action,
            reason: reason.into(),
            proof: proof.into(),
            moderator,
            timestamp: Utc::now(),
        }
    }

    /// Label shown to staff, e.g. `Tempban (3d)`
    #[must_use]
    pub fn action_label(&self) -> String {
        self.action.to_string()
    }
}

/// A game group barred from playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistedGroup {
    pub group_id: u64,
    pub blacklisted_by: Actor,
    pub blacklisted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_ban_expiry() {
        let now = Utc::now();
        let mut ban = Ban::new(1, "player", "reason", "proof", Actor::Staff(7), None);
        assert!(ban.is_permanent());
        assert!(!ban.is_expired_at(now + Duration::days(365)));

        ban.expires_at = Some(now - Duration::milliseconds(1));
        assert!(!ban.is_permanent());
        assert!(ban.is_expired_at(now));

        ban.expires_at = Some(now + Duration::hours(1));
        assert!(!ban.is_expired_at(now));
    }

    #[test]
    fn test_punishment_labels() {
        assert_eq!(PunishmentKind::Kick.to_string(), "Kick");
        assert_eq!(PunishmentKind::Tempban("3d 2h".into()).to_string(), "Tempban (3d 2h)");
        assert_eq!(PunishmentKind::Mute("30m".into()).to_string(), "Mute (30m)");
        assert_eq!(PunishmentKind::AutoBan.to_string(), "Auto-Ban");
    }

    #[test]
    fn test_actor_display() {
        assert_eq!(Actor::System.to_string(), "SYSTEM");
        assert_eq!(Actor::Staff(42).to_string(), "42");
        assert_eq!(Actor::System.staff_id(), None);
        assert_eq!(Actor::Staff(42).staff_id(), Some(42));
    }

    #[test]
    fn test_history_entry_serialization() {
        let entry = HistoryEntry::new(
            99,
            "player",
            PunishmentKind::Tempban("1d".into()),
            "exploiting",
            "clip",
            Actor::Staff(5),
        );

        let serialized = serde_yaml::to_string(&entry).expect("Failed to serialize");
        assert!(serialized.contains("subject_id: 99"));
        assert!(serialized.contains("Tempban"));

        let deserialized: HistoryEntry =
            serde_yaml::from_str(&serialized).expect("Failed to deserialize");
        assert_eq!(deserialized, entry);
        assert_eq!(deserialized.action_label(), "Tempban (1d)");
    }
}
