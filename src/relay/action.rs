//! Enforcement intents understood by the modqueue service.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::fmt;

/// An action forwarded to the live game through the modqueue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    Kick {
        user_id: u64,
        reason: String,
    },
    Ban {
        user_id: u64,
        reason: String,
        /// `None` for a permanent ban
        expires_at: Option<DateTime<Utc>>,
    },
    Unban {
        user_id: u64,
    },
    /// Lift every ban at once
    UnbanWave,
    Warn {
        user_id: u64,
        reason: String,
    },
    Mute {
        user_id: u64,
        duration_ms: u64,
        reason: String,
    },
    Message {
        user_id: u64,
        message: String,
    },
    Announce {
        message: String,
    },
    AddCash {
        user_id: u64,
        amount: i64,
    },
    RemoveCash {
        user_id: u64,
        amount: i64,
    },
    SetCash {
        user_id: u64,
        amount: i64,
    },
    BlacklistCrew {
        group_id: u64,
    },
    RemoveCrewBlacklist {
        group_id: u64,
    },
    RestartAllServers,
    GroupRank {
        user_id: u64,
        role_id: u64,
        role_name: String,
    },
}

impl RelayAction {
    /// Action name on the wire
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kick { .. } => "kick",
            Self::Ban { .. } => "ban",
            Self::Unban { .. } => "unban",
            Self::UnbanWave => "unbanwave",
            Self::Warn { .. } => "warn",
            Self::Mute { .. } => "mute",
            Self::Message { .. } => "message",
            Self::Announce { .. } => "announce",
            Self::AddCash { .. } => "addcash",
            Self::RemoveCash { .. } => "removecash",
            Self::SetCash { .. } => "setcash",
            Self::BlacklistCrew { .. } => "blacklistcrew",
            Self::RemoveCrewBlacklist { .. } => "removecrewblacklist",
            Self::RestartAllServers => "restartallservers",
            Self::GroupRank { .. } => "grouprank",
        }
    }

    /// Action-specific `data` object. Times are epoch milliseconds.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Kick { user_id, reason } | Self::Warn { user_id, reason } => {
                json!({ "userId": user_id, "reason": reason })
            }
            Self::Ban {
                user_id,
                reason,
                expires_at,
            } => json!({
                "userId": user_id,
                "reason": reason,
                "expiresAt": expires_at.map(|t| t.timestamp_millis()),
            }),
            Self::Unban { user_id } => json!({ "userId": user_id }),
            Self::UnbanWave | Self::RestartAllServers => json!({}),
            Self::Mute {
                user_id,
                duration_ms,
                reason,
            } => json!({ "userId": user_id, "duration": duration_ms, "reason": reason }),
            Self::Message { user_id, message } => json!({ "userId": user_id, "message": message }),
            Self::Announce { message } => json!({ "message": message }),
            Self::AddCash { user_id, amount }
            | Self::RemoveCash { user_id, amount }
            | Self::SetCash { user_id, amount } => json!({ "userId": user_id, "amount": amount }),
            Self::BlacklistCrew { group_id } | Self::RemoveCrewBlacklist { group_id } => {
                json!({ "groupId": group_id })
            }
            Self::GroupRank {
                user_id,
                role_id,
                role_name,
            } => json!({ "userId": user_id, "roleId": role_id, "roleName": role_name }),
        }
    }

    /// Full request body including the shared secret
    #[must_use]
    pub fn envelope(&self, secret: &str) -> Value {
        json!({
            "action": self.name(),
            "data": self.payload(),
            "secret": secret,
        })
    }

    /// The player this action targets, if any
    #[must_use]
    pub fn user_id(&self) -> Option<u64> {
        match self {
            Self::Kick { user_id, .. }
            | Self::Ban { user_id, .. }
            | Self::Unban { user_id }
            | Self::Warn { user_id, .. }
            | Self::Mute { user_id, .. }
            | Self::Message { user_id, .. }
            | Self::AddCash { user_id, .. }
            | Self::RemoveCash { user_id, .. }
            | Self::SetCash { user_id, .. }
            | Self::GroupRank { user_id, .. } => Some(*user_id),
            Self::UnbanWave
            | Self::Announce { .. }
            | Self::BlacklistCrew { .. }
            | Self::RemoveCrewBlacklist { .. }
            | Self::RestartAllServers => None,
        }
    }
}

impl fmt::Display for RelayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.user_id() {
            Some(user_id) => write!(f, "{} ({user_id})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ban_envelope() {
        let expires_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let action = RelayAction::Ban {
            user_id: 42,
            reason: "exploiting".into(),
            expires_at: Some(expires_at),
        };

        let body = action.envelope("shh");
        assert_eq!(body["action"], "ban");
        assert_eq!(body["secret"], "shh");
        assert_eq!(body["data"]["userId"], 42);
        assert_eq!(body["data"]["reason"], "exploiting");
        assert_eq!(body["data"]["expiresAt"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_permanent_ban_has_null_expiry() {
        let action = RelayAction::Ban {
            user_id: 42,
            reason: "cheating".into(),
            expires_at: None,
        };
        assert!(action.payload()["expiresAt"].is_null());
    }

    #[test]
    fn test_bulk_actions_send_empty_data() {
        assert_eq!(RelayAction::UnbanWave.payload(), json!({}));
        assert_eq!(RelayAction::RestartAllServers.name(), "restartallservers");
        assert_eq!(RelayAction::RestartAllServers.user_id(), None);
    }

    #[test]
    fn test_cash_payload() {
        let action = RelayAction::RemoveCash {
            user_id: 9,
            amount: 500,
        };
        assert_eq!(action.name(), "removecash");
        assert_eq!(action.payload(), json!({ "userId": 9, "amount": 500 }));
        assert_eq!(action.to_string(), "removecash (9)");
    }

    #[test]
    fn test_mute_payload() {
        let action = RelayAction::Mute {
            user_id: 3,
            duration_ms: 60_000,
            reason: "spam".into(),
        };
        assert_eq!(
            action.payload(),
            json!({ "userId": 3, "duration": 60_000, "reason": "spam" })
        );
    }
}
