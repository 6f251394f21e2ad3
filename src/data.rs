use std::{ops::Deref, sync::Arc};

use crate::config::BotConfig;
use crate::moderation::ModerationService;
use poise::serenity_prelude as serenity;
use serenity::prelude::TypeMapKey;

/// Shared state handed to every command and event handler
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

pub struct DataInner {
    pub config: BotConfig,
    pub moderation: Arc<ModerationService>,
}

// Stored in Serenity's data map so the event handler can reach it
impl TypeMapKey for Data {
    type Value = Data;
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("owner_id", &self.config.owner_id)
            .field("group_id", &self.config.group_id)
            .field("game_name", &self.config.game_name)
            .finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    #[must_use]
    pub fn new(config: BotConfig, moderation: Arc<ModerationService>) -> Self {
        Self(Arc::new(DataInner { config, moderation }))
    }

    #[must_use]
    pub fn moderation(&self) -> &ModerationService {
        &self.moderation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAudit;
    use crate::ledger::{Ledger, RuntimeConfig};
    use crate::lookup::MockPlayerDirectory;
    use crate::permissions::{Permissions, RankStore};
    use crate::relay::MockActionRelay;

    fn data() -> Data {
        let config = BotConfig::from_sources(None, |key| match key {
            "DISCORD_TOKEN" => Some("very-secret-token".into()),
            "MODQUEUE_URL" => Some("https://modqueue.example".into()),
            "MODQUEUE_SECRET" => Some("secret".into()),
            "BOT_OWNER_ID" => Some("99".into()),
            _ => None,
        })
        .unwrap();
        let moderation = ModerationService::new(
            Arc::new(Ledger::in_memory()),
            Arc::new(Permissions::new(99, Arc::new(RankStore::default()))),
            Arc::new(RuntimeConfig::default()),
            Arc::new(MockActionRelay::new()),
            Arc::new(MockPlayerDirectory::new()),
            Arc::new(TracingAudit),
        );
        Data::new(config, Arc::new(moderation))
    }

    #[test]
    fn test_debug_hides_credentials() {
        let output = format!("{:?}", data());
        assert!(output.contains("owner_id: 99"));
        assert!(!output.contains("very-secret-token"));
    }

    #[test]
    fn test_clones_share_state() {
        let data = data();
        let clone = data.clone();
        assert!(Arc::ptr_eq(&data.0, &clone.0));
        assert_eq!(clone.moderation().rank_of(99), Some(crate::permissions::Rank::Owner));
    }
}
