//! Audit notifications for staff actions

use crate::ledger::Actor;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::model::id::{ChannelId, UserId};
use std::sync::Arc;
use tracing::{info, warn};

const AUDIT_COLOUR: u32 = 0x00E6_7E22;

/// One audited operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub actor: Actor,
    pub title: String,
    pub fields: Vec<(String, String)>,
}

impl AuditEvent {
    pub fn new(actor: Actor, title: impl Into<String>) -> Self {
        Self {
            actor,
            title: title.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((name.into(), value.to_string()));
        self
    }

    /// Plain-text rendering used by log lines and tests
    #[must_use]
    pub fn summary(&self) -> String {
        let details = self
            .fields
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        if details.is_empty() {
            format!("{} by {}", self.title, self.actor)
        } else {
            format!("{} by {} ({details})", self.title, self.actor)
        }
    }
}

/// Receives a record of every operation the console performs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an event. Delivery problems are the sink's own concern.
    async fn record(&self, event: AuditEvent);
}

/// Sink that only writes structured log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

#[async_trait]
impl AuditSink for TracingAudit {
    async fn record(&self, event: AuditEvent) {
        info!(
            target: crate::AUDIT_TARGET,
            actor = %event.actor,
            title = %event.title,
            "{}",
            event.summary()
        );
    }
}

/// Sink that posts an embed to the logs channel and DMs the owner
pub struct DiscordAudit {
    http: Arc<serenity::Http>,
    logs_channel: Option<ChannelId>,
    owner: UserId,
}

impl DiscordAudit {
    pub fn new(http: Arc<serenity::Http>, logs_channel: Option<u64>, owner: u64) -> Self {
        Self {
            http,
            logs_channel: logs_channel.map(ChannelId::new),
            owner: UserId::new(owner),
        }
    }

    fn embed(event: &AuditEvent) -> CreateEmbed {
        let actor = match event.actor {
            Actor::System => crate::SYSTEM_ACTOR.to_string(),
            Actor::Staff(id) => format!("<@{id}>"),
        };
        event
            .fields
            .iter()
            .fold(
                CreateEmbed::new()
                    .title(&event.title)
                    .colour(AUDIT_COLOUR)
                    .field("Moderator", actor, true),
                |embed, (name, value)| embed.field(name, value, true),
            )
            .footer(CreateEmbedFooter::new(crate::BOT_NAME))
            .timestamp(serenity::Timestamp::now())
    }
}

#[async_trait]
impl AuditSink for DiscordAudit {
    async fn record(&self, event: AuditEvent) {
        TracingAudit.record(event.clone()).await;

        let embed = Self::embed(&event);

        if let Some(channel) = self.logs_channel {
            let message = CreateMessage::new().embed(embed.clone());
            if let Err(e) = channel.send_message(self.http.as_ref(), message).await {
                warn!(target: crate::AUDIT_TARGET, error = %e, "Failed to post audit to logs channel");
            }
        }

        let message = CreateMessage::new().embed(embed);
        if let Err(e) = self.owner.direct_message(self.http.as_ref(), message).await {
            warn!(target: crate::AUDIT_TARGET, error = %e, "Failed to DM audit to owner");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let event = AuditEvent::new(Actor::Staff(5), "Player Kicked")
            .field("Player", "builderman")
            .field("Reason", "afk");
        assert_eq!(
            event.summary(),
            "Player Kicked by 5 (Player: builderman, Reason: afk)"
        );
        assert_eq!(
            AuditEvent::new(Actor::System, "Sweep").summary(),
            "Sweep by SYSTEM"
        );
    }
}
