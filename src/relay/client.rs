//! Modqueue HTTP client

use crate::relay::{RelayAction, RelayError, RelayResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Something that can carry an enforcement intent to the live game
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionRelay: Send + Sync {
    /// Deliver one action. Delivery is not retried.
    async fn send(&self, action: &RelayAction) -> RelayResult<()>;
}

/// Relay that POSTs `{action, data, secret}` to `<base>/command`
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
}

impl HttpRelay {
    /// Create a relay for the modqueue at `base_url`
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> RelayResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/command", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            secret: secret.into(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ActionRelay for HttpRelay {
    async fn send(&self, action: &RelayAction) -> RelayResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&action.envelope(&self.secret))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Rejected {
                action: action.name().to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(target: crate::RELAY_TARGET, action = %action, "Relayed to modqueue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn relay(server: &MockServer) -> HttpRelay {
        HttpRelay::new(&format!("{}/", server.uri()), "secret", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/command"))
            .and(body_json(json!({
                "action": "kick",
                "data": { "userId": 77, "reason": "afk farming" },
                "secret": "secret",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let action = RelayAction::Kick {
            user_id: 77,
            reason: "afk farming".into(),
        };
        relay(&server).send(&action).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/command"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad secret"))
            .mount(&server)
            .await;

        let result = relay(&server).send(&RelayAction::UnbanWave).await;
        match result {
            Err(RelayError::Rejected { action, status, body }) => {
                assert_eq!(action, "unbanwave");
                assert_eq!(status, 403);
                assert_eq!(body, "bad secret");
            }
            other => panic!("Expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let relay = HttpRelay::new("http://127.0.0.1:9", "secret", Duration::from_millis(200)).unwrap();
        let result = relay.send(&RelayAction::RestartAllServers).await;
        assert!(matches!(result, Err(RelayError::Transport(_))));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let relay = HttpRelay::new("https://modqueue.example/", "s", Duration::from_secs(1)).unwrap();
        assert_eq!(relay.endpoint(), "https://modqueue.example/command");
    }
}
