//! Game platform lookups
//!
//! Read-only player, group and game queries, plus the one privileged write the
//! console performs: changing a player's role in the community group.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from the lookup collaborator
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("No session credential configured for group role changes")]
    MissingCredential,
}

pub type LookupResult<T> = Result<T, LookupError>;

/// How a moderator named a player
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlayerRef {
    ById(u64),
    ByName(String),
}

impl PlayerRef {
    /// Build a reference from raw command input.
    ///
    /// All-digit input is an id, anything else a username. Blank input is
    /// not a reference.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = trimmed.parse() {
                return Some(Self::ById(id));
            }
        }
        Some(Self::ByName(trimmed.to_string()))
    }
}

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ById(id) => write!(f, "{id}"),
            Self::ByName(name) => f.write_str(name),
        }
    }
}

/// A resolved player account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// Profile details shown by the lookup command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerDetails {
    pub player: Player,
    pub description: String,
    pub created: Option<DateTime<Utc>>,
    pub is_banned: bool,
    pub friend_count: u64,
    pub follower_count: u64,
    pub following_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub member_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRole {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub rank: u64,
    #[serde(default)]
    pub member_count: u64,
}

/// Live population of a game universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GameStats {
    pub playing: u64,
    pub visits: u64,
}

/// Lookup collaborator.
///
/// `Ok(None)` means the platform says the thing does not exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn resolve(&self, player: &PlayerRef) -> LookupResult<Option<Player>>;

    async fn details(&self, user_id: u64) -> LookupResult<Option<PlayerDetails>>;

    async fn game_stats(&self, universe_id: &str) -> LookupResult<Option<GameStats>>;

    async fn group_info(&self, group_id: u64) -> LookupResult<Option<GroupInfo>>;

    async fn group_roles(&self, group_id: u64) -> LookupResult<Vec<GroupRole>>;

    /// Change a member's role using the privileged session credential
    async fn set_group_role(&self, group_id: u64, user_id: u64, role_id: u64) -> LookupResult<()>;
}

/// Base URLs of the platform APIs
#[derive(Debug, Clone)]
pub struct PlatformUrls {
    pub users: String,
    pub friends: String,
    pub games: String,
    pub groups: String,
    /// Group writes must go to the origin, not a proxy
    pub groups_write: String,
}

impl Default for PlatformUrls {
    fn default() -> Self {
        Self {
            users: "https://users.roproxy.com".into(),
            friends: "https://friends.roproxy.com".into(),
            games: "https://games.roproxy.com".into(),
            groups: "https://groups.roproxy.com".into(),
            groups_write: "https://groups.roblox.com".into(),
        }
    }
}

impl PlatformUrls {
    /// Every API served from one origin
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            users: base.clone(),
            friends: base.clone(),
            games: base.clone(),
            groups: base.clone(),
            groups_write: base,
        }
    }
}

#[derive(Deserialize)]
struct DataList<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct RoleList {
    roles: Vec<GroupRole>,
}

#[derive(Deserialize)]
struct Count {
    count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    #[serde(flatten)]
    player: Player,
    #[serde(default)]
    description: String,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    is_banned: bool,
}

const CSRF_HEADER: &str = "x-csrf-token";

/// `PlayerDirectory` backed by the public platform web APIs
#[derive(Debug, Clone)]
pub struct RobloxClient {
    client: reqwest::Client,
    urls: PlatformUrls,
    cookie: Option<String>,
}

impl RobloxClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(urls: PlatformUrls, cookie: Option<String>, timeout: Duration) -> LookupResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            urls,
            cookie: cookie.filter(|c| !c.is_empty()),
        })
    }

    /// GET a JSON document, mapping "does not exist" statuses to `None`
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> LookupResult<Option<T>> {
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(LookupError::Status {
                url,
                status: status.as_u16(),
            }),
        }
    }

    async fn count(&self, url: String) -> LookupResult<u64> {
        Ok(self.get_json::<Count>(url).await?.map_or(0, |c| c.count))
    }

    async fn by_name(&self, name: &str) -> LookupResult<Option<Player>> {
        let url = format!("{}/v1/usernames/users", self.urls.users);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "usernames": [name], "excludeBannedUsers": false }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(LookupError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let found: DataList<Player> = response.json().await?;
        Ok(found.data.into_iter().next())
    }

    async fn profile(&self, user_id: u64) -> LookupResult<Option<UserProfile>> {
        self.get_json(format!("{}/v1/users/{user_id}", self.urls.users))
            .await
    }
}

#[async_trait]
impl PlayerDirectory for RobloxClient {
    async fn resolve(&self, player: &PlayerRef) -> LookupResult<Option<Player>> {
        match player {
            PlayerRef::ById(id) => Ok(self.profile(*id).await?.map(|p| p.player)),
            PlayerRef::ByName(name) => self.by_name(name).await,
        }
    }

    async fn details(&self, user_id: u64) -> LookupResult<Option<PlayerDetails>> {
        let friends = &self.urls.friends;
        let (profile, friend_count, follower_count, following_count) = tokio::try_join!(
            self.profile(user_id),
            self.count(format!("{friends}/v1/users/{user_id}/friends/count")),
            self.count(format!("{friends}/v1/users/{user_id}/followers/count")),
            self.count(format!("{friends}/v1/users/{user_id}/followings/count")),
        )?;

        Ok(profile.map(|profile| PlayerDetails {
            player: profile.player,
            description: profile.description,
            created: profile.created,
            is_banned: profile.is_banned,
            friend_count,
            follower_count,
            following_count,
        }))
    }

    async fn game_stats(&self, universe_id: &str) -> LookupResult<Option<GameStats>> {
        let url = format!("{}/v1/games?universeIds={universe_id}", self.urls.games);
        let games: Option<DataList<GameStats>> = self.get_json(url).await?;
        Ok(games.and_then(|g| g.data.into_iter().next()))
    }

    async fn group_info(&self, group_id: u64) -> LookupResult<Option<GroupInfo>> {
        self.get_json(format!("{}/v1/groups/{group_id}", self.urls.groups))
            .await
    }

    async fn group_roles(&self, group_id: u64) -> LookupResult<Vec<GroupRole>> {
        let url = format!("{}/v1/groups/{group_id}/roles", self.urls.groups);
        let roles: Option<RoleList> = self.get_json(url).await?;
        Ok(roles.map(|r| r.roles).unwrap_or_default())
    }

    async fn set_group_role(&self, group_id: u64, user_id: u64, role_id: u64) -> LookupResult<()> {
        let cookie = self.cookie.as_deref().ok_or(LookupError::MissingCredential)?;
        let url = format!("{}/v1/groups/{group_id}/users/{user_id}", self.urls.groups_write);
        let request = || {
            self.client
                .patch(&url)
                .header(reqwest::header::COOKIE, format!(".ROBLOSECURITY={cookie}"))
                .json(&json!({ "roleId": role_id }))
        };

        let mut response = request().send().await?;

        // The platform hands out a CSRF token on the first rejected write
        if response.status() == StatusCode::FORBIDDEN {
            if let Some(token) = response.headers().get(CSRF_HEADER).cloned() {
                debug!(group_id, user_id, "Retrying group role change with CSRF token");
                response = request().header(CSRF_HEADER, token).send().await?;
            }
        }

        if !response.status().is_success() {
            return Err(LookupError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, cookie: Option<&str>) -> RobloxClient {
        RobloxClient::new(
            PlatformUrls::single(&server.uri()),
            cookie.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_player_ref_parse() {
        assert_eq!(PlayerRef::parse(" 12345 "), Some(PlayerRef::ById(12345)));
        assert_eq!(
            PlayerRef::parse("Builderman"),
            Some(PlayerRef::ByName("Builderman".into()))
        );
        assert_eq!(
            PlayerRef::parse("123abc"),
            Some(PlayerRef::ByName("123abc".into()))
        );
        assert_eq!(PlayerRef::parse("   "), None);
        assert_eq!(PlayerRef::parse(""), None);
        // Too large for u64 falls back to a name
        assert_eq!(
            PlayerRef::parse("99999999999999999999999"),
            Some(PlayerRef::ByName("99999999999999999999999".into()))
        );
    }

    #[tokio::test]
    async fn test_resolve_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usernames/users"))
            .and(body_json(json!({ "usernames": ["builderman"], "excludeBannedUsers": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "requestedUsername": "builderman", "id": 156, "name": "builderman", "displayName": "Builderman" }]
            })))
            .mount(&server)
            .await;

        let player = client(&server, None)
            .resolve(&PlayerRef::ByName("builderman".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.id, 156);
        assert_eq!(player.display_name, "Builderman");
    }

    #[tokio::test]
    async fn test_resolve_unknown_name_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usernames/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let player = client(&server, None)
            .resolve(&PlayerRef::ByName("nobody".into()))
            .await
            .unwrap();
        assert!(player.is_none());
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let player = client(&server, None)
            .resolve(&PlayerRef::ById(1))
            .await
            .unwrap();
        assert!(player.is_none());
    }

    #[tokio::test]
    async fn test_details_combines_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users/156"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 156,
                "name": "builderman",
                "displayName": "Builderman",
                "description": "hi",
                "created": "2006-02-27T21:06:40.3Z",
                "isBanned": false
            })))
            .mount(&server)
            .await;
        for (kind, count) in [("friends", 10), ("followers", 20), ("followings", 30)] {
            Mock::given(method("GET"))
                .and(path(format!("/v1/users/156/{kind}/count")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": count })))
                .mount(&server)
                .await;
        }

        let details = client(&server, None).details(156).await.unwrap().unwrap();
        assert_eq!(details.player.name, "builderman");
        assert_eq!(details.friend_count, 10);
        assert_eq!(details.follower_count, 20);
        assert_eq!(details.following_count, 30);
        assert!(details.created.is_some());
    }

    #[tokio::test]
    async fn test_game_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/games"))
            .and(query_param("universeIds", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": 42, "name": "Game", "playing": 120, "visits": 99000 }]
            })))
            .mount(&server)
            .await;

        let stats = client(&server, None).game_stats("42").await.unwrap().unwrap();
        assert_eq!(stats, GameStats { playing: 120, visits: 99000 });
    }

    #[tokio::test]
    async fn test_server_error_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/groups/7"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server, None).group_info(7).await;
        assert!(matches!(result, Err(LookupError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_group_roles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/groups/7/roles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "groupId": 7,
                "roles": [
                    { "id": 1, "name": "Guest", "rank": 0, "memberCount": 0 },
                    { "id": 2, "name": "Member", "rank": 1, "memberCount": 50 }
                ]
            })))
            .mount(&server)
            .await;

        let roles = client(&server, None).group_roles(7).await.unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[1].name, "Member");
    }

    #[tokio::test]
    async fn test_set_group_role_requires_cookie() {
        let server = MockServer::start().await;
        let result = client(&server, None).set_group_role(7, 156, 2).await;
        assert!(matches!(result, Err(LookupError::MissingCredential)));
    }

    #[tokio::test]
    async fn test_set_group_role_retries_with_csrf_token() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/groups/7/users/156"))
            .and(header(CSRF_HEADER, "token123"))
            .and(header("cookie", ".ROBLOSECURITY=abc"))
            .and(body_json(json!({ "roleId": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/v1/groups/7/users/156"))
            .respond_with(ResponseTemplate::new(403).insert_header(CSRF_HEADER, "token123"))
            .mount(&server)
            .await;

        client(&server, Some("abc"))
            .set_group_role(7, 156, 2)
            .await
            .unwrap();
    }
}
