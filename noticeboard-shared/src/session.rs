/// Redis-backed session store
///
/// All state that must survive between the two phases of a confirm flow —
/// the signed-in user, the staged snapshots, flash messages — lives here,
/// keyed by a random id carried in a cookie. Because nothing is held in
/// process memory, any server process can handle either phase of a flow.
///
/// Sessions expire via Redis TTL; an expired session simply reads back as
/// absent and the caller starts over with an empty one.
///
/// # Example
///
/// ```no_run
/// use noticeboard_shared::redis::{RedisClient, RedisConfig};
/// use noticeboard_shared::session::SessionStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let redis = RedisClient::new(RedisConfig::from_env()?).await?;
/// let store = SessionStore::new(redis, 1209600);
///
/// let mut session = store.create().await?;
/// session.data.flash.push("Welcome".to_string());
/// store.save(&session).await?;
/// # Ok(())
/// # }
/// ```

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::confirm::ConfirmFlow;
use crate::models::post::PostDraft;
use crate::models::user::UserDraft;
use crate::redis::{RedisClient, RedisClientError};

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "boardsession";

const SESSION_KEY_PREFIX: &str = "session:";
const SESSION_ID_LEN: usize = 32;

/// Session store errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Redis failure
    #[error(transparent)]
    Backend(#[from] RedisClientError),

    /// Session payload could not be serialized
    #[error("Failed to serialize session data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything a session carries
///
/// The confirm flows are typed fields — one per resource type — rather than
/// loose marker booleans, so a post flow can never be confused with a user
/// flow and a staged snapshot can never outlive its marker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    /// Signed-in user, if any
    pub user_id: Option<Uuid>,

    /// Pending post create/edit
    #[serde(default)]
    pub post_flow: ConfirmFlow<PostDraft>,

    /// Pending user create/edit
    #[serde(default)]
    pub user_flow: ConfirmFlow<UserDraft>,

    /// One-shot messages shown on the next rendered page
    #[serde(default)]
    pub flash: Vec<String>,
}

impl SessionData {
    /// Drains the flash messages for rendering
    pub fn take_flash(&mut self) -> Vec<String> {
        std::mem::take(&mut self.flash)
    }
}

/// A loaded session: its cookie id plus its data
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
}

/// Redis-backed session store
#[derive(Clone)]
pub struct SessionStore {
    redis: RedisClient,
    ttl_seconds: u64,
}

impl SessionStore {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    /// Creates and persists a fresh, empty session
    pub async fn create(&self) -> Result<Session, SessionError> {
        let session = Session {
            id: new_session_id(),
            data: SessionData::default(),
        };
        self.save(&session).await?;
        Ok(session)
    }

    /// Loads a session by id
    ///
    /// Returns `None` for unknown or expired ids. A payload that no longer
    /// deserializes (e.g. after a schema change) is treated as expired
    /// rather than failing the request.
    pub async fn load(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let mut conn = self.redis.get_connection();

        let payload: Option<String> = redis::cmd("GET")
            .arg(session_key(id))
            .query_async(&mut conn)
            .await
            .map_err(RedisClientError::from)?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(data) => Ok(Some(Session {
                id: id.to_string(),
                data,
            })),
            Err(e) => {
                tracing::warn!("Discarding undecodable session payload: {}", e);
                Ok(None)
            }
        }
    }

    /// Persists a session, refreshing its TTL
    pub async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let payload = serde_json::to_string(&session.data)?;
        let mut conn = self.redis.get_connection();

        redis::cmd("SET")
            .arg(session_key(&session.id))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(RedisClientError::from)?;

        Ok(())
    }

    /// Removes a session
    pub async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let mut conn = self.redis.get_connection();

        redis::cmd("DEL")
            .arg(session_key(id))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(RedisClientError::from)?;

        Ok(())
    }
}

fn session_key(id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{id}")
}

/// Generates a random alphanumeric session id
fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::PostStatus;

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }

    #[test]
    fn test_session_key_prefix() {
        assert_eq!(session_key("abc"), "session:abc");
    }

    #[test]
    fn test_default_session_data_roundtrip() {
        let data = SessionData::default();
        let json = serde_json::to_string(&data).unwrap();
        let restored: SessionData = serde_json::from_str(&json).unwrap();

        assert!(restored.user_id.is_none());
        assert!(!restored.post_flow.is_staged());
        assert!(!restored.user_flow.is_staged());
        assert!(restored.flash.is_empty());
    }

    #[test]
    fn test_staged_flow_roundtrip() {
        let mut data = SessionData::default();
        data.post_flow.stage(
            PostDraft {
                title: "Title".to_string(),
                description: "Body".to_string(),
                status: PostStatus::Active,
            },
            None,
        );

        let json = serde_json::to_string(&data).unwrap();
        let restored: SessionData = serde_json::from_str(&json).unwrap();
        assert!(restored.post_flow.is_staged());
        assert_eq!(
            restored.post_flow.staged().unwrap().title,
            "Title"
        );
    }

    #[test]
    fn test_take_flash_drains() {
        let mut data = SessionData::default();
        data.flash.push("User signup successful.".to_string());

        let flash = data.take_flash();
        assert_eq!(flash, vec!["User signup successful.".to_string()]);
        assert!(data.flash.is_empty());
    }
}
