//! Password-reset token store
//!
//! At most one token is live per username. Expiry is enforced by the store
//! itself (Redis key TTL), so callers never compare timestamps.

use super::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::Script;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

const KEY_PREFIX: &str = "reset_token:";

/// Deletes the key only when it still holds the presented token
const CONSUME_SCRIPT: &str = r#"
local stored = redis.call('GET', KEYS[1])
if not stored then
    return 0
end
if cjson.decode(stored)['token'] == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// A live reset token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenRecord {
    /// Lowercased
    pub username: String,
    pub token: String,
    pub expire_at: DateTime<Utc>,
}

/// Normalized store key for a username
pub fn reset_key(username: &str) -> String {
    username.to_lowercase()
}

#[async_trait]
pub trait ResetTokenRepository: Send + Sync {
    /// Drop the live token for `username`, if any
    async fn delete(&self, username: &str) -> Result<(), StoreError>;

    /// Store `token` as the live token for `username`; it expires after the
    /// store's TTL
    async fn insert(&self, username: &str, token: &str) -> Result<ResetTokenRecord, StoreError>;

    /// The live token for `username`, if one has not expired
    async fn find(&self, username: &str) -> Result<Option<ResetTokenRecord>, StoreError>;

    /// Atomically delete the live token for `username` if it equals `token`
    ///
    /// Returns `false` when no token is live or a newer one superseded it.
    async fn consume(&self, username: &str, token: &str) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Redis-backed reset-token store
#[derive(Clone)]
pub struct RedisResetTokenStore {
    conn: ConnectionManager,
    ttl: Duration,
    command_timeout: Duration,
}

impl RedisResetTokenStore {
    pub fn new(conn: ConnectionManager, ttl: Duration, command_timeout: Duration) -> Self {
        Self {
            conn,
            ttl,
            command_timeout,
        }
    }

    fn key(username: &str) -> String {
        format!("{}{}", KEY_PREFIX, reset_key(username))
    }

    /// Run a Redis command under the configured timeout
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl ResetTokenRepository for RedisResetTokenStore {
    async fn delete(&self, username: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = Self::key(username);
        self.bounded(redis::cmd("DEL").arg(&key).query_async::<_, i64>(&mut conn))
            .await?;
        Ok(())
    }

    async fn insert(&self, username: &str, token: &str) -> Result<ResetTokenRecord, StoreError> {
        let ttl_secs = self.ttl.as_secs().max(1);
        let record = ResetTokenRecord {
            username: reset_key(username),
            token: token.to_string(),
            expire_at: Utc::now() + chrono::Duration::seconds(ttl_secs as i64),
        };
        let value = serde_json::to_string(&record)?;

        let mut conn = self.conn.clone();
        let key = Self::key(username);
        self.bounded(
            redis::cmd("SET")
                .arg(&key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs)
                .query_async::<_, ()>(&mut conn),
        )
        .await?;

        Ok(record)
    }

    async fn find(&self, username: &str) -> Result<Option<ResetTokenRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let key = Self::key(username);
        let value: Option<String> = self
            .bounded(redis::cmd("GET").arg(&key).query_async(&mut conn))
            .await?;

        match value {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn consume(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let script = Script::new(CONSUME_SCRIPT);
        let mut invocation = script.key(Self::key(username));
        invocation.arg(token);

        let deleted: i64 = self
            .bounded(invocation.invoke_async(&mut conn))
            .await?;
        Ok(deleted == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(redis::cmd("PING").query_async::<_, String>(&mut conn))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_lowercased() {
        assert_eq!(reset_key("Alice"), "alice");
        assert_eq!(RedisResetTokenStore::key("ALICE"), "reset_token:alice");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = ResetTokenRecord {
            username: "alice".to_string(),
            token: "t".to_string(),
            expire_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("expireAt").is_some());
        assert_eq!(json["token"], "t");
    }

    async fn connect() -> RedisResetTokenStore {
        let url = std::env::var("TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = redis::Client::open(url).unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        RedisResetTokenStore::new(conn, Duration::from_secs(60), Duration::from_secs(2))
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (TEST_REDIS_URL)"]
    async fn test_redis_consume_only_matching_token() {
        let store = connect().await;
        let username = format!("user-{}", uuid::Uuid::new_v4());

        store.delete(&username).await.unwrap();
        store.insert(&username, "old").await.unwrap();
        store.delete(&username).await.unwrap();
        store.insert(&username, "new").await.unwrap();

        assert!(!store.consume(&username, "old").await.unwrap());
        assert_eq!(store.find(&username).await.unwrap().unwrap().token, "new");
        assert!(store.consume(&username, "new").await.unwrap());
        assert!(!store.consume(&username, "new").await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (TEST_REDIS_URL)"]
    async fn test_redis_token_expires() {
        let url = std::env::var("TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let conn = ConnectionManager::new(redis::Client::open(url).unwrap())
            .await
            .unwrap();
        let store =
            RedisResetTokenStore::new(conn, Duration::from_secs(1), Duration::from_secs(2));
        let username = format!("user-{}", uuid::Uuid::new_v4());

        store.insert(&username, "tok").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(store.find(&username).await.unwrap().is_none());
        assert!(!store.consume(&username, "tok").await.unwrap());
    }
}
