//! Database repositories
//!
//! Provides the data access layer. Each entity has a repository trait with a
//! PostgreSQL implementation on [`PgStore`]; reset tokens live in Redis.
//! [`MemoryStore`] implements every trait in-process for local runs and tests.

pub mod dashboard;
pub mod memory;
pub mod reset_token;
pub mod source;
pub mod user;

use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

pub use dashboard::{DashboardLayout, DashboardRecord, DashboardRepository, NewDashboard};
pub use memory::MemoryStore;
pub use reset_token::{reset_key, RedisResetTokenStore, ResetTokenRecord, ResetTokenRepository};
pub use source::{NewSource, SourceFields, SourceRecord, SourceRepository};
pub use user::{NewUser, UserRecord, UserRepository};

/// Persistence failure
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique index rejected the write; carries the constraint name
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store operation timed out")]
    Timeout,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.constraint().unwrap_or("unique").to_string())
            }
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            other => StoreError::Database(other),
        }
    }
}

/// PostgreSQL-backed store for users, dashboards and sources
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// The repositories a running application uses
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository>,
    pub reset_tokens: Arc<dyn ResetTokenRepository>,
    pub dashboards: Arc<dyn DashboardRepository>,
    pub sources: Arc<dyn SourceRepository>,
}

impl Stores {
    /// Postgres for accounts and resources, Redis for reset tokens
    pub fn persistent(pg: PgStore, reset_tokens: RedisResetTokenStore) -> Self {
        let pg = Arc::new(pg);
        Self {
            users: pg.clone(),
            reset_tokens: Arc::new(reset_tokens),
            dashboards: pg.clone(),
            sources: pg,
        }
    }

    /// Everything in process memory
    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            reset_tokens: store.clone(),
            dashboards: store.clone(),
            sources: store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_timeout() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Timeout));
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
