//! Source repository (message-broker connection profiles)

use super::{PgStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashboard_shared::SourceView;
use uuid::Uuid;

/// Broker type given to sources created implicitly by `check-sources`
pub const DEFAULT_SOURCE_TYPE: &str = "stomp";

/// Source record from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRecord {
    pub id: Uuid,
    pub name: String,
    pub source_type: String,
    pub url: String,
    pub login: String,
    pub passcode: String,
    pub vhost: String,
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
}

impl SourceRecord {
    pub fn view(&self) -> SourceView {
        SourceView {
            id: self.id,
            name: self.name.clone(),
            source_type: self.source_type.clone(),
            url: self.url.clone(),
            login: self.login.clone(),
            passcode: self.passcode.clone(),
            vhost: self.vhost.clone(),
            active: false,
        }
    }
}

/// Editable fields of a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFields {
    pub name: String,
    pub source_type: String,
    pub url: String,
    pub login: String,
    pub passcode: String,
    pub vhost: String,
}

impl SourceFields {
    /// Placeholder profile for a name referenced by a dashboard
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            ..Default::default()
        }
    }
}

/// Input for creating a source
#[derive(Debug, Clone)]
pub struct NewSource {
    pub owner: Uuid,
    pub fields: SourceFields,
}

#[async_trait]
pub trait SourceRepository: Send + Sync {
    async fn list_owned(&self, owner: Uuid) -> Result<Vec<SourceRecord>, StoreError>;

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<SourceRecord>, StoreError>;

    /// Whether `owner` has a source called `name`, ignoring `excluding`
    async fn name_taken(
        &self,
        owner: Uuid,
        name: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, StoreError>;

    /// A duplicate `(owner, name)` is [`StoreError::UniqueViolation`]
    async fn create(&self, source: NewSource) -> Result<SourceRecord, StoreError>;

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: &SourceFields,
    ) -> Result<bool, StoreError>;

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

const SOURCE_COLUMNS: &str =
    "id, name, source_type, url, login, passcode, vhost, owner, created_at";

#[async_trait]
impl SourceRepository for PgStore {
    async fn list_owned(&self, owner: Uuid) -> Result<Vec<SourceRecord>, StoreError> {
        let sources = sqlx::query_as::<_, SourceRecord>(&format!(
            "SELECT {} FROM sources WHERE owner = $1 ORDER BY created_at",
            SOURCE_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;

        Ok(sources)
    }

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<SourceRecord>, StoreError> {
        let source = sqlx::query_as::<_, SourceRecord>(&format!(
            "SELECT {} FROM sources WHERE id = $1 AND owner = $2",
            SOURCE_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool())
        .await?;

        Ok(source)
    }

    async fn name_taken(
        &self,
        owner: Uuid,
        name: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sources
                WHERE owner = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(owner)
        .bind(name)
        .bind(excluding)
        .fetch_one(self.pool())
        .await?;

        Ok(taken)
    }

    async fn create(&self, source: NewSource) -> Result<SourceRecord, StoreError> {
        let fields = &source.fields;
        let record = sqlx::query_as::<_, SourceRecord>(&format!(
            r#"
            INSERT INTO sources (name, source_type, url, login, passcode, vhost, owner)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SOURCE_COLUMNS
        ))
        .bind(&fields.name)
        .bind(&fields.source_type)
        .bind(&fields.url)
        .bind(&fields.login)
        .bind(&fields.passcode)
        .bind(&fields.vhost)
        .bind(source.owner)
        .fetch_one(self.pool())
        .await?;

        Ok(record)
    }

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: &SourceFields,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET name = $3, source_type = $4, url = $5, login = $6, passcode = $7, vhost = $8
            WHERE id = $1 AND owner = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(&fields.name)
        .bind(&fields.source_type)
        .bind(&fields.url)
        .bind(&fields.login)
        .bind(&fields.passcode)
        .bind(&fields.vhost)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sources WHERE id = $1 AND owner = $2")
            .bind(id)
            .bind(owner)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
