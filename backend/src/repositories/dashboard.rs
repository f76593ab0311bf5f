//! Dashboard repository
//!
//! Every `*_owned` operation filters on `(id, owner)` in the same statement,
//! so another owner's dashboard and a missing one look the same.

use super::{PgStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashboard_shared::{DashboardDetail, DashboardSummary, SharedDashboard};
use serde_json::Value;
use uuid::Uuid;

/// Dashboard record from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DashboardRecord {
    pub id: Uuid,
    pub name: String,
    pub layout: Value,
    pub items: Value,
    pub next_id: i32,
    pub password_hash: Option<String>,
    pub shared: bool,
    pub views: i32,
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
}

impl DashboardRecord {
    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary {
            id: self.id,
            name: self.name.clone(),
            views: self.views,
        }
    }

    pub fn detail(&self) -> DashboardDetail {
        DashboardDetail {
            id: self.id,
            name: self.name.clone(),
            layout: self.layout.clone(),
            items: self.items.clone(),
            next_id: self.next_id,
        }
    }

    /// What a visitor of a shared dashboard sees
    pub fn shared_view(&self) -> SharedDashboard {
        SharedDashboard {
            name: self.name.clone(),
            layout: self.layout.clone(),
            items: self.items.clone(),
        }
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Input for creating a dashboard
#[derive(Debug, Clone)]
pub struct NewDashboard {
    pub name: String,
    pub layout: Value,
    pub items: Value,
    pub next_id: i32,
    pub owner: Uuid,
}

impl NewDashboard {
    /// An empty dashboard
    pub fn empty(name: impl Into<String>, owner: Uuid) -> Self {
        Self {
            name: name.into(),
            layout: Value::Array(Vec::new()),
            items: Value::Object(Default::default()),
            next_id: 1,
            owner,
        }
    }
}

/// Editable content of a dashboard
#[derive(Debug, Clone)]
pub struct DashboardLayout {
    pub layout: Value,
    pub items: Value,
    pub next_id: i32,
}

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    async fn list_owned(&self, owner: Uuid) -> Result<Vec<DashboardRecord>, StoreError>;

    async fn find_owned(&self, owner: Uuid, id: Uuid)
        -> Result<Option<DashboardRecord>, StoreError>;

    async fn name_taken(&self, owner: Uuid, name: &str) -> Result<bool, StoreError>;

    /// A duplicate `(owner, name)` is [`StoreError::UniqueViolation`]
    async fn create(&self, dashboard: NewDashboard) -> Result<DashboardRecord, StoreError>;

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError>;

    async fn save_layout_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        layout: &DashboardLayout,
    ) -> Result<bool, StoreError>;

    /// Flip the shared flag; `None` when no owned dashboard matched
    async fn toggle_shared_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<bool>, StoreError>;

    /// Set or clear (`None`) the viewing password digest
    async fn set_password_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        password_hash: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Unscoped lookup, for the public share flows
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DashboardRecord>, StoreError>;

    async fn record_view(&self, id: Uuid) -> Result<(), StoreError>;
}

const DASHBOARD_COLUMNS: &str =
    "id, name, layout, items, next_id, password_hash, shared, views, owner, created_at";

#[async_trait]
impl DashboardRepository for PgStore {
    async fn list_owned(&self, owner: Uuid) -> Result<Vec<DashboardRecord>, StoreError> {
        let dashboards = sqlx::query_as::<_, DashboardRecord>(&format!(
            "SELECT {} FROM dashboards WHERE owner = $1 ORDER BY created_at",
            DASHBOARD_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;

        Ok(dashboards)
    }

    async fn find_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<DashboardRecord>, StoreError> {
        let dashboard = sqlx::query_as::<_, DashboardRecord>(&format!(
            "SELECT {} FROM dashboards WHERE id = $1 AND owner = $2",
            DASHBOARD_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool())
        .await?;

        Ok(dashboard)
    }

    async fn name_taken(&self, owner: Uuid, name: &str) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM dashboards WHERE owner = $1 AND name = $2)",
        )
        .bind(owner)
        .bind(name)
        .fetch_one(self.pool())
        .await?;

        Ok(taken)
    }

    async fn create(&self, dashboard: NewDashboard) -> Result<DashboardRecord, StoreError> {
        let record = sqlx::query_as::<_, DashboardRecord>(&format!(
            r#"
            INSERT INTO dashboards (name, layout, items, next_id, owner)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            DASHBOARD_COLUMNS
        ))
        .bind(&dashboard.name)
        .bind(&dashboard.layout)
        .bind(&dashboard.items)
        .bind(dashboard.next_id)
        .bind(dashboard.owner)
        .fetch_one(self.pool())
        .await?;

        Ok(record)
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM dashboards WHERE id = $1 AND owner = $2")
            .bind(id)
            .bind(owner)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_layout_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        layout: &DashboardLayout,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE dashboards
            SET layout = $3, items = $4, next_id = $5
            WHERE id = $1 AND owner = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(&layout.layout)
        .bind(&layout.items)
        .bind(layout.next_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_shared_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<bool>, StoreError> {
        let shared: Option<bool> = sqlx::query_scalar(
            r#"
            UPDATE dashboards
            SET shared = NOT shared
            WHERE id = $1 AND owner = $2
            RETURNING shared
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool())
        .await?;

        Ok(shared)
    }

    async fn set_password_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        password_hash: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE dashboards SET password_hash = $3 WHERE id = $1 AND owner = $2",
        )
        .bind(id)
        .bind(owner)
        .bind(password_hash)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DashboardRecord>, StoreError> {
        let dashboard = sqlx::query_as::<_, DashboardRecord>(&format!(
            "SELECT {} FROM dashboards WHERE id = $1",
            DASHBOARD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(dashboard)
    }

    async fn record_view(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE dashboards SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
