//! In-process store implementing every repository trait
//!
//! Used when the database URL starts with `memory:` and throughout the test
//! suite. Unique indexes are emulated under the write lock, and reset tokens
//! stop being visible once their expiry has passed.

use super::{
    reset_key, DashboardLayout, DashboardRecord, DashboardRepository, NewDashboard, NewSource,
    NewUser, ResetTokenRecord, ResetTokenRepository, SourceFields, SourceRecord, SourceRepository,
    StoreError, UserRecord, UserRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    reset_tokens: HashMap<String, ResetTokenRecord>,
    dashboards: HashMap<Uuid, DashboardRecord>,
    sources: HashMap<Uuid, SourceRecord>,
}

/// Memory-backed store
pub struct MemoryStore {
    tables: RwLock<Tables>,
    reset_ttl: Duration,
}

impl MemoryStore {
    pub fn new(reset_ttl: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            reset_ttl,
        }
    }
}

fn sorted_by_creation<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    rows
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation("users_username_key".to_string()));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            registration_date: Utc::now(),
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl ResetTokenRepository for MemoryStore {
    async fn delete(&self, username: &str) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .reset_tokens
            .remove(&reset_key(username));
        Ok(())
    }

    async fn insert(&self, username: &str, token: &str) -> Result<ResetTokenRecord, StoreError> {
        let ttl = chrono::Duration::seconds(self.reset_ttl.as_secs() as i64);
        let record = ResetTokenRecord {
            username: reset_key(username),
            token: token.to_string(),
            expire_at: Utc::now() + ttl,
        };

        self.tables
            .write()
            .await
            .reset_tokens
            .insert(record.username.clone(), record.clone());
        Ok(record)
    }

    async fn find(&self, username: &str) -> Result<Option<ResetTokenRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reset_tokens
            .get(&reset_key(username))
            .filter(|record| record.expire_at > Utc::now())
            .cloned())
    }

    async fn consume(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let key = reset_key(username);

        let (expired, matches) = match tables.reset_tokens.get(&key) {
            Some(record) => (record.expire_at <= Utc::now(), record.token == token),
            None => return Ok(false),
        };

        if expired || matches {
            tables.reset_tokens.remove(&key);
        }
        Ok(matches && !expired)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl DashboardRepository for MemoryStore {
    async fn list_owned(&self, owner: Uuid) -> Result<Vec<DashboardRecord>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .dashboards
            .values()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect();
        Ok(sorted_by_creation(rows, |d: &DashboardRecord| d.created_at))
    }

    async fn find_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<DashboardRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .dashboards
            .get(&id)
            .filter(|d| d.owner == owner)
            .cloned())
    }

    async fn name_taken(&self, owner: Uuid, name: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .dashboards
            .values()
            .any(|d| d.owner == owner && d.name == name))
    }

    async fn create(&self, dashboard: NewDashboard) -> Result<DashboardRecord, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .dashboards
            .values()
            .any(|d| d.owner == dashboard.owner && d.name == dashboard.name)
        {
            return Err(StoreError::UniqueViolation(
                "dashboards_owner_name_key".to_string(),
            ));
        }

        let record = DashboardRecord {
            id: Uuid::new_v4(),
            name: dashboard.name,
            layout: dashboard.layout,
            items: dashboard.items,
            next_id: dashboard.next_id,
            password_hash: None,
            shared: false,
            views: 0,
            owner: dashboard.owner,
            created_at: Utc::now(),
        };
        tables.dashboards.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.dashboards.get(&id).is_some_and(|d| d.owner == owner) {
            tables.dashboards.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn save_layout_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        layout: &DashboardLayout,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.dashboards.get_mut(&id).filter(|d| d.owner == owner) {
            Some(dashboard) => {
                dashboard.layout = layout.layout.clone();
                dashboard.items = layout.items.clone();
                dashboard.next_id = layout.next_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn toggle_shared_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<bool>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .dashboards
            .get_mut(&id)
            .filter(|d| d.owner == owner)
            .map(|dashboard| {
                dashboard.shared = !dashboard.shared;
                dashboard.shared
            }))
    }

    async fn set_password_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        password_hash: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.dashboards.get_mut(&id).filter(|d| d.owner == owner) {
            Some(dashboard) => {
                dashboard.password_hash = password_hash.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DashboardRecord>, StoreError> {
        Ok(self.tables.read().await.dashboards.get(&id).cloned())
    }

    async fn record_view(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(dashboard) = self.tables.write().await.dashboards.get_mut(&id) {
            dashboard.views += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SourceRepository for MemoryStore {
    async fn list_owned(&self, owner: Uuid) -> Result<Vec<SourceRecord>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .sources
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect();
        Ok(sorted_by_creation(rows, |s: &SourceRecord| s.created_at))
    }

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<SourceRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sources
            .get(&id)
            .filter(|s| s.owner == owner)
            .cloned())
    }

    async fn name_taken(
        &self,
        owner: Uuid,
        name: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sources
            .values()
            .any(|s| s.owner == owner && s.name == name && Some(s.id) != excluding))
    }

    async fn create(&self, source: NewSource) -> Result<SourceRecord, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .sources
            .values()
            .any(|s| s.owner == source.owner && s.name == source.fields.name)
        {
            return Err(StoreError::UniqueViolation(
                "sources_owner_name_key".to_string(),
            ));
        }

        let SourceFields {
            name,
            source_type,
            url,
            login,
            passcode,
            vhost,
        } = source.fields;
        let record = SourceRecord {
            id: Uuid::new_v4(),
            name,
            source_type,
            url,
            login,
            passcode,
            vhost,
            owner: source.owner,
            created_at: Utc::now(),
        };
        tables.sources.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: &SourceFields,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .sources
            .values()
            .any(|s| s.owner == owner && s.name == fields.name && s.id != id)
        {
            return Err(StoreError::UniqueViolation(
                "sources_owner_name_key".to_string(),
            ));
        }

        match tables.sources.get_mut(&id).filter(|s| s.owner == owner) {
            Some(source) => {
                source.name = fields.name.clone();
                source.source_type = fields.source_type.clone();
                source.url = fields.url.clone();
                source.login = fields.login.clone();
                source.passcode = fields.passcode.clone();
                source.vhost = fields.vhost.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.sources.get(&id).is_some_and(|s| s.owner == owner) {
            tables.sources.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(Duration::from_secs(3600))
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$digest".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = store();
        UserRepository::create(&store, new_user("alice", "a@x.com"))
            .await
            .unwrap();

        let same_email = UserRepository::create(&store, new_user("bob", "a@x.com")).await;
        assert!(matches!(same_email, Err(StoreError::UniqueViolation(_))));

        let same_name = UserRepository::create(&store, new_user("alice", "b@x.com")).await;
        assert!(matches!(same_name, Err(StoreError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn test_find_by_username_or_email() {
        let store = store();
        UserRepository::create(&store, new_user("alice", "a@x.com"))
            .await
            .unwrap();

        assert!(store
            .find_by_username_or_email("nobody", "a@x.com")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_username_or_email("alice", "z@x.com")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_username_or_email("bob", "b@x.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_username_lookup_is_case_sensitive() {
        let store = store();
        UserRepository::create(&store, new_user("alice", "a@x.com"))
            .await
            .unwrap();
        assert!(store.find_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_token_superseded() {
        let store = store();
        store.insert("Alice", "first").await.unwrap();
        ResetTokenRepository::delete(&store, "alice").await.unwrap();
        store.insert("alice", "second").await.unwrap();

        assert!(!store.consume("alice", "first").await.unwrap());
        assert_eq!(store.find("ALICE").await.unwrap().unwrap().token, "second");
        assert!(store.consume("alice", "second").await.unwrap());
        assert!(store.find("alice").await.unwrap().is_none());
        assert!(!store.consume("alice", "second").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_token_expires_in_store() {
        let store = MemoryStore::new(Duration::ZERO);
        store.insert("alice", "tok").await.unwrap();

        assert!(store.find("alice").await.unwrap().is_none());
        assert!(!store.consume("alice", "tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_dashboard_ownership_filter() {
        let store = store();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let dashboard = DashboardRepository::create(&store, NewDashboard::empty("Ops", owner))
            .await
            .unwrap();

        assert!(DashboardRepository::find_owned(&store, stranger, dashboard.id)
            .await
            .unwrap()
            .is_none());
        assert!(store.toggle_shared_owned(stranger, dashboard.id).await.unwrap().is_none());
        assert!(!DashboardRepository::delete_owned(&store, stranger, dashboard.id)
            .await
            .unwrap());

        assert_eq!(
            store.toggle_shared_owned(owner, dashboard.id).await.unwrap(),
            Some(true)
        );
        assert!(DashboardRepository::delete_owned(&store, owner, dashboard.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_dashboard_name_unique_per_owner() {
        let store = store();
        let owner = Uuid::new_v4();
        DashboardRepository::create(&store, NewDashboard::empty("Ops", owner))
            .await
            .unwrap();

        let duplicate = DashboardRepository::create(&store, NewDashboard::empty("Ops", owner)).await;
        assert!(matches!(duplicate, Err(StoreError::UniqueViolation(_))));

        // Another owner may reuse the name
        DashboardRepository::create(&store, NewDashboard::empty("Ops", Uuid::new_v4()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_record_view_increments() {
        let store = store();
        let owner = Uuid::new_v4();
        let dashboard = DashboardRepository::create(&store, NewDashboard::empty("Ops", owner))
            .await
            .unwrap();

        store.record_view(dashboard.id).await.unwrap();
        store.record_view(dashboard.id).await.unwrap();
        let found = store.find_by_id(dashboard.id).await.unwrap().unwrap();
        assert_eq!(found.views, 2);
    }

    #[tokio::test]
    async fn test_source_name_taken_excluding_self() {
        let store = store();
        let owner = Uuid::new_v4();
        let source = SourceRepository::create(
            &store,
            NewSource {
                owner,
                fields: SourceFields::placeholder("broker"),
            },
        )
        .await
        .unwrap();

        assert!(SourceRepository::name_taken(&store, owner, "broker", None)
            .await
            .unwrap());
        assert!(!SourceRepository::name_taken(&store, owner, "broker", Some(source.id))
            .await
            .unwrap());
    }
}
