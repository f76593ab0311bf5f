//! Application state management
//!
//! This module provides the shared application state that is passed
//! to all request handlers via Axum's state extraction.
//!
//! Everything here is built once at startup and read-only afterwards; the
//! signing secret in particular is only ever seen by the [`TokenService`].

use crate::auth::{PasswordService, TokenService};
use crate::config::AppConfig;
use crate::mailer::{self, Mailer};
use crate::repositories::{
    DashboardRepository, MemoryStore, ResetTokenRepository, SourceRepository, Stores,
    UserRepository,
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;

/// Shared application state
///
/// All fields are `Arc`s or `Copy`, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Token issuer/verifier with pre-computed keys
    pub tokens: TokenService,
    pub passwords: PasswordService,
    pub stores: Stores,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Create the state from configuration and already-connected stores
    pub fn new(config: AppConfig, stores: Stores, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let tokens = TokenService::new(
            &SecretString::new(config.jwt.secret.clone()),
            config.jwt.token_lifetime_secs,
            config.jwt.leeway_secs,
        );
        let passwords = PasswordService::new(config.auth.bcrypt_cost)?;

        Ok(Self {
            config: Arc::new(config),
            tokens,
            passwords,
            stores,
            mailer,
        })
    }

    /// State backed by [`MemoryStore`] and the configured mailer
    pub fn in_memory(config: AppConfig) -> Result<Self> {
        let stores = Stores::memory(MemoryStore::new(config.auth.reset_token_ttl()));
        let mailer = mailer::from_config(&config.mail);
        Self::new(config, stores, mailer)
    }

    /// Replace the mailer
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[inline]
    pub fn passwords(&self) -> PasswordService {
        self.passwords
    }

    #[inline]
    pub fn users(&self) -> &dyn UserRepository {
        self.stores.users.as_ref()
    }

    #[inline]
    pub fn reset_tokens(&self) -> &dyn ResetTokenRepository {
        self.stores.reset_tokens.as_ref()
    }

    #[inline]
    pub fn dashboards(&self) -> &dyn DashboardRepository {
        self.stores.dashboards.as_ref()
    }

    #[inline]
    pub fn sources(&self) -> &dyn SourceRepository {
        self.stores.sources.as_ref()
    }

    #[inline]
    pub fn mailer(&self) -> Arc<dyn Mailer> {
        self.mailer.clone()
    }
}
