//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use bazaar_core::InactivityPolicy;

use crate::config::BazaarConfig;
use crate::services::identity::{IdentityClient, IdentityError};
use crate::services::platform::PlatformService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BazaarConfig,
    pool: PgPool,
    identity: IdentityClient,
    platform: PlatformService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider HTTP client cannot be built.
    pub fn new(config: BazaarConfig, pool: PgPool) -> Result<Self, IdentityError> {
        let identity = IdentityClient::new(&config.claims)?;
        let platform = PlatformService::new(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                identity,
                platform,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &BazaarConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Identity provider admin API client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// Cached platform lock flags.
    #[must_use]
    pub fn platform(&self) -> &PlatformService {
        &self.inner.platform
    }

    #[must_use]
    pub fn session_policy(&self) -> &InactivityPolicy {
        &self.inner.config.session_policy
    }
}
