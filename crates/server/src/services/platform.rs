//! Platform flags with a short-lived cache.
//!
//! The gate consults the flags on every request, so they are cached for
//! [`FLAGS_TTL`]. Updates through this service invalidate the cache at once;
//! changes made elsewhere (the CLI) are picked up when the entry expires.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, info};

use bazaar_core::{PlatformFlags, SessionEndReason, UserId};

use crate::db::SessionRepository;
use crate::db::settings::{self, SettingsError};

pub const FLAGS_TTL: Duration = Duration::from_secs(10);

/// Cached access to the `platform` setting.
#[derive(Clone)]
pub struct PlatformService {
    inner: Arc<PlatformServiceInner>,
}

struct PlatformServiceInner {
    pool: PgPool,
    cache: Cache<(), PlatformFlags>,
}

impl PlatformService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(FLAGS_TTL)
            .build();

        Self {
            inner: Arc::new(PlatformServiceInner { pool, cache }),
        }
    }

    /// Current flags, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the flags cannot be loaded.
    pub async fn flags(&self) -> Result<PlatformFlags, SettingsError> {
        if let Some(flags) = self.inner.cache.get(&()).await {
            return Ok(flags);
        }

        debug!("Platform flags cache miss");
        let flags = settings::get_platform_flags(&self.inner.pool).await?;
        self.inner.cache.insert((), flags.clone()).await;
        Ok(flags)
    }

    /// Store new flags and return them with `updated_at` set.
    ///
    /// Switching maintenance mode on ends every non-admin session.
    ///
    /// # Errors
    ///
    /// Returns an error if the flags cannot be stored.
    pub async fn update(
        &self,
        mut flags: PlatformFlags,
        updated_by: Option<UserId>,
    ) -> Result<PlatformFlags, SettingsError> {
        let previous = self.flags().await?;
        flags.updated_at = Some(Utc::now());
        settings::set_platform_flags(&self.inner.pool, &flags, updated_by).await?;
        self.invalidate().await;

        if flags.maintenance_mode && !previous.maintenance_mode {
            let ended = SessionRepository::new(&self.inner.pool)
                .end_all_except_admins(SessionEndReason::Maintenance)
                .await?;
            info!(ended, "Maintenance mode enabled, ended non-admin sessions");
        }

        Ok(flags)
    }

    pub async fn invalidate(&self) {
        self.inner.cache.invalidate(&()).await;
    }
}
