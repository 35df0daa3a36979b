//! Cookie session configuration.
//!
//! Sessions are stored in `PostgreSQL` by tower-sessions. The cookie lives at
//! most as long as a tracked login may; idle expiry is enforced separately by
//! [`super::session_activity`].

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::BazaarConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "bazaar_session";

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by `bz-cli migrate`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &BazaarConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());
    let expiry_seconds = config.session_policy.max_age.num_seconds();

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(expiry_seconds),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
