//! Authentication and role extractors.
//!
//! [`super::session_activity`] validates the tracked session and places the
//! [`CurrentUser`] in request extensions; these extractors read it from there
//! and run the access gate for the area the handler belongs to.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use bazaar_core::{Area, Denial, gate};

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Run the gate for `area` and return the signed-in user.
async fn authorize(
    parts: &Parts,
    state: &AppState,
    area: Area,
) -> Result<CurrentUser, AppError> {
    let user = parts.extensions.get::<CurrentUser>().cloned();
    let flags = state.platform().flags().await?;

    gate(user.as_ref().map(|u| u.role), area, &flags)?;
    user.ok_or(AppError::Denied(Denial::Unauthenticated))
}

macro_rules! area_extractor {
    ($(#[$meta:meta])* $name:ident => $area:expr) => {
        $(#[$meta])*
        pub struct $name(pub CurrentUser);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                authorize(parts, state, $area).await.map(Self)
            }
        }
    };
}

area_extractor!(
    /// Any signed-in user.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// async fn handler(RequireAuth(user): RequireAuth) -> String {
    ///     format!("Hello, {}!", user.display_name)
    /// }
    /// ```
    RequireAuth => Area::Account
);
area_extractor!(
    /// A seller (or admin).
    RequireSeller => Area::SellerDashboard
);
area_extractor!(
    /// An editor (or admin).
    RequireEditor => Area::EditorDashboard
);
area_extractor!(
    /// A content manager (or admin).
    RequireContentManager => Area::ContentDashboard
);
area_extractor!(RequireAdmin => Area::AdminDashboard);

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject anonymous requests.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

/// Store the current user in the session (login).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the current user from the session (logout or ended session).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}
