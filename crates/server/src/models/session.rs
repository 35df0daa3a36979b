//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::{Email, Role, UserId};

use crate::db::profiles::Profile;

/// Session-stored user identity.
///
/// The role is refreshed from the database on every request, so a role change
/// takes effect without logging out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub display_name: String,
    pub role: Role,
    /// The tracked `user_session` row this login belongs to.
    pub session_id: Uuid,
}

impl CurrentUser {
    #[must_use]
    pub fn from_profile(profile: &Profile, session_id: Uuid) -> Self {
        Self {
            id: profile.id,
            email: profile.email.clone(),
            display_name: profile.name().to_owned(),
            role: profile.role,
            session_id,
        }
    }
}

/// Session keys.
pub mod keys {
    /// The logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// The shopping cart.
    pub const CART: &str = "cart";
}
