//! The signed-in user's own profile.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use tracing::instrument;

use crate::db::ProfileRepository;
use crate::db::profiles::{Profile, ProfileUpdate};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

const MAX_FIELD_LEN: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/profile", get(show).patch(update))
}

fn validate(update: &ProfileUpdate) -> Result<()> {
    let fields = [
        ("display_name", update.display_name.as_deref()),
        ("phone", update.phone.as_deref()),
        ("shipping_address", update.shipping_address.as_deref()),
        ("store_name", update.store_name.as_deref()),
        ("bio", update.bio.as_deref()),
    ];

    for (name, value) in fields {
        if value.is_some_and(|v| v.chars().count() > MAX_FIELD_LEN) {
            return Err(AppError::BadRequest(format!(
                "{name} must be at most {MAX_FIELD_LEN} characters"
            )));
        }
    }
    Ok(())
}

pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Profile>> {
    let profile = ProfileRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("profile".to_owned()))?;

    Ok(Json(profile))
}

#[instrument(skip(state, body), fields(profile_id = %user.id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<Profile>> {
    validate(&body)?;
    let profile = ProfileRepository::new(state.pool())
        .update(user.id, &body)
        .await?;

    Ok(Json(profile))
}
