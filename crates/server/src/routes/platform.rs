//! Public platform status, polled by clients to show lock banners.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use bazaar_core::PlatformFlags;

use crate::error::Result;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/platform/status", get(status))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PlatformStatus {
    pub maintenance_mode: bool,
    pub maintenance_message: Option<String>,
    pub checkout_locked: bool,
    pub registration_locked: bool,
}

impl From<&PlatformFlags> for PlatformStatus {
    fn from(flags: &PlatformFlags) -> Self {
        Self {
            maintenance_mode: flags.maintenance_mode,
            maintenance_message: flags
                .maintenance_mode
                .then(|| flags.maintenance_message().to_owned()),
            checkout_locked: flags.checkout_locked,
            registration_locked: flags.registration_locked,
        }
    }
}

pub async fn status(State(state): State<AppState>) -> Result<Json<PlatformStatus>> {
    let flags = state.platform().flags().await?;
    Ok(Json(PlatformStatus::from(&flags)))
}
