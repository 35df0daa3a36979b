//! Published content pages and banners.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;

use crate::db::ContentRepository;
use crate::db::content::ContentPage;
use crate::error::{AppError, Result};
use crate::services::markdown;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pages/{slug}", get(show))
        .route("/api/banners", get(banners))
}

/// A page with its markdown rendered.
#[derive(Debug, Serialize)]
pub struct RenderedPage {
    #[serde(flatten)]
    pub page: ContentPage,
    pub html: String,
}

impl From<ContentPage> for RenderedPage {
    fn from(page: ContentPage) -> Self {
        let html = markdown::render(&page.body_markdown);
        Self { page, html }
    }
}

pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<RenderedPage>> {
    let page = ContentRepository::new(state.pool())
        .get_published(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;

    Ok(Json(page.into()))
}

pub async fn banners(State(state): State<AppState>) -> Result<Json<Vec<RenderedPage>>> {
    let banners = ContentRepository::new(state.pool()).banners().await?;
    Ok(Json(banners.into_iter().map(RenderedPage::from).collect()))
}
