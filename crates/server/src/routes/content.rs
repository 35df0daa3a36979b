//! Content manager dashboard: pages and banners.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use serde_json::json;
use tracing::{info, instrument};

use bazaar_core::ContentPageId;

use crate::db::content::{ContentPage, ContentPageInput, ContentPagePatch, is_valid_slug};
use crate::db::{ActivityRepository, ContentRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireContentManager;
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_BODY_LEN: usize = 100_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/content/pages", get(index).post(create))
        .route("/api/content/pages/{id}", patch(update).delete(destroy))
}

fn check_fields(slug: Option<&str>, title: Option<&str>, body: Option<&str>) -> Result<()> {
    if slug.is_some_and(|s| !is_valid_slug(s)) {
        return Err(AppError::BadRequest(
            "slug may only contain lowercase letters, digits and single hyphens".to_owned(),
        ));
    }
    if title.is_some_and(|t| t.trim().is_empty() || t.chars().count() > MAX_TITLE_LEN) {
        return Err(AppError::BadRequest(format!(
            "title must be 1 to {MAX_TITLE_LEN} characters"
        )));
    }
    if body.is_some_and(|b| b.len() > MAX_BODY_LEN) {
        return Err(AppError::BadRequest("page body is too long".to_owned()));
    }
    Ok(())
}

pub async fn index(
    RequireContentManager(_user): RequireContentManager,
    State(state): State<AppState>,
) -> Result<Json<Vec<ContentPage>>> {
    Ok(Json(ContentRepository::new(state.pool()).list().await?))
}

#[instrument(skip(state, body), fields(author_id = %user.id, slug = %body.slug))]
pub async fn create(
    RequireContentManager(user): RequireContentManager,
    State(state): State<AppState>,
    Json(body): Json<ContentPageInput>,
) -> Result<(StatusCode, Json<ContentPage>)> {
    check_fields(Some(&body.slug), Some(&body.title), Some(&body.body_markdown))?;
    let page = ContentRepository::new(state.pool())
        .create(&body, user.id)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(user.id),
            "create",
            "content_page",
            Some(page.id.to_string()),
            json!({ "slug": page.slug }),
        )
        .await;
    info!(page_id = %page.id, "Content page created");

    Ok((StatusCode::CREATED, Json(page)))
}

#[instrument(skip(state, body), fields(author_id = %user.id))]
pub async fn update(
    RequireContentManager(user): RequireContentManager,
    State(state): State<AppState>,
    Path(id): Path<ContentPageId>,
    Json(body): Json<ContentPagePatch>,
) -> Result<Json<ContentPage>> {
    check_fields(
        body.slug.as_deref(),
        body.title.as_deref(),
        body.body_markdown.as_deref(),
    )?;
    let page = ContentRepository::new(state.pool())
        .update(id, &body, user.id)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(user.id),
            "update",
            "content_page",
            Some(id.to_string()),
            json!({ "published": page.published }),
        )
        .await;

    Ok(Json(page))
}

#[instrument(skip(state), fields(author_id = %user.id))]
pub async fn destroy(
    RequireContentManager(user): RequireContentManager,
    State(state): State<AppState>,
    Path(id): Path<ContentPageId>,
) -> Result<StatusCode> {
    ContentRepository::new(state.pool()).delete(id).await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(Some(user.id), "delete", "content_page", Some(id.to_string()), json!({}))
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_checks() {
        assert!(check_fields(Some("about-us"), Some("About us"), Some("# Hi")).is_ok());
        assert!(check_fields(Some("About Us"), None, None).is_err());
        assert!(check_fields(None, Some(" "), None).is_err());
        assert!(check_fields(None, None, None).is_ok());
    }
}
