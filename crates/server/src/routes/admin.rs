//! Admin dashboard: users, platform locks, sessions, audit trails, orders and
//! claims.
//!
//! Every state-changing action is written to the activity log.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use bazaar_core::{
    ClaimId, ClaimStatus, OrderId, OrderItemId, OrderStatus, PlatformFlags, ProductStatus, Role,
    SessionEndReason, UserId,
};

use crate::db::activity::ActivityEntry;
use crate::db::claims::Claim;
use crate::db::orders::{Fulfiller, Order, OrderDetail, OrderTotals};
use crate::db::profiles::{Profile, ProfileFilter};
use crate::db::sessions::{ActiveSession, SessionLogEntry};
use crate::db::{
    ActivityRepository, ClaimRepository, OrderRepository, ProductRepository, ProfileRepository,
    SessionRepository,
};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::CurrentUser;
use crate::services::identity::claims_for_role;
use crate::state::AppState;

use super::seller::ItemStatusRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/dashboard", get(dashboard))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{id}/role", post(set_role))
        .route("/api/admin/users/{id}/disable", post(disable_user))
        .route("/api/admin/users/{id}/enable", post(enable_user))
        .route(
            "/api/admin/users/{id}/terminate-sessions",
            post(terminate_user_sessions),
        )
        .route("/api/admin/platform", get(get_platform).put(put_platform))
        .route("/api/admin/sessions", get(list_sessions))
        .route("/api/admin/sessions/{id}/terminate", post(terminate_session))
        .route("/api/admin/session-logs", get(session_logs))
        .route("/api/admin/activity", get(activity))
        .route("/api/admin/orders", get(list_orders))
        .route("/api/admin/orders/{id}", get(show_order))
        .route(
            "/api/admin/orders/{order}/items/{item}/status",
            post(update_item_status),
        )
        .route("/api/admin/claims", get(list_claims))
        .route("/api/admin/claims/{id}/status", post(set_claim_status))
}

/// Admins may not lock themselves out.
fn not_self(admin: &CurrentUser, target: UserId, action: &str) -> Result<()> {
    if admin.id == target {
        return Err(AppError::Conflict(format!("you cannot {action} your own account")));
    }
    Ok(())
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub users_by_role: HashMap<Role, i64>,
    pub products_by_status: HashMap<ProductStatus, i64>,
    pub orders: OrderTotals,
    pub active_sessions: i64,
    pub unresolved_claims: i64,
    pub platform: PlatformFlags,
}

pub async fn dashboard(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboard>> {
    let pool = state.pool();
    let profiles = ProfileRepository::new(pool);
    let products = ProductRepository::new(pool);
    let order_repo = OrderRepository::new(pool);
    let sessions = SessionRepository::new(pool);
    let claims = ClaimRepository::new(pool);
    let (users_by_role, products_by_status, orders, active_sessions, unresolved_claims) = tokio::try_join!(
        profiles.count_by_role(),
        products.count_by_status(None),
        order_repo.totals(),
        sessions.count_active(),
        claims.count_unresolved(),
    )?;
    let platform = state.platform().flags().await?;

    Ok(Json(AdminDashboard {
        users_by_role: users_by_role.into_iter().collect(),
        products_by_status: products_by_status.into_iter().collect(),
        orders,
        active_sessions,
        unresolved_claims,
        platform,
    }))
}

// =============================================================================
// Users
// =============================================================================

pub async fn list_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(filter): Query<ProfileFilter>,
) -> Result<Json<Vec<Profile>>> {
    Ok(Json(ProfileRepository::new(state.pool()).list(&filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// Change a user's role. Takes effect on the user's next request. Linked
/// identity provider accounts get matching custom claims when the provider is
/// configured.
#[instrument(skip(state), fields(admin_id = %admin.id, role = %body.role))]
pub async fn set_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<Profile>> {
    if body.role != Role::Admin {
        not_self(&admin, id, "demote")?;
    }
    let profiles = ProfileRepository::new(state.pool());
    let previous = profiles
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
    let profile = profiles.set_role(id, body.role).await?;

    if let Some(uid) = profile.identity_uid.as_deref()
        && state.config().claims.provider_configured()
        && let Err(e) = state
            .identity()
            .set_custom_claims(uid, &claims_for_role(body.role))
            .await
    {
        warn!(error = %e, profile_id = %id, "Failed to mirror role into identity claims");
    }

    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(admin.id),
            "set_role",
            "profile",
            Some(id.to_string()),
            json!({ "from": previous.role, "to": body.role }),
        )
        .await;
    info!(profile_id = %id, from = %previous.role, "Role changed");

    Ok(Json(profile))
}

#[derive(Debug, Serialize)]
pub struct DisableResponse {
    pub sessions_ended: u64,
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn disable_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<DisableResponse>> {
    not_self(&admin, id, "disable")?;
    ProfileRepository::new(state.pool())
        .set_disabled(id, true)
        .await?;
    let sessions_ended = SessionRepository::new(state.pool())
        .end_for_profile(id, SessionEndReason::Forced)
        .await?;

    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(admin.id),
            "disable",
            "profile",
            Some(id.to_string()),
            json!({ "sessions_ended": sessions_ended }),
        )
        .await;
    info!(profile_id = %id, sessions_ended, "User disabled");

    Ok(Json(DisableResponse { sessions_ended }))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn enable_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    ProfileRepository::new(state.pool())
        .set_disabled(id, false)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(Some(admin.id), "enable", "profile", Some(id.to_string()), json!({}))
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn terminate_user_sessions(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<DisableResponse>> {
    let sessions_ended = SessionRepository::new(state.pool())
        .end_for_profile(id, SessionEndReason::Forced)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(admin.id),
            "terminate_sessions",
            "profile",
            Some(id.to_string()),
            json!({ "sessions_ended": sessions_ended }),
        )
        .await;

    Ok(Json(DisableResponse { sessions_ended }))
}

// =============================================================================
// Platform
// =============================================================================

pub async fn get_platform(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<PlatformFlags>> {
    Ok(Json(state.platform().flags().await?))
}

/// Replace the platform flags. Omitted fields are unlocked.
#[instrument(skip(state, flags), fields(admin_id = %admin.id))]
pub async fn put_platform(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(flags): Json<PlatformFlags>,
) -> Result<Json<PlatformFlags>> {
    if flags
        .maintenance_message
        .as_deref()
        .is_some_and(|m| m.chars().count() > 500)
    {
        return Err(AppError::BadRequest(
            "maintenance message must be at most 500 characters".to_owned(),
        ));
    }

    let flags = state.platform().update(flags, Some(admin.id)).await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(admin.id),
            "update",
            "platform",
            None,
            serde_json::to_value(&flags).unwrap_or_default(),
        )
        .await;
    info!(
        maintenance = flags.maintenance_mode,
        checkout_locked = flags.checkout_locked,
        registration_locked = flags.registration_locked,
        "Platform flags updated"
    );

    Ok(Json(flags))
}

// =============================================================================
// Sessions and audit
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

pub async fn list_sessions(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ActiveSession>>> {
    Ok(Json(
        SessionRepository::new(state.pool())
            .list_active(query.page)
            .await?,
    ))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn terminate_session(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if !SessionRepository::new(state.pool())
        .end(id, SessionEndReason::Forced)
        .await?
    {
        return Err(AppError::NotFound("open session".to_owned()));
    }
    ActivityRepository::new(state.pool())
        .record_or_warn(Some(admin.id), "terminate", "session", Some(id.to_string()), json!({}))
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionLogQuery {
    pub profile_id: Option<UserId>,
    pub page: Option<u32>,
}

pub async fn session_logs(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<SessionLogQuery>,
) -> Result<Json<Vec<SessionLogEntry>>> {
    Ok(Json(
        SessionRepository::new(state.pool())
            .logs(query.profile_id, query.page)
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub entity_type: Option<String>,
    pub page: Option<u32>,
}

pub async fn activity(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>> {
    Ok(Json(
        ActivityRepository::new(state.pool())
            .recent(query.entity_type.as_deref(), query.page)
            .await?,
    ))
}

// =============================================================================
// Orders and claims
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
}

pub async fn list_orders(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .list_all(query.status, query.page)
            .await?,
    ))
}

pub async fn show_order(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let items = orders.items(id).await?;

    Ok(Json(OrderDetail { order, items }))
}

/// Move any seller's line item, for support cases.
#[instrument(skip(state, body), fields(admin_id = %admin.id, status = ?body.status))]
pub async fn update_item_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(OrderId, OrderItemId)>,
    Json(body): Json<ItemStatusRequest>,
) -> Result<Json<OrderDetail>> {
    let tracking = body.tracking()?;
    let order = OrderRepository::new(state.pool())
        .update_item_status(order_id, item_id, Fulfiller::Admin, body.status, tracking)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(admin.id),
            "set_item_status",
            "order",
            Some(order_id.to_string()),
            json!({ "item_id": item_id, "status": body.status }),
        )
        .await;

    Ok(Json(order))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimsQuery {
    pub status: Option<ClaimStatus>,
    pub page: Option<u32>,
}

pub async fn list_claims(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ClaimsQuery>,
) -> Result<Json<Vec<Claim>>> {
    Ok(Json(
        ClaimRepository::new(state.pool())
            .list(query.status, query.page)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ClaimStatusRequest {
    pub status: ClaimStatus,
    pub resolution: Option<String>,
}

#[instrument(skip(state, body), fields(admin_id = %admin.id, status = ?body.status))]
pub async fn set_claim_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ClaimId>,
    Json(body): Json<ClaimStatusRequest>,
) -> Result<Json<Claim>> {
    let resolution = body
        .resolution
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    if body.status.is_terminal() && resolution.is_none() {
        return Err(AppError::BadRequest(
            "a resolution note is required to close a claim".to_owned(),
        ));
    }

    let claim = ClaimRepository::new(state.pool())
        .set_status(id, body.status, resolution, admin.id)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(admin.id),
            "set_status",
            "claim",
            Some(id.to_string()),
            json!({ "status": body.status }),
        )
        .await;

    Ok(Json(claim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::Email;

    fn admin(id: i32) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("root@bazaar.test").expect("valid email"),
            display_name: "root".to_owned(),
            role: Role::Admin,
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_admin_cannot_target_self() {
        assert!(matches!(
            not_self(&admin(1), UserId::new(1), "disable"),
            Err(AppError::Conflict(_))
        ));
        assert!(not_self(&admin(1), UserId::new(2), "disable").is_ok());
    }

    #[test]
    fn test_platform_body_is_partial() {
        let flags: PlatformFlags =
            serde_json::from_str(r#"{"maintenance_mode": true}"#).expect("valid body");
        assert!(flags.maintenance_mode);
        assert!(!flags.checkout_locked);
    }

    #[test]
    fn test_users_filter_query() {
        let uri: axum::http::Uri = "/api/admin/users?role=content_manager&q=ann&page=3"
            .parse()
            .expect("uri");
        let Query(filter) = Query::<ProfileFilter>::try_from_uri(&uri).expect("query");
        assert_eq!(filter.role, Some(Role::ContentManager));
        assert_eq!(filter.q.as_deref(), Some("ann"));
        assert_eq!(filter.page, Some(3));
    }
}
