//! Registration, login and logout.
//!
//! A successful login opens a tracked `user_session` row and stores the
//! [`CurrentUser`] in the cookie session. Failed attempts are written to the
//! session log.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{StatusCode, header::USER_AGENT, request::Parts},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use bazaar_core::{Area, Role, SessionEndReason, gate};

use crate::db::SessionRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, forwarded_ip, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService, is_self_service_role};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

/// `GET /api/auth/me`, polled by clients, so kept out of the strict limiter.
pub fn me_router() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(me))
}

/// Where a login came from, as recorded on the tracked session.
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(512).collect());
        let ip_address = forwarded_ip(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .map(|ip| ip.to_string());

        Ok(Self {
            user_agent,
            ip_address,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Option<CurrentUser>,
}

/// Open a tracked session for `user` and store it in the cookie session.
async fn sign_in(
    state: &AppState,
    session: &Session,
    client: &ClientInfo,
    profile: &crate::db::profiles::Profile,
) -> Result<CurrentUser> {
    // Fresh session id on privilege change
    session.cycle_id().await?;

    let session_id = SessionRepository::new(state.pool())
        .start(
            profile.id,
            profile.email.as_str(),
            client.user_agent.as_deref(),
            client.ip_address.as_deref(),
        )
        .await?;

    let user = CurrentUser::from_profile(profile, session_id);
    set_current_user(session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(user)
}

/// Create a customer or seller account and sign it in.
#[instrument(skip(state, session, client, body), fields(email = %body.email, role = %body.role))]
pub async fn register(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    session: Session,
    client: ClientInfo,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CurrentUser>)> {
    let flags = state.platform().flags().await?;
    gate(current.as_ref().map(|u| u.role), Area::Registration, &flags)?;

    if !is_self_service_role(body.role) {
        return Err(AppError::BadRequest(
            "only customer and seller accounts can be registered".to_owned(),
        ));
    }

    let profile = AuthService::new(state.pool())
        .register(
            &body.email,
            &body.password,
            body.display_name.as_deref(),
            body.role,
        )
        .await?;
    info!(profile_id = %profile.id, "Account registered");

    let user = sign_in(&state, &session, &client, &profile).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, session, client, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    client: ClientInfo,
    Json(body): Json<LoginRequest>,
) -> Result<Json<CurrentUser>> {
    let profile = match AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
    {
        Ok(profile) => profile,
        Err(e @ (AuthError::InvalidCredentials | AuthError::AccountDisabled)) => {
            let email = body.email.trim().to_lowercase();
            if let Err(log_err) = SessionRepository::new(state.pool())
                .log_failed_login(&email, client.ip_address.as_deref())
                .await
            {
                warn!(error = %log_err, "Failed to log failed login");
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    // Maintenance keeps everyone but admins out, login included
    let flags = state.platform().flags().await?;
    gate(Some(profile.role), Area::Public, &flags)?;

    let user = sign_in(&state, &session, &client, &profile).await?;
    info!(profile_id = %user.id, session_id = %user.session_id, "Logged in");
    Ok(Json(user))
}

#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    if let Some(user) = session
        .get::<CurrentUser>(crate::models::session_keys::CURRENT_USER)
        .await?
    {
        SessionRepository::new(state.pool())
            .end(user.session_id, SessionEndReason::Logout)
            .await?;
        clear_current_user(&session).await?;
        info!(profile_id = %user.id, "Logged out");
    }

    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {}", e);
    }
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in user, or `null`. Never rejects, so clients can poll it.
pub async fn me(OptionalAuth(user): OptionalAuth) -> Json<MeResponse> {
    Json(MeResponse { user })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_role_defaults_to_customer() {
        let body: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@b.test","password":"longenough"}"#)
                .expect("valid body");
        assert_eq!(body.role, Role::Customer);
        assert!(body.display_name.is_none());
    }

    #[test]
    fn test_register_accepts_seller() {
        let body: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@b.test","password":"longenough","role":"seller","display_name":"Ana"}"#,
        )
        .expect("valid body");
        assert_eq!(body.role, Role::Seller);
    }

    #[tokio::test]
    async fn test_client_info_from_proxy_headers() {
        let request = axum::http::Request::builder()
            .header(USER_AGENT, "curl/8.0")
            .header("x-forwarded-for", "203.0.113.5, 10.0.0.1")
            .body(())
            .expect("request");
        let (mut parts, ()) = request.into_parts();

        let Ok(info) = ClientInfo::from_request_parts(&mut parts, &()).await;
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.5"));
    }
}
