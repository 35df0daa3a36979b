//! Tracked-session enforcement.
//!
//! Runs on every request that carries a logged-in cookie session. The
//! referenced `user_session` row is checked against the inactivity policy:
//! expired, ended or disabled sessions are closed and the cookie session is
//! cleared, so the request continues anonymously; live sessions are touched
//! and the caller's role is refreshed from the profile.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::{debug, info, warn};

use bazaar_core::{SessionEndReason, SessionVerdict};

use crate::db::SessionRepository;
use crate::db::sessions::SessionRecord;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

use super::auth::clear_current_user;

/// Response header telling the client why its session just ended.
pub const SESSION_ENDED_HEADER: &str = "x-session-ended";

const fn reason_code(reason: SessionEndReason) -> &'static str {
    match reason {
        SessionEndReason::Logout => "logout",
        SessionEndReason::IdleTimeout => "idle_timeout",
        SessionEndReason::MaxAge => "max_age",
        SessionEndReason::Forced => "forced",
        SessionEndReason::Maintenance => "maintenance",
    }
}

/// Result of checking a tracked session.
enum Check {
    Live(CurrentUser),
    Ended(SessionEndReason),
}

async fn check(state: &AppState, user: &CurrentUser) -> Result<Check, AppError> {
    let sessions = SessionRepository::new(state.pool());

    let Some(record) = sessions.load(user.session_id).await? else {
        return Ok(Check::Ended(SessionEndReason::Forced));
    };
    if let Some(ended_at) = record.ended_at {
        debug!(session_id = %record.id, %ended_at, "Cookie refers to an ended session");
        return Ok(Check::Ended(record.end_reason.unwrap_or(SessionEndReason::Forced)));
    }
    if record.disabled {
        sessions.end(record.id, SessionEndReason::Forced).await?;
        info!(session_id = %record.id, profile_id = %record.profile_id, "Ended session of disabled account");
        return Ok(Check::Ended(SessionEndReason::Forced));
    }

    match state
        .session_policy()
        .evaluate(record.started_at, record.last_activity_at, Utc::now())
    {
        SessionVerdict::Expired(kind) => {
            let reason = SessionEndReason::from(kind);
            sessions.end(record.id, reason).await?;
            info!(session_id = %record.id, reason = reason_code(reason), "Session expired");
            Ok(Check::Ended(reason))
        }
        SessionVerdict::Active { needs_touch } => {
            if needs_touch {
                sessions.touch(record.id).await?;
            }
            Ok(Check::Live(refreshed(user, &record)))
        }
    }
}

/// The session user with identity fields reloaded from the profile.
fn refreshed(user: &CurrentUser, record: &SessionRecord) -> CurrentUser {
    let display_name = record
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| user.display_name.clone(), str::to_owned);

    CurrentUser {
        role: record.role,
        display_name,
        ..user.clone()
    }
}

/// Validate the tracked session and expose the caller as a request extension.
pub async fn session_activity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return next.run(request).await;
    };

    let user = match session.get::<CurrentUser>(session_keys::CURRENT_USER).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Failed to read session");
            None
        }
    };

    let mut ended = None;
    if let Some(user) = user {
        match check(&state, &user).await {
            Ok(Check::Live(current)) => {
                if current != user
                    && let Err(e) = session.insert(session_keys::CURRENT_USER, &current).await
                {
                    warn!(error = %e, "Failed to refresh session user");
                }
                set_sentry_user(&current.id, Some(current.email.as_str()));
                request.extensions_mut().insert(current);
            }
            Ok(Check::Ended(reason)) => {
                if let Err(e) = clear_current_user(&session).await {
                    warn!(error = %e, "Failed to clear ended session");
                }
                clear_sentry_user();
                ended = Some(reason);
            }
            Err(e) => return axum::response::IntoResponse::into_response(e),
        }
    }

    let mut response = next.run(request).await;
    if let Some(reason) = ended {
        response.headers_mut().insert(
            SESSION_ENDED_HEADER,
            HeaderValue::from_static(reason_code(reason)),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{Email, Role, UserId};
    use uuid::Uuid;

    fn record(display_name: Option<&str>, role: Role) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: Uuid::new_v4(),
            profile_id: UserId::new(7),
            started_at: now,
            last_activity_at: now,
            ended_at: None,
            end_reason: None,
            email: "kim@bazaar.test".to_owned(),
            display_name: display_name.map(str::to_owned),
            role,
            disabled: false,
        }
    }

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(7),
            email: Email::parse("kim@bazaar.test").expect("valid email"),
            display_name: "kim".to_owned(),
            role: Role::Customer,
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_refresh_picks_up_role_change() {
        let current = refreshed(&user(), &record(Some("Kim Lee"), Role::Seller));
        assert_eq!(current.role, Role::Seller);
        assert_eq!(current.display_name, "Kim Lee");
    }

    #[test]
    fn test_refresh_keeps_name_when_profile_has_none() {
        let before = user();
        let current = refreshed(&before, &record(Some("  "), Role::Customer));
        assert_eq!(current, before);
    }

    #[test]
    fn test_reason_codes_match_wire_names() {
        for reason in [
            SessionEndReason::Logout,
            SessionEndReason::IdleTimeout,
            SessionEndReason::MaxAge,
            SessionEndReason::Forced,
            SessionEndReason::Maintenance,
        ] {
            let wire = serde_json::to_value(reason).expect("serializes");
            assert_eq!(wire.as_str(), Some(reason_code(reason)));
        }
    }
}
