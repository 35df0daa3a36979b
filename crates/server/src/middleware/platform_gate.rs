//! Maintenance gate.
//!
//! While maintenance mode is on, every request from a non-admin is answered
//! with 503 and the maintenance message. A few paths stay open so admins can
//! sign in and clients can poll the platform status. Checkout and
//! registration locks are enforced by their handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use bazaar_core::{Area, Denial, gate};

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::state::AppState;

const EXEMPT_PATHS: [&str; 7] = [
    "/health",
    "/health/ready",
    "/api/platform/status",
    "/api/auth/login",
    "/api/auth/logout",
    "/api/auth/me",
    "/set-claims",
];

#[must_use]
pub fn is_exempt(path: &str) -> bool {
    let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
    EXEMPT_PATHS.contains(&path)
}

pub async fn platform_gate_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let flags = match state.platform().flags().await {
        Ok(flags) => flags,
        Err(e) => return AppError::from(e).into_response(),
    };

    let role = request.extensions().get::<CurrentUser>().map(|u| u.role);
    if let Err(denial @ Denial::Maintenance(_)) = gate(role, Area::Public, &flags) {
        return AppError::from(denial).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt("/health"));
        assert!(is_exempt("/api/auth/login"));
        assert!(is_exempt("/api/platform/status/"));
        assert!(is_exempt("/set-claims"));
        assert!(!is_exempt("/"));
        assert!(!is_exempt("/api/products"));
        assert!(!is_exempt("/api/auth/register"));
    }
}
