//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Trailing slash normalization (wraps the router)
//! 2. Sentry layers (hub per request, transaction)
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID
//! 5. CORS (configured base URL only)
//! 6. Security headers
//! 7. Session layer (tower-sessions with `PostgreSQL` store)
//! 8. Session activity (inactivity rules, role refresh)
//! 9. Platform gate (maintenance mode)
//! 10. Rate limiting (per route group)

pub mod auth;
pub mod platform_gate;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod session_activity;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, RequireContentManager, RequireEditor,
    RequireSeller, clear_current_user, set_current_user,
};
pub use platform_gate::platform_gate_middleware;
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, forwarded_ip};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use session_activity::session_activity_middleware;
