//! `POST /set-claims`: write role claims to the identity provider.
//!
//! The caller proves admin rights either with the shared secret in
//! `X-Admin-Secret` or with an identity provider ID token whose claims already
//! grant admin. If a local profile is linked to the target `uid`, its role is
//! updated as well.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, header::AUTHORIZATION},
    routing::post,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use bazaar_core::{Role, UserId};

use crate::db::{ActivityRepository, ProfileRepository};
use crate::error::{AppError, Result};
use crate::services::identity::{Claims, claims_for_role};
use crate::state::AppState;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

const MAX_UID_LEN: usize = 128;

pub fn router() -> Router<AppState> {
    Router::new().route("/set-claims", post(set_claims))
}

#[derive(Debug, Deserialize)]
pub struct SetClaimsRequest {
    pub uid: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct SetClaimsResponse {
    pub uid: String,
    pub claims: Claims,
}

/// How the caller authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Caller {
    SharedSecret,
    IdToken { uid: String },
}

impl Caller {
    const fn method(&self) -> &'static str {
        match self {
            Self::SharedSecret => "shared_secret",
            Self::IdToken { .. } => "id_token",
        }
    }
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<Caller> {
    if let Some(provided) = headers.get(ADMIN_SECRET_HEADER) {
        let expected = state
            .config()
            .claims
            .shared_secret
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("shared secret is not accepted".to_owned()))?;
        let provided = provided.to_str().unwrap_or_default();

        return if constant_time_eq(provided, expected.expose_secret()) {
            Ok(Caller::SharedSecret)
        } else {
            Err(AppError::Unauthorized("invalid admin secret".to_owned()))
        };
    }

    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("missing credentials".to_owned()))?;
    let identity = state.identity().lookup_id_token(token).await?;
    if !identity.is_admin() {
        return Err(AppError::Forbidden("caller is not an admin".to_owned()));
    }

    Ok(Caller::IdToken { uid: identity.uid })
}

/// Validate the request body: a non-empty `uid` and a known role.
fn parse_request(body: &SetClaimsRequest) -> Result<(&str, Role)> {
    let uid = body.uid.trim();
    if uid.is_empty() || uid.len() > MAX_UID_LEN {
        return Err(AppError::BadRequest(format!(
            "uid must be 1 to {MAX_UID_LEN} characters"
        )));
    }
    let role = body
        .role
        .parse::<Role>()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok((uid, role))
}

#[instrument(skip_all)]
pub async fn set_claims(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<SetClaimsRequest>, JsonRejection>,
) -> Result<Json<SetClaimsResponse>> {
    let caller = authorize(&state, &headers).await?;
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let (uid, role) = parse_request(&body)?;

    let claims = claims_for_role(role);
    state.identity().set_custom_claims(uid, &claims).await?;
    info!(uid, %role, via = caller.method(), "Custom claims set");

    let profiles = ProfileRepository::new(state.pool());
    let actor_id: Option<UserId> = match &caller {
        Caller::IdToken { uid } => profiles.get_by_identity_uid(uid).await?.map(|p| p.id),
        Caller::SharedSecret => None,
    };

    match profiles.get_by_identity_uid(uid).await? {
        Some(profile) if profile.role != role => {
            profiles.set_role(profile.id, role).await?;
            info!(profile_id = %profile.id, from = %profile.role, to = %role, "Linked profile role updated");
        }
        Some(_) => {}
        None => warn!(uid, "No local profile linked to identity"),
    }

    ActivityRepository::new(state.pool())
        .record_or_warn(
            actor_id,
            "set_claims",
            "identity",
            Some(uid.to_owned()),
            json!({ "role": role, "via": caller.method() }),
        )
        .await;

    Ok(Json(SetClaimsResponse {
        uid: uid.to_owned(),
        claims,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderValue, Request, StatusCode, header::CONTENT_TYPE},
    };
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use url::Url;

    use bazaar_core::InactivityPolicy;

    use crate::config::{BazaarConfig, ClaimsConfig};

    const SHARED_SECRET: &str = "claims-shared-value";

    /// State over a lazy pool: nothing here reaches the database.
    fn test_state(shared_secret: Option<&str>, api_base: &str) -> AppState {
        let config = BazaarConfig {
            database_url: SecretString::from("postgres://bazaar@127.0.0.1:1/bazaar"),
            host: [127, 0, 0, 1].into(),
            port: 0,
            base_url: "http://localhost:3000".to_owned(),
            session_secret: SecretString::from("s".repeat(64)),
            session_policy: InactivityPolicy::default(),
            log_json: false,
            claims: ClaimsConfig {
                shared_secret: shared_secret.map(SecretString::from),
                api_base: Url::parse(api_base).expect("url"),
                project_id: Some("bazaar-test".to_owned()),
                api_key: Some(SecretString::from("api-key")),
                admin_token: None,
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://bazaar@127.0.0.1:1/bazaar")
            .expect("lazy pool");
        AppState::new(config, pool).expect("state")
    }

    /// Serve a fixed `accounts:lookup` answer for a non-admin identity.
    async fn spawn_lookup_stub() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new().fallback(|| async {
            Json(json!({
                "users": [{
                    "localId": "seller-uid",
                    "email": "seller@bazaar.test",
                    "customAttributes": r#"{"role":"seller","admin":false}"#
                }]
            }))
        });
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn secret_headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_SECRET_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[tokio::test]
    async fn test_authorize_requires_credentials() {
        let state = test_state(Some(SHARED_SECRET), "http://127.0.0.1:1");
        let err = authorize(&state, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_authorize_shared_secret() {
        let state = test_state(Some(SHARED_SECRET), "http://127.0.0.1:1");
        assert_eq!(
            authorize(&state, &secret_headers(SHARED_SECRET))
                .await
                .expect("caller"),
            Caller::SharedSecret
        );

        let err = authorize(&state, &secret_headers("claims-shared-valuE"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_authorize_secret_without_configured_secret() {
        let state = test_state(None, "http://127.0.0.1:1");
        let err = authorize(&state, &secret_headers(SHARED_SECRET))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_authorize_rejects_non_admin_token() {
        let api_base = spawn_lookup_stub().await;
        let state = test_state(Some(SHARED_SECRET), &api_base);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer seller-token"));

        let err = authorize(&state, &headers).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    async fn post_set_claims(
        state: AppState,
        secret: Option<&'static str>,
        body: &'static str,
    ) -> StatusCode {
        let mut request = Request::post("/set-claims").header(CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            request = request.header(ADMIN_SECRET_HEADER, secret);
        }
        let request = request.body(Body::from(body)).expect("request");

        router()
            .with_state(state)
            .oneshot(request)
            .await
            .expect("response")
            .status()
    }

    #[tokio::test]
    async fn test_set_claims_status_codes() {
        let state = test_state(Some(SHARED_SECRET), "http://127.0.0.1:1");

        let body = r#"{"uid":"abc","role":"admin"}"#;
        assert_eq!(
            post_set_claims(state.clone(), None, body).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            post_set_claims(state.clone(), Some("wrong"), body).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            post_set_claims(state.clone(), Some(SHARED_SECRET), "{not json").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post_set_claims(
                state,
                Some(SHARED_SECRET),
                r#"{"uid":"abc","role":"superuser"}"#
            )
            .await,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("s3cret-value", "s3cret-value"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("s3cret-value", "s3cret-valuE"));
        assert!(!constant_time_eq("short", "longer"));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer eyJhbGciOi"));
        assert_eq!(bearer_token(&headers), Some("eyJhbGciOi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }

    fn request(uid: &str, role: &str) -> SetClaimsRequest {
        SetClaimsRequest {
            uid: uid.to_owned(),
            role: role.to_owned(),
        }
    }

    #[test]
    fn test_parse_request() {
        let body = request(" abc123 ", "admin");
        assert_eq!(parse_request(&body).expect("valid"), ("abc123", Role::Admin));

        let body = request("abc123", "content-manager");
        assert_eq!(
            parse_request(&body).expect("valid").1,
            Role::ContentManager
        );
    }

    #[test]
    fn test_parse_request_rejects_bad_input() {
        assert!(matches!(
            parse_request(&request("", "admin")),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_request(&request("abc", "superuser")),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_request(&request(&"u".repeat(MAX_UID_LEN + 1), "seller")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_caller_method() {
        assert_eq!(Caller::SharedSecret.method(), "shared_secret");
        assert_eq!(
            Caller::IdToken {
                uid: "u".to_owned()
            }
            .method(),
            "id_token"
        );
    }
}
