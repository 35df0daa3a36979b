//! Integration tests for Bazaar.
//!
//! # Running Tests
//!
//! Tests under `tests/` that only touch library types run with the rest of
//! the workspace. Tests marked `#[ignore]` drive a running server:
//!
//! ```bash
//! bz-cli migrate
//! cargo run -p bazaar-server &
//! BAZAAR_TEST_URL=http://127.0.0.1:3000 cargo test -p bazaar-integration-tests -- --ignored
//! ```
//!
//! The live tests read `BAZAAR_DATABASE_URL` to promote accounts and flip
//! platform flags directly, so they must point at the server's database.
//! Maintenance tests change global state; run them with `--test-threads=1`.

use bazaar_core::{Email, PlatformFlags, Role};
use bazaar_server::db::ProfileRepository;
use bazaar_server::db::settings;
use bazaar_server::services::platform::FLAGS_TTL;
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;

pub const TEST_PASSWORD: &str = "correct horse battery";

/// A running server plus direct database access.
pub struct TestContext {
    pub base_url: String,
    pub pool: PgPool,
}

/// An email address no other test run has used.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@bazaar.test", uuid::Uuid::new_v4().simple())
}

/// A client that keeps the session cookie between requests.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("client builds")
}

impl TestContext {
    /// # Panics
    ///
    /// Panics if `BAZAAR_DATABASE_URL` is unset or unreachable.
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();
        let base_url = std::env::var("BAZAAR_TEST_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_owned());
        let database_url =
            std::env::var("BAZAAR_DATABASE_URL").expect("BAZAAR_DATABASE_URL must be set");
        let pool = bazaar_server::db::create_pool(&SecretString::from(database_url))
            .await
            .expect("database reachable");

        Self { base_url, pool }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Register and sign in a new account on `client`. Returns its email.
    ///
    /// # Panics
    ///
    /// Panics if registration does not answer 201.
    pub async fn register(&self, client: &Client, prefix: &str, role: Role) -> String {
        let email = unique_email(prefix);
        let response = client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "email": email,
                "password": TEST_PASSWORD,
                "display_name": prefix,
                "role": role,
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(response.status(), StatusCode::CREATED, "register {email}");
        email
    }

    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn login(&self, client: &Client, email: &str) -> StatusCode {
        client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": TEST_PASSWORD }))
            .send()
            .await
            .expect("login request")
            .status()
    }

    /// Give an existing account a role no visitor can pick for themselves.
    ///
    /// # Panics
    ///
    /// Panics if the account does not exist.
    pub async fn promote(&self, email: &str, role: Role) {
        let email = Email::parse(email).expect("valid email");
        let repo = ProfileRepository::new(&self.pool);
        let profile = repo
            .get_by_email(&email)
            .await
            .expect("query")
            .expect("account exists");
        repo.set_role(profile.id, role).await.expect("role updated");
    }

    /// Write the platform flags and wait until every server cache has expired.
    ///
    /// # Panics
    ///
    /// Panics if the flags cannot be stored.
    pub async fn set_flags(&self, flags: &PlatformFlags) {
        settings::set_platform_flags(&self.pool, flags, None)
            .await
            .expect("flags stored");
        tokio::time::sleep(FLAGS_TTL + std::time::Duration::from_millis(500)).await;
    }

    /// GET `path` and decode the JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn get_json(&self, client: &Client, path: &str) -> (StatusCode, Value) {
        let response = client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request");
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// POST a JSON body to `path` and decode the reply.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn post_json(&self, client: &Client, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST request");
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}
