//! `POST /set-claims` authentication against a running server.
//!
//! Ignored by default; see the crate docs for how to run them. The bad-body
//! case needs `SET_CLAIMS_SECRET` in the test environment as well.

use bazaar_integration_tests::{TestContext, client};
use reqwest::StatusCode;
use serde_json::json;

const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_set_claims_requires_credentials() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx
        .post_json(
            &client(),
            "/set-claims",
            &json!({ "uid": "someone", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_set_claims_rejects_wrong_secret() {
    let ctx = TestContext::new().await;
    let response = client()
        .post(ctx.url("/set-claims"))
        .header(ADMIN_SECRET_HEADER, "definitely-not-the-secret")
        .json(&json!({ "uid": "someone", "role": "admin" }))
        .send()
        .await
        .expect("set-claims");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_set_claims_rejects_bad_body() {
    let ctx = TestContext::new().await;
    let Ok(secret) = std::env::var("SET_CLAIMS_SECRET") else {
        return;
    };

    for body in [
        json!({ "uid": "", "role": "admin" }),
        json!({ "uid": "someone", "role": "superuser" }),
        json!({ "role": "admin" }),
    ] {
        let response = client()
            .post(ctx.url("/set-claims"))
            .header(ADMIN_SECRET_HEADER, &secret)
            .json(&body)
            .send()
            .await
            .expect("set-claims");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}
