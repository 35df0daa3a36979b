//! Maintenance mode and checkout lock against a running server.
//!
//! These flip global flags: run with `--ignored --test-threads=1`.

use bazaar_core::{PlatformFlags, Role};
use bazaar_integration_tests::{TestContext, client};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "requires a running server and database; changes global flags"]
async fn test_maintenance_mode() {
    let ctx = TestContext::new().await;

    let customer = client();
    let customer_email = ctx.register(&customer, "regular", Role::Customer).await;
    let admin = client();
    let admin_email = ctx.register(&admin, "operator", Role::Customer).await;
    ctx.promote(&admin_email, Role::Admin).await;

    ctx.set_flags(&PlatformFlags {
        maintenance_mode: true,
        maintenance_message: Some("Upgrading the database".to_owned()),
        ..PlatformFlags::default()
    })
    .await;

    // Status stays readable so clients can show the banner.
    let (status, body) = ctx.get_json(&client(), "/api/platform/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["maintenance_mode"], true);
    assert_eq!(body["maintenance_message"], "Upgrading the database");

    // Everything else answers 503 with the message.
    let (status, body) = ctx.get_json(&client(), "/api/products").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.to_string().contains("Upgrading the database"));

    // Non-admins cannot sign in; admins can and keep working.
    assert_eq!(
        ctx.login(&client(), &customer_email).await,
        StatusCode::SERVICE_UNAVAILABLE
    );
    let (status, _) = ctx.get_json(&admin, "/api/admin/dashboard").await;
    assert_eq!(status, StatusCode::OK);

    // The customer's existing session was not ended by the direct write, but
    // the gate still turns it away.
    let (status, _) = ctx.get_json(&customer, "/api/orders").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Lifting maintenance through the API restores access.
    let response = admin
        .put(ctx.url("/api/admin/platform"))
        .json(&json!({ "maintenance_mode": false }))
        .send()
        .await
        .expect("PUT platform");
    assert_eq!(response.status(), StatusCode::OK);

    ctx.set_flags(&PlatformFlags::default()).await;
    let (status, _) = ctx.get_json(&customer, "/api/orders").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a running server and database; changes global flags"]
async fn test_admin_maintenance_ends_customer_sessions() {
    let ctx = TestContext::new().await;

    let customer = client();
    ctx.register(&customer, "bystander", Role::Customer).await;
    let admin = client();
    let admin_email = ctx.register(&admin, "switcher", Role::Customer).await;
    ctx.promote(&admin_email, Role::Admin).await;

    let response = admin
        .put(ctx.url("/api/admin/platform"))
        .json(&json!({ "maintenance_mode": true }))
        .send()
        .await
        .expect("PUT platform");
    assert_eq!(response.status(), StatusCode::OK);

    let response = customer
        .get(ctx.url("/api/auth/me"))
        .send()
        .await
        .expect("GET me");
    assert_eq!(
        response
            .headers()
            .get("x-session-ended")
            .and_then(|v| v.to_str().ok()),
        Some("maintenance")
    );

    let response = admin
        .put(ctx.url("/api/admin/platform"))
        .json(&json!({ "maintenance_mode": false }))
        .send()
        .await
        .expect("PUT platform");
    assert_eq!(response.status(), StatusCode::OK);
    ctx.set_flags(&PlatformFlags::default()).await;
}

#[tokio::test]
#[ignore = "requires a running server and database; changes global flags"]
async fn test_checkout_lock() {
    let ctx = TestContext::new().await;
    let buyer = client();
    ctx.register(&buyer, "locked-out", Role::Customer).await;

    ctx.set_flags(&PlatformFlags {
        checkout_locked: true,
        ..PlatformFlags::default()
    })
    .await;

    let (status, _) = ctx.get_json(&buyer, "/api/products").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.post_json(&buyer, "/api/checkout", &json!({})).await;
    assert_eq!(status, StatusCode::LOCKED);

    ctx.set_flags(&PlatformFlags::default()).await;
}
