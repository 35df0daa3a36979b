//! End-to-end marketplace flow against a running server.
//!
//! Ignored by default; see the crate docs for how to run them.

use bazaar_core::Role;
use bazaar_integration_tests::{TestContext, client};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_register_login_me() {
    let ctx = TestContext::new().await;
    let browser = client();

    let email = ctx.register(&browser, "shopper", Role::Customer).await;
    let (status, me) = ctx.get_json(&browser, "/api/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], email.as_str());
    assert_eq!(me["user"]["role"], "customer");

    let logout = browser
        .post(ctx.url("/api/auth/logout"))
        .send()
        .await
        .expect("logout");
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let (_, me) = ctx.get_json(&browser, "/api/auth/me").await;
    assert_eq!(me["user"], Value::Null);

    assert_eq!(ctx.login(&browser, &email).await, StatusCode::OK);
    let (_, me) = ctx.get_json(&browser, "/api/auth/me").await;
    assert_eq!(me["user"]["email"], email.as_str());
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_register_cannot_pick_staff_role() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx
        .post_json(
            &client(),
            "/api/auth/register",
            &json!({
                "email": bazaar_integration_tests::unique_email("sneaky"),
                "password": bazaar_integration_tests::TEST_PASSWORD,
                "role": "admin",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_customer_cannot_open_dashboards() {
    let ctx = TestContext::new().await;
    let browser = client();
    ctx.register(&browser, "curious", Role::Customer).await;

    for path in [
        "/api/seller/dashboard",
        "/api/editor/products/pending",
        "/api/content/pages",
        "/api/admin/dashboard",
    ] {
        let (status, _) = ctx.get_json(&browser, path).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
    }

    let (status, _) = ctx.get_json(&client(), "/api/orders").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_admin_dashboard_totals() {
    let ctx = TestContext::new().await;
    let admin = client();
    let email = ctx.register(&admin, "dash-admin", Role::Customer).await;
    ctx.promote(&email, Role::Admin).await;

    let (status, dashboard) = ctx.get_json(&admin, "/api/admin/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert!(dashboard["users_by_role"]["admin"].as_i64() >= Some(1));
    assert!(dashboard["active_sessions"].as_i64() >= Some(1));
    assert!(dashboard["orders"]["orders"].is_i64());
    assert!(dashboard["unresolved_claims"].is_i64());
    assert!(dashboard["products_by_status"].is_object());
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_listing_to_delivery() {
    let ctx = TestContext::new().await;

    // Seller lists a product and submits it for review.
    let seller = client();
    ctx.register(&seller, "seller", Role::Seller).await;
    let (status, product) = ctx
        .post_json(
            &seller,
            "/api/seller/products",
            &json!({
                "title": "Hand-thrown mug",
                "description": "Stoneware, 350 ml",
                "category": "kitchen",
                "price": "18.50",
                "stock": 3,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["status"], "draft");
    let product_id = product["id"].clone();

    let (status, submitted) = ctx
        .post_json(
            &seller,
            &format!("/api/seller/products/{product_id}/submit"),
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["status"], "pending_review");

    // Editor approves it.
    let editor = client();
    let editor_email = ctx.register(&editor, "editor", Role::Customer).await;
    ctx.promote(&editor_email, Role::Editor).await;
    let (status, approved) = ctx
        .post_json(
            &editor,
            &format!("/api/editor/products/{product_id}/approve"),
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "active");

    // Buyer adds two to the cart and checks out.
    let buyer = client();
    ctx.register(&buyer, "buyer", Role::Customer).await;
    let (status, cart) = ctx
        .post_json(
            &buyer,
            "/api/cart/items",
            &json!({ "product_id": product_id, "quantity": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["item_count"], 2);

    let (status, order) = ctx
        .post_json(
            &buyer,
            "/api/checkout",
            &json!({ "shipping_address": "1 Pottery Lane, Stoke" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    let order_id = order["id"].clone();
    let item_id = order["items"][0]["id"].clone();

    let (_, cart) = ctx.get_json(&buyer, "/api/cart").await;
    assert_eq!(cart["item_count"], 0);

    let (_, detail) = ctx
        .get_json(&buyer, &format!("/api/products/{product_id}"))
        .await;
    assert_eq!(detail["stock"], 1);

    // Seller works the line item through to shipped.
    let status_path = format!("/api/seller/orders/{order_id}/items/{item_id}/status");
    let (status, _) = ctx
        .post_json(&seller, &status_path, &json!({ "status": "processing" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .post_json(
            &seller,
            &status_path,
            &json!({ "status": "shipped", "tracking_number": "1Z999AA10123456784" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Going backwards is refused.
    let (status, _) = ctx
        .post_json(&seller, &status_path, &json!({ "status": "processing" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, order) = ctx
        .get_json(&buyer, &format!("/api/orders/{order_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "shipped");
    assert_eq!(order["items"][0]["tracking_number"], "1Z999AA10123456784");

    // Too late for the buyer to cancel.
    let (status, _) = ctx
        .post_json(&buyer, &format!("/api/orders/{order_id}/cancel"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
