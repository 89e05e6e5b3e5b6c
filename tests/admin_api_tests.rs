// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin API tests.
//!
//! These tests verify that:
//! 1. Admin routes reject anonymous (401) and non-admin (403) callers
//! 2. Trend and category CRUD validates input and reports unknown ids
//! 3. Subscription changes take effect on the next trend read

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use trendboard::models::TrendKind;

mod common;

async fn admin_token(app: &common::TestApp) -> String {
    let admin = common::create_user(&app.state, "admin@example.com", true).await;
    common::token_for(&app.state, &admin)
}

#[tokio::test]
async fn test_admin_route_without_token_is_401() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(common::get("/admin/trends", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);    let body = common::body_json(response).await;
    assert_eq!(body, json!({ "error": "unauthorized" }));
}

#[tokio::test]
async fn test_admin_route_with_regular_user_is_403() {
    let app = common::create_test_app().await;
    let user = common::create_user(&app.state, "shopper@example.com", false).await;
    let token = common::token_for(&app.state, &user);

    let response = app
        .router
        .oneshot(common::get("/admin/trends", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);    let body = common::body_json(response).await;
    assert_eq!(body, json!({ "error": "forbidden" }));
}

#[tokio::test]
async fn test_admin_token_for_deleted_user_is_401() {
    let app = common::create_test_app().await;
    let token = trendboard::middleware::auth::create_jwt(
        uuid::Uuid::new_v4(),
        &app.state.config.jwt_signing_key,
    )
    .unwrap();

    let response = app
        .router
        .oneshot(common::get("/admin/categories", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);    let body = common::body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_admin_check_database_failure_is_500() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;
    app.state.db.close().await;

    let response = app
        .router
        .oneshot(common::get("/admin/trends", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body, json!({ "error": "database_error" }));
}

#[tokio::test]
async fn test_admin_list_is_unredacted() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;
    let id = common::seed_trend(&app.state, TrendKind::Style, "Wide Leg", None).await;
    app.state
        .db
        .set_analytics(
            TrendKind::Style,
            id,
            &trendboard::models::TrendAnalytics {
                dates: vec![chrono::NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()],
                values: vec![42.0],
                age_segments: None,
            },
        )
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(common::get("/admin/trends", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body[0]["analytics"]["values"], json!([42.0]));
    assert_eq!(body[0]["isRestricted"], false);
}

#[tokio::test]
async fn test_trend_crud_lifecycle() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;

    // Create
    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/admin/trends",
            Some(&token),
            json!({
                "title": "Quiet Luxury",
                "description": "Understated basics",
                "type": "aesthetic",
                "images": ["https://test-bucket.s3.us-east-1.amazonaws.com/trends/a.jpg"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = common::body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["type"], "aesthetic");
    assert_eq!(created["mainImageIndex"], 0);

    // Partial update keeps untouched fields
    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/trends/{}", id),
            Some(&token),
            json!({ "title": "Quiet Luxury 2.0" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = common::body_json(response).await;
    assert_eq!(updated["title"], "Quiet Luxury 2.0");
    assert_eq!(updated["description"], "Understated basics");

    // Analytics
    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/trends/{}/analytics", id),
            Some(&token),
            json!({
                "dates": ["2025-01-01", "2025-02-01"],
                "values": [1.0, 2.0],
                "ageSegments": {"25-34": 100}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let with_analytics = common::body_json(response).await;
    assert_eq!(with_analytics["analytics"]["values"], json!([1.0, 2.0]));

    // Delete
    let response = app
        .router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(format!("/admin/trends/{}", id))
                .header("authorization", format!("Bearer {}", token))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .oneshot(common::get(&format!("/admin/trends/{}", id), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_trend_validation() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;

    let cases = [
        json!({ "title": "" }),
        json!({ "title": "   " }),
        json!({ "title": "x".repeat(201) }),
        json!({ "title": "Bad index", "images": ["a.jpg"], "mainImageIndex": 1 }),
        json!({ "title": "No images", "mainImageIndex": 2 }),
        json!({ "title": "Ghost category", "categoryId": uuid::Uuid::new_v4() }),
    ];

    for body in cases {
        let response = app
            .router
            .clone()
            .oneshot(common::json_request(
                "POST",
                "/admin/colors",
                Some(&token),
                body.clone(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        let error = common::body_json(response).await;
        assert_eq!(error["error"], "bad_request");
    }
}

#[tokio::test]
async fn test_misaligned_analytics_rejected() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;
    let id = common::seed_trend(&app.state, TrendKind::Color, "Cherry Red", None).await;

    let response = app
        .router
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/colors/{}/analytics", id),
            Some(&token),
            json!({ "dates": ["2025-01-01"], "values": [1.0, 2.0] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_unknown_trend_is_404() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;

    let response = app
        .router
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/trends/{}", uuid::Uuid::new_v4()),
            Some(&token),
            json!({ "title": "Nobody" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_lifecycle_detaches_trends() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/admin/categories",
            Some(&token),
            json!({ "name": "Footwear" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let category = common::body_json(response).await;
    let category_id = category["id"].as_str().unwrap().to_string();

    // Duplicate names are rejected
    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/admin/categories",
            Some(&token),
            json!({ "name": "Footwear" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/admin/trends",
            Some(&token),
            json!({ "title": "Mary Janes", "categoryId": category_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let trend = common::body_json(response).await;
    assert_eq!(trend["categoryId"], category_id.as_str());

    // Public category list
    let response = app
        .router
        .clone()
        .oneshot(common::get("/categories", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_json(response).await[0]["name"], "Footwear");

    let response = app
        .router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(format!("/admin/categories/{}", category_id))
                .header("authorization", format!("Bearer {}", token))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .oneshot(common::get(
            &format!("/admin/trends/{}", trend["id"].as_str().unwrap()),
            Some(&token),
        ))
        .await
        .unwrap();
    let trend = common::body_json(response).await;
    assert!(trend["categoryId"].is_null());
}

#[tokio::test]
async fn test_subscription_grant_unlocks_analytics() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;
    let shopper = common::create_user(&app.state, "shopper@example.com", false).await;
    let shopper_token = common::token_for(&app.state, &shopper);
    common::seed_trend(
        &app.state,
        TrendKind::Style,
        "Loafers",
        Some(trendboard::models::TrendAnalytics {
            dates: vec![chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()],
            values: vec![7.0],
            age_segments: None,
        }),
    )
    .await;

    let expires = (Utc::now() + Duration::days(30)).to_rfc3339();
    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/users/{}/subscription", shopper.id),
            Some(&token),
            json!({ "expiresAt": expires }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user = common::body_json(response).await;
    assert!(user["subscriptionExpiresAt"].is_string());
    assert!(user.get("googleSub").is_none());

    let response = app
        .router
        .clone()
        .oneshot(common::get("/trends", Some(&shopper_token)))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body[0]["isRestricted"], false);
    assert_eq!(body[0]["analytics"]["values"], json!([7.0]));

    // Cancel
    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/users/{}/subscription", shopper.id),
            Some(&token),
            json!({ "expiresAt": null }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(common::get("/trends", Some(&shopper_token)))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body[0]["isRestricted"], true);
    assert_eq!(body[0]["analytics"]["values"], json!([0.0]));
}

#[tokio::test]
async fn test_subscription_bad_date_and_unknown_user() {
    let app = common::create_test_app().await;
    let token = admin_token(&app).await;
    let shopper = common::create_user(&app.state, "shopper@example.com", false).await;

    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/users/{}/subscription", shopper.id),
            Some(&token),
            json!({ "expiresAt": "someday" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/users/{}/subscription", uuid::Uuid::new_v4()),
            Some(&token),
            json!({ "expiresAt": "2030-01-01" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_changes() {
    let app = common::create_test_app().await;
    let admin = common::create_user(&app.state, "admin@example.com", true).await;
    let token = common::token_for(&app.state, &admin);
    let shopper = common::create_user(&app.state, "shopper@example.com", false).await;

    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/users/{}/role", shopper.id),
            Some(&token),
            json!({ "role": "admin" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_json(response).await["role"], "admin");

    // Admins cannot lock themselves out
    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "PUT",
            &format!("/admin/users/{}/role", admin.id),
            Some(&token),
            json!({ "role": "user" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .oneshot(common::get(
            "/admin/users?email=SHOPPER@example.com",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_json(response).await["role"], "admin");
}

#[tokio::test]
async fn test_sheet_import_requires_configuration() {
    let config = trendboard::config::Config {
        sheets_api_key: None,
        ..trendboard::config::Config::test_default()
    };
    let app = common::create_test_app_with_config(config).await;
    let token = admin_token(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/admin/import/sheet",
            Some(&token),
            json!({ "spreadsheetId": "abc", "range": "Sheet1!A1:Z50", "kind": "style" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .oneshot(common::json_request(
            "POST",
            "/admin/import/sheet",
            Some(&token),
            json!({ "spreadsheetId": "", "range": "Sheet1", "kind": "color" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
