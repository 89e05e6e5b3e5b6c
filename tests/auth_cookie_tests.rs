// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth cookie and OAuth entry point tests.
//!
//! These tests verify cookie removal attributes on logout for local and
//! production deployments, and the redirect issued when sign-in starts.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use tower::ServiceExt;
use trendboard::config::Config;

mod common;

fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// Frontend URL carried in the signed OAuth state of a sign-in redirect.
fn state_frontend_url(response: &Response) -> String {
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    let state = location
        .split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("state="))
        .unwrap();
    let state = urlencoding::decode(state).unwrap();
    let payload = String::from_utf8(URL_SAFE_NO_PAD.decode(state.as_bytes()).unwrap()).unwrap();
    let (url, _) = payload.split_once('|').unwrap();
    url.to_string()
}

fn logout_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .header(header::COOKIE, "trendboard_session=test")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_logout_cookie_removal_localhost_attributes() {
    let app = common::create_test_app().await;

    let response = app.router.oneshot(logout_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookies = set_cookie_headers(&response);
    let session_cookie = find_cookie(&set_cookies, "trendboard_session");

    assert!(session_cookie.contains("Path=/"));
    assert!(session_cookie.contains("HttpOnly"));
    assert!(session_cookie.contains("SameSite=Lax"));
    assert!(session_cookie.contains("Max-Age=0"));
    assert!(!session_cookie.contains("Secure"));
    assert!(!session_cookie.contains("Domain="));
}

#[tokio::test]
async fn test_logout_cookie_removal_production_attributes() {
    let config = Config {
        api_url: "https://api.trendboard.example".to_string(),
        frontend_url: "https://trendboard.example".to_string(),
        ..Config::test_default()
    };
    let app = common::create_test_app_with_config(config).await;

    let response = app.router.oneshot(logout_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookies = set_cookie_headers(&response);
    let session_cookie = find_cookie(&set_cookies, "trendboard_session");

    assert!(session_cookie.contains("Path=/"));
    assert!(session_cookie.contains("HttpOnly"));
    assert!(session_cookie.contains("SameSite=Lax"));
    assert!(session_cookie.contains("Max-Age=0"));
    assert!(session_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_logout_is_post_only() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(common::get("/auth/logout", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_auth_start_redirects_to_google() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(common::get(
            "/auth/google?redirect_uri=http://localhost:5173",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert!(location.contains("client_id=test-client-id.apps.googleusercontent.com"));
    assert!(location.contains(&format!(
        "redirect_uri={}",
        urlencoding::encode("http://localhost:8080/auth/google/callback")
    )));
    assert!(location.contains("state="));
}

#[tokio::test]
async fn test_callback_with_provider_error_redirects_to_frontend() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(common::get(
            "/auth/google/callback?error=access_denied&state=garbage",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    // Tampered state falls back to the configured frontend
    assert_eq!(location, "http://localhost:5173?error=access_denied");
    assert!(set_cookie_headers(&response).is_empty());
}

#[tokio::test]
async fn test_callback_without_code_is_400() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(common::get("/auth/google/callback?state=x", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_start_keeps_allowed_redirect() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(common::get(
            "/auth/google?redirect_uri=http://localhost:5173/admin",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(state_frontend_url(&response), "http://localhost:5173/admin");
}

#[tokio::test]
async fn test_auth_start_ignores_lookalike_redirect_hosts() {
    for redirect in [
        "http://localhost.evil.com/phish",
        "http://localhost@evil.com",
        "http://127.0.0.1.evil.com",
    ] {
        let app = common::create_test_app().await;

        let response = app
            .router
            .oneshot(common::get(
                &format!(
                    "/auth/google?redirect_uri={}",
                    urlencoding::encode(redirect)
                ),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            state_frontend_url(&response),
            "http://localhost:5173",
            "redirect_uri {redirect} should fall back to the frontend"
        );
    }
}
