use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;

use auth_cell::router::auth_routes;
use shared_utils::state::AppState;
use shared_utils::test_utils::{json_request, response_json, TestConfig, TestUser, TEST_PASSWORD};

async fn create_test_app() -> (Router, Arc<AppState>) {
    let state = TestConfig::default().to_state().await;
    (auth_routes(state.clone()), state)
}

fn registration(username: &str, email: &str) -> serde_json::Value {
    json!({
        "username": username,
        "email": email,
        "password": "hunter22",
        "full_name": "Jane Doe",
        "phone": "555-0101",
        "date_of_birth": "1992-04-10",
        "blood_group": "A+"
    })
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, serde_json::Value) {
    let request = json_request(
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": username, "password": password })),
    );
    response_json(app.clone().oneshot(request).await.unwrap()).await
}

#[tokio::test]
async fn test_register_then_login_as_patient() {
    let (app, _) = create_test_app().await;

    let request = json_request(Method::POST, "/register", None, Some(registration("jane", "jane@example.com")));
    let (status, body) = response_json(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "patient");

    let (status, body) = login(&app, "jane", "hunter22").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["profile"]["blood_group"], "A+");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_missing_fields() {
    let (app, _) = create_test_app().await;

    let first = json_request(Method::POST, "/register", None, Some(registration("jane", "jane@example.com")));
    assert_eq!(app.clone().oneshot(first).await.unwrap().status(), StatusCode::CREATED);

    let same_username = json_request(Method::POST, "/register", None, Some(registration("jane", "other@example.com")));
    let (status, body) = response_json(app.clone().oneshot(same_username).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username already exists");

    let same_email = json_request(Method::POST, "/register", None, Some(registration("janet", "jane@example.com")));
    let (status, body) = response_json(app.clone().oneshot(same_email).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already exists");

    let missing_phone = json_request(
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "x", "email": "x@example.com", "password": "hunter22", "full_name": "X" })),
    );
    let (status, body) = response_json(app.oneshot(missing_phone).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "phone is required");
}

#[tokio::test]
async fn test_login_failures() {
    let (app, state) = create_test_app().await;
    let (user_id, _) = TestUser::patient(&state, "bob").await;

    let (status, body) = login(&app, "bob", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");

    let (status, _) = login(&app, "", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    state
        .store
        .transaction(|t| t.update_user(user_id, |u| u.is_active = false).map(|_| ()))
        .await
        .unwrap();
    let (status, body) = login(&app, "bob", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Your account has been deactivated. Please contact admin.");
}

#[tokio::test]
async fn test_me_requires_session_and_logout_ends_it() {
    let (app, state) = create_test_app().await;
    let (_, doctor_id) = TestUser::doctor(&state, "dr_grey", "Neurology").await;
    let doctor_user = state.store.read(|t| t.doctor(doctor_id).unwrap().user_id).await;
    let token = TestUser::token(&state, doctor_user).await;

    let unauthenticated = json_request(Method::GET, "/me", None, None);
    assert_eq!(app.clone().oneshot(unauthenticated).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let request = json_request(Method::GET, "/me", Some(&token), None);
    let (status, body) = response_json(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["profile"]["department"], "Neurology");

    let logout = json_request(Method::POST, "/logout", Some(&token), None);
    assert_eq!(app.clone().oneshot(logout).await.unwrap().status(), StatusCode::OK);

    let after = json_request(Method::GET, "/me", Some(&token), None);
    assert_eq!(app.oneshot(after).await.unwrap().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let (app, state) = create_test_app().await;
    let (user_id, _) = TestUser::patient(&state, "carol").await;
    let token = TestUser::token(&state, user_id).await;

    let wrong_old = json_request(
        Method::POST,
        "/change-password",
        Some(&token),
        Some(json!({ "old_password": "nope", "new_password": "newsecret" })),
    );
    assert_eq!(app.clone().oneshot(wrong_old).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let too_short = json_request(
        Method::POST,
        "/change-password",
        Some(&token),
        Some(json!({ "old_password": TEST_PASSWORD, "new_password": "123" })),
    );
    assert_eq!(app.clone().oneshot(too_short).await.unwrap().status(), StatusCode::BAD_REQUEST);

    let ok = json_request(
        Method::POST,
        "/change-password",
        Some(&token),
        Some(json!({ "old_password": TEST_PASSWORD, "new_password": "newsecret" })),
    );
    assert_eq!(app.clone().oneshot(ok).await.unwrap().status(), StatusCode::OK);

    let (status, _) = login(&app, "carol", "newsecret").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_profile_rejects_taken_email() {
    let (app, state) = create_test_app().await;
    let (user_id, _) = TestUser::patient(&state, "dave").await;
    TestUser::patient(&state, "erin").await;
    let token = TestUser::token(&state, user_id).await;

    let taken = json_request(
        Method::PUT,
        "/update-profile",
        Some(&token),
        Some(json!({ "email": "erin@hospital.test" })),
    );
    let (status, body) = response_json(app.clone().oneshot(taken).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already in use");

    let update = json_request(
        Method::PUT,
        "/update-profile",
        Some(&token),
        Some(json!({ "full_name": "Dave Updated", "allergies": "Penicillin" })),
    );
    let (status, body) = response_json(app.oneshot(update).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["full_name"], "Dave Updated");
    assert_eq!(body["user"]["profile"]["allergies"], "Penicillin");
}
