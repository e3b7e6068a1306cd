mod common;

use axum::http::StatusCode;
use common::{PASSWORD, PIXEL, spawn_app};
use serde_json::json;

#[tokio::test]
async fn test_auth_endpoints() {
    let app = spawn_app().await;
    let (_, token) = app.register_and_login("anna").await;
    assert_eq!(token.len(), 40);

    let response = app.get("/api/users/me", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/api/users/me", Some("not-a-real-token")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/api/users/me", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["username"], "anna");
    assert!(response.json().get("password").is_none());

    let bearer = format!("Bearer {token}");
    let response = app
        .get_with_header("/api/users/me", "Authorization", &bearer)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .get_with_header("/api/users/me", "X-Api-Key", &token)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.post("/api/auth/token/logout", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = app.get("/api/users/me", Some(&token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = spawn_app().await;
    app.register_and_login("boris").await;

    let response = app
        .post(
            "/api/auth/token/login",
            None,
            json!({ "email": "boris@example.org", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json()["detail"],
        "Unable to log in with provided credentials"
    );

    let response = app
        .post(
            "/api/auth/token/login",
            None,
            json!({ "email": "nobody@example.org", "password": PASSWORD }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_reuses_existing_token() {
    let app = spawn_app().await;
    let (_, first) = app.register_and_login("clara").await;

    let response = app
        .post(
            "/api/auth/token/login",
            None,
            json!({ "email": "clara@example.org", "password": PASSWORD }),
        )
        .await;
    assert_eq!(response.json()["auth_token"], first.as_str());
}

#[tokio::test]
async fn test_registration_validation() {
    let app = spawn_app().await;
    app.register_and_login("dmitry").await;

    let duplicate_email = app
        .post(
            "/api/users",
            None,
            json!({
                "email": "dmitry@example.org",
                "username": "dmitry2",
                "first_name": "D",
                "last_name": "K",
                "password": PASSWORD,
            }),
        )
        .await;
    assert_eq!(duplicate_email.status, StatusCode::BAD_REQUEST);

    let bad_username = app
        .post(
            "/api/users",
            None,
            json!({
                "email": "other@example.org",
                "username": "has spaces",
                "first_name": "D",
                "last_name": "K",
                "password": PASSWORD,
            }),
        )
        .await;
    assert_eq!(bad_username.status, StatusCode::BAD_REQUEST);

    let short_password = app
        .post(
            "/api/users",
            None,
            json!({
                "email": "third@example.org",
                "username": "third",
                "first_name": "D",
                "last_name": "K",
                "password": "short",
            }),
        )
        .await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_list_is_paged() {
    let app = spawn_app().await;
    for name in ["u1", "u2", "u3"] {
        app.register_and_login(name).await;
    }

    let response = app.get("/api/users?limit=2", None).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["next"],
        "http://testserver/api/users?limit=2&page=2"
    );
    assert!(body["previous"].is_null());

    let response = app.get("/api/users?limit=2&page=2", None).await;
    let body = response.json();
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert!(body["next"].is_null());

    let response = app.get("/api/users?page=0", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_password() {
    let app = spawn_app().await;
    let (_, token) = app.register_and_login("elena").await;

    let response = app
        .post(
            "/api/users/set_password",
            Some(&token),
            json!({ "current_password": "wrong-one", "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post(
            "/api/users/set_password",
            Some(&token),
            json!({ "current_password": PASSWORD, "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = app
        .post(
            "/api/auth/token/login",
            None,
            json!({ "email": "elena@example.org", "password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_avatar_upload_and_removal() {
    let app = spawn_app().await;
    let (id, token) = app.register_and_login("fedor").await;

    let response = app
        .send(
            "PUT",
            "/api/users/me/avatar",
            Some(&token),
            Some(json!({ "avatar": PIXEL })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    let url = response.json()["avatar"].as_str().unwrap().to_string();
    assert!(url.starts_with("http://testserver/media/avatars/"));
    assert!(url.ends_with(".png"));

    let relative = url.trim_start_matches("http://testserver/media/");
    assert!(app.root.join("media").join(relative).exists());

    let response = app.get(&format!("/api/users/{id}"), None).await;
    assert_eq!(response.json()["avatar"], url.as_str());

    let response = app.delete("/api/users/me/avatar", Some(&token)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(!app.root.join("media").join(relative).exists());

    let response = app
        .send(
            "PUT",
            "/api/users/me/avatar",
            Some(&token),
            Some(json!({ "avatar": "data:text/plain;base64,aGk=" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscriptions() {
    let app = spawn_app().await;
    let (reader_id, reader) = app.register_and_login("reader").await;
    let (author_id, author) = app.register_and_login("author").await;

    let tag = app.seed_tag("Dinner", "dinner").await;
    let salt = app.seed_ingredient("salt", "g").await;
    for name in ["Soup", "Stew", "Pie"] {
        app.create_recipe(&author, name, &[tag], &[(salt, 5)]).await;
    }

    let response = app
        .post(&format!("/api/users/{reader_id}/subscribe"), Some(&reader), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["detail"], "You cannot subscribe to yourself");

    let response = app
        .post(
            &format!("/api/users/{author_id}/subscribe?recipes_limit=2"),
            Some(&reader),
            json!({}),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let body = response.json();
    assert_eq!(body["id"], author_id);
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["recipes_count"], 3);
    assert_eq!(body["recipes"].as_array().unwrap().len(), 2);

    let response = app
        .post(&format!("/api/users/{author_id}/subscribe"), Some(&reader), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.get(&format!("/api/users/{author_id}"), Some(&reader)).await;
    assert_eq!(response.json()["is_subscribed"], true);

    let response = app.get(&format!("/api/users/{author_id}"), None).await;
    assert_eq!(response.json()["is_subscribed"], false);

    let response = app.get("/api/users/subscriptions", Some(&reader)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["count"], 1);
    assert_eq!(response.json()["results"][0]["username"], "author");

    let response = app
        .delete(&format!("/api/users/{author_id}/subscribe"), Some(&reader))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = app
        .delete(&format!("/api/users/{author_id}/subscribe"), Some(&reader))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tags_and_ingredients() {
    let app = spawn_app().await;
    let breakfast = app.seed_tag("Breakfast", "breakfast").await;
    app.seed_tag("Lunch", "lunch").await;
    app.seed_ingredient("Sugar", "g").await;
    app.seed_ingredient("sunflower oil", "ml").await;
    app.seed_ingredient("Apple", "piece").await;

    let response = app.get("/api/tags", None).await;
    assert_eq!(response.json().as_array().unwrap().len(), 2);

    let response = app.get(&format!("/api/tags/{breakfast}"), None).await;
    assert_eq!(response.json()["slug"], "breakfast");

    let response = app.get("/api/tags/9999", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.get("/api/ingredients?name=su", None).await;
    let names: Vec<String> = response
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Sugar", "sunflower oil"]);
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let app = spawn_app().await;
    let response = app.get("/api/metrics", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
