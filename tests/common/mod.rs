#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use foodgram::config::Config;
use foodgram::db::Store;
use foodgram::domain::short_link::ShortLinkGenerator;
use foodgram::state::SharedState;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// 1x1 transparent PNG.
pub const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub store: Store,
    pub root: std::path::PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", root.join("foodgram.db").display());
    config.general.media_path = root.join("media").display().to_string();
    config.server.public_url = "http://testserver".to_string();
    config.server.secure_cookies = false;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config
}

pub async fn spawn_app() -> TestApp {
    let root = std::env::temp_dir().join(format!("foodgram-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();

    let config = test_config(&root);
    let shared = SharedState::with_short_links(config, ShortLinkGenerator::from_seed(42))
        .await
        .expect("Failed to create app state");
    let store = shared.store.clone();

    let state = foodgram::api::create_app_state(Arc::new(shared), None);
    let router = foodgram::api::router(state);

    TestApp {
        router,
        store,
        root,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

async fn collect(response: Response<Body>) -> TestResponse {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Token {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        collect(self.router.clone().oneshot(request).await.unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("GET", uri, token, None).await
    }

    pub async fn get_with_header(&self, uri: &str, name: &str, value: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .header(name, value)
            .body(Body::empty())
            .unwrap();
        collect(self.router.clone().oneshot(request).await.unwrap()).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("DELETE", uri, token, None).await
    }

    /// Registers `name` and returns `(user_id, token)`.
    pub async fn register_and_login(&self, name: &str) -> (i64, String) {
        let email = format!("{name}@example.org");
        let response = self
            .post(
                "/api/users",
                None,
                json!({
                    "email": email,
                    "username": name,
                    "first_name": "Test",
                    "last_name": "Cook",
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        let id = response.json()["id"].as_i64().unwrap();

        let response = self
            .post(
                "/api/auth/token/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        let token = response.json()["auth_token"].as_str().unwrap().to_string();

        (id, token)
    }

    pub async fn seed_tag(&self, name: &str, slug: &str) -> i32 {
        self.store.create_tag(name, slug).await.unwrap().unwrap().id
    }

    pub async fn seed_ingredient(&self, name: &str, unit: &str) -> i32 {
        assert!(
            self.store
                .insert_ingredient_if_missing(name, unit)
                .await
                .unwrap()
        );
        self.store
            .list_ingredients(Some(name))
            .await
            .unwrap()
            .into_iter()
            .find(|i| i.name == name && i.measurement_unit == unit)
            .unwrap()
            .id
    }

    /// Creates a recipe and returns its id.
    pub async fn create_recipe(
        &self,
        token: &str,
        name: &str,
        tags: &[i32],
        ingredients: &[(i32, i32)],
    ) -> i64 {
        let ingredients: Vec<Value> = ingredients
            .iter()
            .map(|(id, amount)| json!({ "id": id, "amount": amount }))
            .collect();

        let response = self
            .post(
                "/api/recipes",
                Some(token),
                json!({
                    "name": name,
                    "text": "Mix everything and bake.",
                    "cooking_time": 30,
                    "image": PIXEL,
                    "tags": tags,
                    "ingredients": ingredients,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()["id"].as_i64().unwrap()
    }
}
