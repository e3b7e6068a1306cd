mod common;

use axum::http::StatusCode;
use common::{PASSWORD, PIXEL, TestApp, spawn_app, test_config};
use foodgram::db::NewUser;
use foodgram::entities::recipes;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

struct Kitchen {
    app: TestApp,
    tag: i32,
    flour: i32,
    sugar: i32,
}

async fn kitchen() -> Kitchen {
    let app = spawn_app().await;
    let tag = app.seed_tag("Baking", "baking").await;
    let flour = app.seed_ingredient("Flour", "g").await;
    let sugar = app.seed_ingredient("Sugar", "g").await;
    Kitchen {
        app,
        tag,
        flour,
        sugar,
    }
}

async fn login_staff(app: &TestApp) -> String {
    let security = test_config(&app.root).security;
    app.store
        .create_user(
            NewUser {
                email: "admin@example.org".to_string(),
                username: "admin".to_string(),
                first_name: "Site".to_string(),
                last_name: "Admin".to_string(),
                password: PASSWORD.to_string(),
                is_staff: true,
            },
            &security,
        )
        .await
        .unwrap();

    let response = app
        .post(
            "/api/auth/token/login",
            None,
            json!({ "email": "admin@example.org", "password": PASSWORD }),
        )
        .await;
    response.json()["auth_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_and_fetch_recipe() {
    let k = kitchen().await;
    let (author_id, token) = k.app.register_and_login("baker").await;

    let id = k
        .app
        .create_recipe(&token, "Shortbread", &[k.tag], &[(k.flour, 200), (k.sugar, 80)])
        .await;

    let response = k.app.get(&format!("/api/recipes/{id}"), None).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["name"], "Shortbread");
    assert_eq!(body["cooking_time"], 30);
    assert_eq!(body["author"]["id"], author_id);
    assert_eq!(body["tags"][0]["slug"], "baking");
    assert_eq!(body["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(body["is_favorited"], false);
    assert!(
        body["image"]
            .as_str()
            .unwrap()
            .starts_with("http://testserver/media/recipes/")
    );

    let response = k.app.get("/api/recipes/9999", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recipe_validation() {
    let k = kitchen().await;
    let (_, token) = k.app.register_and_login("baker").await;

    let base = json!({
        "name": "Broken",
        "text": "Nope",
        "cooking_time": 10,
        "image": PIXEL,
        "tags": [k.tag],
        "ingredients": [{ "id": k.flour, "amount": 0 }],
    });

    let response = k.app.post("/api/recipes", Some(&token), base.clone()).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["detail"].as_str().unwrap().contains("amount"));

    let mut negative = base.clone();
    negative["ingredients"] = json!([{ "id": k.flour, "amount": -5 }]);
    let response = k.app.post("/api/recipes", Some(&token), negative).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut duplicate = base.clone();
    duplicate["ingredients"] = json!([
        { "id": k.flour, "amount": 1 },
        { "id": k.flour, "amount": 2 },
    ]);
    let response = k.app.post("/api/recipes", Some(&token), duplicate).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut no_tags = base.clone();
    no_tags["ingredients"] = json!([{ "id": k.flour, "amount": 1 }]);
    no_tags["tags"] = json!([]);
    let response = k.app.post("/api/recipes", Some(&token), no_tags).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut unknown = base.clone();
    unknown["ingredients"] = json!([{ "id": 4242, "amount": 1 }]);
    let response = k.app.post("/api/recipes", Some(&token), unknown).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut too_fast = base.clone();
    too_fast["ingredients"] = json!([{ "id": k.flour, "amount": 1 }]);
    too_fast["cooking_time"] = json!(0);
    let response = k.app.post("/api/recipes", Some(&token), too_fast).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut bad_image = base.clone();
    bad_image["ingredients"] = json!([{ "id": k.flour, "amount": 1 }]);
    bad_image["image"] = json!("not-an-image");
    let response = k.app.post("/api/recipes", Some(&token), bad_image).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // Nothing above was persisted.
    let response = k.app.get("/api/recipes", None).await;
    assert_eq!(response.json()["count"], 0);

    let response = k.app.post("/api/recipes", None, base).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_only_author_or_staff_may_change_recipe() {
    let k = kitchen().await;
    let (_, author) = k.app.register_and_login("author").await;
    let (_, stranger) = k.app.register_and_login("stranger").await;
    let id = k
        .app
        .create_recipe(&author, "Bread", &[k.tag], &[(k.flour, 500)])
        .await;
    let uri = format!("/api/recipes/{id}");

    let update = json!({
        "name": "Better bread",
        "tags": [k.tag],
        "ingredients": [{ "id": k.flour, "amount": 450 }, { "id": k.sugar, "amount": 10 }],
    });

    let response = k.app.send("PATCH", &uri, None, Some(update.clone())).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = k
        .app
        .send("PATCH", &uri, Some(&stranger), Some(update.clone()))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = k.app.delete(&uri, Some(&stranger)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = k
        .app
        .send("PATCH", &uri, Some(&author), Some(json!({ "name": "No sets" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = k
        .app
        .send("PATCH", &uri, Some(&author), Some(update))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    let body = response.json();
    assert_eq!(body["name"], "Better bread");
    assert_eq!(body["text"], "Mix everything and bake.");
    let amounts: Vec<i64> = body["ingredients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts.len(), 2);
    assert!(amounts.contains(&450));
    assert!(!amounts.contains(&500));

    let staff = login_staff(&k.app).await;
    let response = k.app.delete(&uri, Some(&staff)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = k.app.get(&uri, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_short_links() {
    let k = kitchen().await;
    let (_, token) = k.app.register_and_login("baker").await;
    let first = k
        .app
        .create_recipe(&token, "Scones", &[k.tag], &[(k.flour, 250)])
        .await;
    let second = k
        .app
        .create_recipe(&token, "Muffins", &[k.tag], &[(k.flour, 300)])
        .await;

    let uri = format!("/api/recipes/{first}/get-link");
    let link = k.app.get(&uri, None).await.json()["short-link"]
        .as_str()
        .unwrap()
        .to_string();
    let again = k.app.get(&uri, None).await.json()["short-link"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(link, again);

    let code = link.strip_prefix("http://testserver/s/").unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

    let other = k
        .app
        .get(&format!("/api/recipes/{second}/get-link"), None)
        .await
        .json()["short-link"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(link, other);

    let response = k.app.get(&format!("/s/{code}"), None).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        response.header("location"),
        Some(format!("/recipes/{first}/").as_str())
    );

    let response = k.app.get("/s/zzzzzz", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = k.app.get("/api/recipes/9999/get-link", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

async fn set_short_link(app: &TestApp, recipe: i64, code: Option<&str>) {
    recipes::Entity::update_many()
        .col_expr(
            recipes::Column::ShortLink,
            Expr::value(code.map(str::to_string)),
        )
        .filter(recipes::Column::Id.eq(recipe))
        .exec(&app.store.conn)
        .await
        .unwrap();
}

async fn stored_short_link(app: &TestApp, recipe: i64) -> Option<String> {
    recipes::Entity::find_by_id(i32::try_from(recipe).unwrap())
        .one(&app.store.conn)
        .await
        .unwrap()
        .unwrap()
        .short_link
}

#[tokio::test]
async fn test_short_link_assigned_on_first_request() {
    let k = kitchen().await;
    let (_, token) = k.app.register_and_login("baker").await;
    let recipe = k
        .app
        .create_recipe(&token, "Bread", &[k.tag], &[(k.flour, 500)])
        .await;

    set_short_link(&k.app, recipe, None).await;
    assert_eq!(stored_short_link(&k.app, recipe).await, None);

    let uri = format!("/api/recipes/{recipe}/get-link");
    let response = k.app.get(&uri, None).await;
    assert_eq!(response.status, StatusCode::OK);
    let link = response.json()["short-link"].as_str().unwrap().to_string();
    let again = k.app.get(&uri, None).await.json()["short-link"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(link, again);

    let code = link.strip_prefix("http://testserver/s/").unwrap();
    assert_eq!(stored_short_link(&k.app, recipe).await.as_deref(), Some(code));

    let response = k.app.get(&format!("/s/{code}"), None).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_short_links_of_other_lengths_still_resolve() {
    let k = kitchen().await;
    let (_, token) = k.app.register_and_login("baker").await;
    let recipe = k
        .app
        .create_recipe(&token, "Pie", &[k.tag], &[(k.flour, 200)])
        .await;

    set_short_link(&k.app, recipe, Some("Legacy2024")).await;

    let response = k.app.get("/s/Legacy2024", None).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        response.header("location"),
        Some(format!("/recipes/{recipe}/").as_str())
    );

    let response = k.app.get("/s/not-a-code", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_favorites_and_filters() {
    let k = kitchen().await;
    let (author_id, author) = k.app.register_and_login("author").await;
    let (_, fan) = k.app.register_and_login("fan").await;
    let other_tag = k.app.seed_tag("Quick", "quick").await;

    let cake = k
        .app
        .create_recipe(&author, "Cake", &[k.tag], &[(k.flour, 300)])
        .await;
    let salad = k
        .app
        .create_recipe(&author, "Salad", &[other_tag], &[(k.sugar, 5)])
        .await;

    let uri = format!("/api/recipes/{cake}/favorite");
    let response = k.app.post(&uri, Some(&fan), json!({})).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["name"], "Cake");

    let response = k.app.post(&uri, Some(&fan), json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = k.app.get("/api/recipes?is_favorited=1", Some(&fan)).await;
    let body = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], cake);
    assert_eq!(body["results"][0]["is_favorited"], true);

    let response = k.app.get("/api/recipes?is_favorited=0", Some(&fan)).await;
    let body = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], salad);
    assert_eq!(body["results"][0]["is_favorited"], false);

    let response = k
        .app
        .get("/api/recipes?is_favorited=0&is_in_shopping_cart=0", Some(&fan))
        .await;
    assert_eq!(response.json()["count"], 1);

    // Anonymous viewers cannot filter by their own collections.
    let response = k.app.get("/api/recipes?is_favorited=1", None).await;
    assert_eq!(response.json()["count"], 2);
    let response = k.app.get("/api/recipes?is_favorited=0", None).await;
    assert_eq!(response.json()["count"], 2);

    let response = k.app.get("/api/recipes?tags=quick", None).await;
    assert_eq!(response.json()["count"], 1);
    assert_eq!(response.json()["results"][0]["id"], salad);

    let response = k
        .app
        .get("/api/recipes?tags=quick&tags=baking", None)
        .await;
    assert_eq!(response.json()["count"], 2);

    let response = k
        .app
        .get(&format!("/api/recipes?author={author_id}"), None)
        .await;
    let body = response.json();
    assert_eq!(body["count"], 2);
    // Newest first.
    assert_eq!(body["results"][0]["id"], salad);

    let response = k.app.delete(&uri, Some(&fan)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = k.app.delete(&uri, Some(&fan)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shopping_cart_download_sums_amounts() {
    let k = kitchen().await;
    let (_, token) = k.app.register_and_login("shopper").await;
    let butter = k.app.seed_ingredient("Butter", "g").await;

    let first = k
        .app
        .create_recipe(&token, "Cookies", &[k.tag], &[(k.flour, 100), (butter, 20)])
        .await;
    let second = k
        .app
        .create_recipe(&token, "Crumble", &[k.tag], &[(k.flour, 50), (k.sugar, 30)])
        .await;

    for id in [first, second] {
        let response = k
            .app
            .post(&format!("/api/recipes/{id}/shopping_cart"), Some(&token), json!({}))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let response = k
        .app
        .post(&format!("/api/recipes/{first}/shopping_cart"), Some(&token), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = k
        .app
        .get("/api/recipes/download_shopping_cart", Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-type"),
        Some("text/csv; charset=utf-8")
    );
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"shopping_cart.csv\"")
    );
    assert_eq!(
        response.text(),
        "\u{feff}Ingredient,Amount,Measurement Unit\r\n\
         Butter,20,g\r\n\
         Flour,150,g\r\n\
         Sugar,30,g\r\n"
    );

    let response = k
        .app
        .get("/api/recipes/download_shopping_cart?format=txt", Some(&token))
        .await;
    assert_eq!(
        response.text(),
        "Shopping list\nButter (g): 20\nFlour (g): 150\nSugar (g): 30\n"
    );

    let response = k
        .app
        .get("/api/recipes/download_shopping_cart?format=pdf", Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = k
        .app
        .get("/api/recipes/download_shopping_cart", None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_cart_downloads_header_only() {
    let k = kitchen().await;
    let (_, token) = k.app.register_and_login("shopper").await;

    let response = k
        .app
        .get("/api/recipes/download_shopping_cart", Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.text(),
        "\u{feff}Ingredient,Amount,Measurement Unit\r\n"
    );

    let cake = k
        .app
        .create_recipe(&token, "Cake", &[k.tag], &[(k.flour, 300)])
        .await;
    let uri = format!("/api/recipes/{cake}/shopping_cart");
    k.app.post(&uri, Some(&token), json!({})).await;

    let response = k.app.delete(&uri, Some(&token)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = k.app.delete(&uri, Some(&token)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = k
        .app
        .get("/api/recipes/download_shopping_cart", Some(&token))
        .await;
    assert_eq!(
        response.text(),
        "\u{feff}Ingredient,Amount,Measurement Unit\r\n"
    );
}

#[tokio::test]
async fn test_deleted_recipe_leaves_carts() {
    let k = kitchen().await;
    let (_, author) = k.app.register_and_login("author").await;
    let (_, shopper) = k.app.register_and_login("shopper").await;

    let id = k
        .app
        .create_recipe(&author, "Pancakes", &[k.tag], &[(k.flour, 120)])
        .await;
    k.app
        .post(&format!("/api/recipes/{id}/shopping_cart"), Some(&shopper), json!({}))
        .await;

    let response = k.app.delete(&format!("/api/recipes/{id}"), Some(&author)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = k
        .app
        .get("/api/recipes/download_shopping_cart", Some(&shopper))
        .await;
    assert_eq!(
        response.text(),
        "\u{feff}Ingredient,Amount,Measurement Unit\r\n"
    );
}
