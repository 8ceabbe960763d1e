mod common;

use axum::http::{Method, StatusCode};
use common::{listing_ids, TestApp};
use marketplace_api::entities::ListingStatus;
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn health_endpoints_respond() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "up");
}

#[tokio::test]
async fn category_crud_over_http() {
    let app = TestApp::new().await;

    let (status, root) = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Sports" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let root_id = root["id"].as_i64().unwrap();

    let (status, child) = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Cycling", "parent_id": root_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let child_id = child["id"].as_i64().unwrap();
    assert_eq!(child["parent_id"], root_id);

    let (status, path) = app.get(&format!("/api/v1/categories/{child_id}/path")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(path, json!([
        { "id": root_id, "name": "Sports" },
        { "id": child_id, "name": "Cycling" }
    ]));

    let (status, tree) = app.get("/api/v1/categories/tree").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree[0]["children"][0]["id"], child_id);

    let (status, list) = app.get("/api/v1/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/categories/{root_id}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .request(Method::DELETE, &format!("/api/v1/categories/{child_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, body) = app.get(&format!("/api/v1/categories/{child_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn cycle_errors_map_to_bad_request() {
    let app = TestApp::new().await;
    let a = app.seed_category("A", None).await;
    let b = app.seed_category("B", Some(a.id)).await;

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/categories/{}", a.id),
            Some(json!({ "parent_id": a.id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("its own parent"));

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/categories/{}", a.id),
            Some(json!({ "parent_id": b.id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("descendants"));

    // explicit null makes B a root
    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/categories/{}", b.id),
            Some(json!({ "parent_id": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["parent_id"].is_null());
}

#[tokio::test]
async fn invalid_category_payloads() {
    let app = TestApp::new().await;
    app.seed_category("Music", None).await;

    let (status, _) = app
        .request(Method::POST, "/api/v1/categories", Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Music" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/v1/categories/4040",
            Some(json!({ "name": "Nothing" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_search_over_http() {
    let app = TestApp::new().await;
    let home = app.seed_category("Home", None).await;
    let lamps = app.seed_category("Lamps", Some(home.id)).await;

    let floor = app
        .seed_listing("Floor Lamp", dec!(80), Some(lamps.id), ListingStatus::Active, 2)
        .await;
    let desk = app
        .seed_listing("Desk lamp", dec!(25), Some(lamps.id), ListingStatus::Active, 1)
        .await;
    app.seed_listing("Hidden lamp", dec!(10), Some(lamps.id), ListingStatus::Draft, 0)
        .await;

    let (status, body) = app
        .get(&format!(
            "/api/v1/listings?category_id={}&search=LAMP&sort_by=price&sort_order=asc",
            home.id
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 20);
    assert_eq!(listing_ids(&body), vec![desk.id as i64, floor.id as i64]);

    let (status, body) = app.get("/api/v1/listings?sort_by=popularity").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("sort_by"));

    let (status, body) = app.get("/api/v1/listings?page_size=1000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page_size"], 100);

    let (status, body) = app
        .get("/api/v1/listings?page=1000000000000000000&page_size=20")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);
    assert!(listing_ids(&body).is_empty());
}

#[tokio::test]
async fn duplicate_category_rename_is_a_conflict() {
    let app = TestApp::new().await;
    app.seed_category("Garden", None).await;
    let tools = app.seed_category("Tools", None).await;

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/categories/{}", tools.id),
            Some(json!({ "name": "Garden" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("Garden"));
}

#[tokio::test]
async fn listing_lifecycle_over_http() {
    let app = TestApp::new().await;
    let cat = app.seed_category("Tools", None).await;

    let (status, created) = app
        .request(
            Method::POST,
            "/api/v1/listings",
            Some(json!({
                "title": "Hammer",
                "price": "9.99",
                "category_id": cat.id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "active");
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = app.get(&format!("/api/v1/listings/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Hammer");

    let (status, updated) = app
        .request(
            Method::PUT,
            &format!("/api/v1/listings/{id}/status"),
            Some(json!({ "status": "sold" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "sold");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/listings",
            Some(json!({ "title": "Saw", "price": "-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/v1/listings/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/v1/categories/12345").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["request_id"].as_str().is_some());
}
