#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use marketplace_api::{
    config::AppConfig,
    db,
    entities::{listing, CategoryModel, ListingModel, ListingStatus},
    services::categories::CreateCategoryInput,
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // a second connection would open a second, empty in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = marketplace_api::app(state.clone());

        Self { router, state }
    }

    /// Send a request against the router, returning the status and decoded JSON body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is not json")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn seed_category(&self, name: &str, parent_id: Option<i32>) -> CategoryModel {
        self.state
            .services
            .categories
            .create_category(CreateCategoryInput {
                name: name.to_string(),
                parent_id,
            })
            .await
            .expect("seed category for tests")
    }

    /// Inserts a listing directly so tests control status and creation time.
    pub async fn seed_listing(
        &self,
        title: &str,
        price: Decimal,
        category_id: Option<i32>,
        status: ListingStatus,
        age_minutes: i64,
    ) -> ListingModel {
        let created_at = Utc::now() - Duration::minutes(age_minutes);
        listing::ActiveModel {
            title: Set(title.to_string()),
            description: Set(None),
            price: Set(price),
            status: Set(status),
            category_id: Set(category_id),
            created_at: Set(created_at),
            updated_at: Set(created_at),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed listing for tests")
    }
}

/// Ids of the listings in a search response body, in order.
pub fn listing_ids(body: &Value) -> Vec<i64> {
    body["listings"]
        .as_array()
        .expect("listings array")
        .iter()
        .map(|l| l["id"].as_i64().expect("listing id"))
        .collect()
}
