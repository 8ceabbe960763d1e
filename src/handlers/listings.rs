use crate::handlers::common::{
    created_response, map_service_error, parse_choice, success_response, validate_input,
};
use crate::{
    entities::ListingStatus,
    errors::ApiError,
    services::{listings::CreateListingInput, ListingQueryOptions, SortBy, SortOrder},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

/// Creates the router for listing endpoints
pub fn listings_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(search_listings).post(create_listing))
        .route("/:id", get(get_listing))
        .route("/:id/status", put(update_listing_status))
}

fn validate_decimal_min_zero(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("decimal_min_zero"));
    }
    Ok(())
}

/// Query string accepted by `GET /listings`
#[derive(Debug, Default, Deserialize)]
pub struct ListingSearchParams {
    pub category_id: Option<i32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListingSearchParams {
    fn into_options(self) -> Result<ListingQueryOptions, ApiError> {
        Ok(ListingQueryOptions {
            category_id: self.category_id,
            search_term: self.search,
            sort_by: parse_choice::<SortBy>(self.sort_by.as_deref(), "sort_by", "price, date")?,
            sort_order: parse_choice::<SortOrder>(
                self.sort_order.as_deref(),
                "sort_order",
                "asc, desc",
            )?,
            page: self.page,
            page_size: self.page_size,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateListingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Decimal,
    #[serde(default)]
    pub category_id: Option<i32>,
    #[serde(default)]
    pub status: Option<ListingStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingStatusRequest {
    pub status: ListingStatus,
}

async fn search_listings(
    State(state): State<AppState>,
    Query(params): Query<ListingSearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let options = params.into_options()?;

    let page = state
        .services
        .listings
        .search(options)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state
        .services
        .listings
        .get_listing(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(listing))
}

async fn create_listing(
    State(state): State<AppState>,
    Json(payload): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let CreateListingRequest {
        title,
        description,
        price,
        category_id,
        status,
    } = payload;

    let listing = state
        .services
        .listings
        .create_listing(CreateListingInput {
            title,
            description,
            price,
            category_id,
            status,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(listing))
}

async fn update_listing_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateListingStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state
        .services
        .listings
        .update_listing_status(id, payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(listing))
}
