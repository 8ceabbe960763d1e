use crate::{
    entities::{listing, Category, Listing, ListingModel, ListingStatus},
    errors::ServiceError,
    services::{
        categories::load_tree,
        category_tree::CategoryTree,
        listing_filter::{ListingQuery, ListingQueryOptions, PageLimits, SortBy, SortOrder},
    },
};
use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const MAX_TITLE_LENGTH: usize = 200;

#[derive(Clone)]
pub struct ListingService {
    db: Arc<DatabaseConnection>,
    limits: PageLimits,
}

impl ListingService {
    pub fn new(db: Arc<DatabaseConnection>, limits: PageLimits) -> Self {
        Self { db, limits }
    }

    /// Browse/search listings.
    ///
    /// A category filter matches the category and everything below it. Draft
    /// and removed listings never appear. Results are ordered by the requested
    /// key with ties broken by id. A page past the end comes back empty with
    /// the real `total_count`.
    #[instrument(skip(self))]
    pub async fn search(&self, options: ListingQueryOptions) -> Result<ListingPage, ServiceError> {
        let started = std::time::Instant::now();

        let tree = match options.category_id {
            Some(_) => load_tree(&*self.db).await?,
            None => CategoryTree::default(),
        };
        let query = ListingQuery::resolve(&options, &tree, self.limits)?;
        debug!(?query, "Resolved listing query");

        let mut select = Listing::find()
            .filter(listing::Column::Status.is_not_in(ListingStatus::EXCLUDED_FROM_BROWSE));

        if let Some(ids) = &query.category_ids {
            select = select.filter(listing::Column::CategoryId.is_in(ids.iter().copied()));
        }

        if let Some(pattern) = query.like_pattern(self.db.get_database_backend()) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(listing::Column::Title)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }

        let total_count = select.clone().count(&*self.db).await?;
        let page_of = |listings: Vec<ListingModel>| ListingPage {
            listings,
            total_count,
            page: query.page,
            page_size: query.page_size,
            total_pages: query.total_pages(total_count),
        };

        if query.offset() >= total_count {
            debug!(offset = query.offset(), total_count, "Requested page is past the end");
            histogram!("marketplace.listings.search.duration", started.elapsed());
            return Ok(page_of(Vec::new()));
        }

        let sort_column = match query.sort_by {
            SortBy::Price => listing::Column::Price,
            SortBy::Date => listing::Column::CreatedAt,
        };
        let order = match query.sort_order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };

        let listings = select
            .order_by(sort_column, order)
            .order_by_asc(listing::Column::Id)
            .offset(query.offset())
            .limit(query.limit())
            .all(&*self.db)
            .await?;

        histogram!("marketplace.listings.search.duration", started.elapsed());

        Ok(page_of(listings))
    }

    #[instrument(skip(self))]
    pub async fn get_listing(&self, id: i32) -> Result<ListingModel, ServiceError> {
        Listing::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::listing_not_found(id))
    }

    #[instrument(skip(self))]
    pub async fn create_listing(
        &self,
        input: CreateListingInput,
    ) -> Result<ListingModel, ServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::ValidationError(
                "Listing title cannot be blank".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(ServiceError::ValidationError(format!(
                "Listing title cannot exceed {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price cannot be negative".to_string(),
            ));
        }
        if let Some(category_id) = input.category_id {
            if Category::find_by_id(category_id).one(&*self.db).await?.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    category_id
                )));
            }
        }

        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let now = Utc::now();
        let model = listing::ActiveModel {
            title: Set(title),
            description: Set(description),
            price: Set(input.price),
            status: Set(input.status.unwrap_or(ListingStatus::Active)),
            category_id: Set(input.category_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await?;

        counter!("marketplace.listings.created", 1);
        info!(listing_id = created.id, category_id = ?created.category_id, "Created listing");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_listing_status(
        &self,
        id: i32,
        status: ListingStatus,
    ) -> Result<ListingModel, ServiceError> {
        let existing = self.get_listing(id).await?;
        let previous = existing.status;

        let mut active: listing::ActiveModel = existing.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(listing_id = id, from = %previous, to = %status, "Updated listing status");
        Ok(updated)
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct ListingPage {
    pub listings: Vec<ListingModel>,
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListingInput {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category_id: Option<i32>,
    pub status: Option<ListingStatus>,
}
