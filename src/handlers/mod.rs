pub mod categories;
pub mod common;
pub mod health;
pub mod listings;

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{CategoryService, ListingService, PageLimits},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<CategoryService>,
    pub listings: Arc<ListingService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        Self {
            categories: Arc::new(CategoryService::new(db_pool.clone())),
            listings: Arc::new(ListingService::new(db_pool, PageLimits::from(config))),
        }
    }
}
