pub mod categories;
pub mod category_tree;
pub mod listing_filter;
pub mod listings;

pub use categories::CategoryService;
pub use category_tree::{CategoryNode, CategoryRecord, CategoryTree, PathSegment};
pub use listing_filter::{ListingQuery, ListingQueryOptions, PageLimits, SortBy, SortOrder};
pub use listings::{ListingPage, ListingService};
