pub mod category;
pub mod listing;

pub use category::{Entity as Category, Model as CategoryModel};
pub use listing::{Entity as Listing, ListingStatus, Model as ListingModel};
