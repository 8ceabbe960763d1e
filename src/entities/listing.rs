use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a listing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListingStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sold")]
    Sold,
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "removed")]
    Removed,
}

impl ListingStatus {
    /// Statuses never shown by browse/search queries.
    pub const EXCLUDED_FROM_BROWSE: [ListingStatus; 2] = [ListingStatus::Draft, ListingStatus::Removed];
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "listings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,

    pub status: ListingStatus,

    pub category_id: Option<i32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn draft_and_removed_are_hidden_from_browse() {
        let hidden = ListingStatus::EXCLUDED_FROM_BROWSE;
        assert!(hidden.contains(&ListingStatus::Draft));
        assert!(hidden.contains(&ListingStatus::Removed));
        assert!(!hidden.contains(&ListingStatus::Active));
        assert!(!hidden.contains(&ListingStatus::Pending));
        assert!(!hidden.contains(&ListingStatus::Sold));
    }

    #[test]
    fn status_round_trips_through_its_wire_name() {
        assert_eq!(ListingStatus::Sold.to_string(), "sold");
        assert_eq!(ListingStatus::from_str("removed").unwrap(), ListingStatus::Removed);
        assert!(ListingStatus::from_str("archived").is_err());
    }
}
