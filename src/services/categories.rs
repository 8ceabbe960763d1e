use crate::{
    db::with_serializable_transaction,
    entities::{category, listing, Category, CategoryModel, Listing},
    errors::ServiceError,
    services::category_tree::{CategoryNode, CategoryTree, PathSegment},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

pub const MAX_NAME_LENGTH: usize = 100;

/// Manages the category hierarchy.
///
/// Reads load the whole table into a [`CategoryTree`]. Writes that depend on the
/// hierarchy validate against a snapshot taken inside the same serializable
/// transaction they commit in.
#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All categories ordered by name.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::Name)
            .order_by_asc(category::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// The hierarchy as nested nodes.
    #[instrument(skip(self))]
    pub async fn category_tree(&self) -> Result<Vec<CategoryNode>, ServiceError> {
        Ok(load_tree(&*self.db).await?.forest())
    }

    #[instrument(skip(self))]
    pub async fn get_category(&self, id: i32) -> Result<CategoryModel, ServiceError> {
        Category::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::category_not_found(id))
    }

    /// Breadcrumb from the root down to `id`. Unknown ids give an empty path.
    #[instrument(skip(self))]
    pub async fn resolve_path(&self, id: i32) -> Result<Vec<PathSegment>, ServiceError> {
        load_tree(&*self.db).await?.resolve_path(id)
    }

    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        let name = normalize_name(&input.name)?;
        let parent_id = input.parent_id;

        let created = with_serializable_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                ensure_unique_name(txn, &name, None).await?;
                if let Some(parent_id) = parent_id {
                    ensure_parent_exists(txn, parent_id).await?;
                }

                let now = Utc::now();
                let model = category::ActiveModel {
                    name: Set(name.clone()),
                    parent_id: Set(parent_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                model
                    .insert(txn)
                    .await
                    .map_err(|err| duplicate_name(err, &name))
            })
        })
        .await?;

        counter!("marketplace.categories.created", 1);
        info!(category_id = created.id, name = %created.name, "Created category");
        Ok(created)
    }

    /// Renames and/or re-parents a category.
    ///
    /// A re-parent is rejected when the new parent is the category itself or
    /// one of its descendants.
    #[instrument(skip(self))]
    pub async fn update_category(
        &self,
        id: i32,
        input: UpdateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        let name = input.name.as_deref().map(normalize_name).transpose()?;
        let parent_id = input.parent_id;

        let updated = with_serializable_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                let existing = Category::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::category_not_found(id))?;

                let mut active: category::ActiveModel = existing.clone().into();

                if let Some(name) = &name {
                    if *name != existing.name {
                        ensure_unique_name(txn, name, Some(id)).await?;
                    }
                    active.name = Set(name.clone());
                }

                if let Some(parent_id) = parent_id {
                    let snapshot = load_tree(txn).await?;
                    snapshot.validate_no_cycle(id, parent_id)?;
                    if let Some(parent_id) = parent_id {
                        if !snapshot.contains(parent_id) {
                            return Err(missing_parent(parent_id));
                        }
                    }
                    active.parent_id = Set(parent_id);
                }

                active.updated_at = Set(Utc::now());
                let target_name = name.unwrap_or(existing.name);
                active
                    .update(txn)
                    .await
                    .map_err(|err| duplicate_name(err, &target_name))
            })
        })
        .await?;

        counter!("marketplace.categories.updated", 1);
        info!(category_id = id, parent_id = ?updated.parent_id, "Updated category");
        Ok(updated)
    }

    /// Deletes a leaf category that no listing references.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i32) -> Result<(), ServiceError> {
        with_serializable_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                Category::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::category_not_found(id))?;

                let snapshot = load_tree(txn).await?;
                let listing_count = Listing::find()
                    .filter(listing::Column::CategoryId.eq(id))
                    .count(txn)
                    .await?;
                snapshot.validate_deletable(id, listing_count)?;

                Category::delete_by_id(id).exec(txn).await?;
                Ok(())
            })
        })
        .await?;

        counter!("marketplace.categories.deleted", 1);
        info!(category_id = id, "Deleted category");
        Ok(())
    }
}

/// Loads every category and indexes it.
pub async fn load_tree<C: ConnectionTrait>(conn: &C) -> Result<CategoryTree, ServiceError> {
    let rows = Category::find().all(conn).await?;
    Ok(CategoryTree::from_models(rows))
}

/// Trims `raw` and checks it is a usable category name.
pub fn normalize_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "Category name cannot be blank".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ServiceError::ValidationError(format!(
            "Category name cannot exceed {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

async fn ensure_unique_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    exclude_id: Option<i32>,
) -> Result<(), ServiceError> {
    let mut query = Category::find().filter(category::Column::Name.eq(name));
    if let Some(id) = exclude_id {
        query = query.filter(category::Column::Id.ne(id));
    }

    if query.one(conn).await?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "Category '{}' already exists",
            name
        )));
    }
    Ok(())
}

async fn ensure_parent_exists<C: ConnectionTrait>(
    conn: &C,
    parent_id: i32,
) -> Result<(), ServiceError> {
    match Category::find_by_id(parent_id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(missing_parent(parent_id)),
    }
}

/// A concurrent writer can claim the name between the check and the write; the
/// unique index then rejects it and the caller still sees `Conflict`.
pub fn duplicate_name(err: DbErr, name: &str) -> ServiceError {
    ServiceError::conflict_on_unique_violation(err, || {
        format!("Category '{}' already exists", name)
    })
}

fn missing_parent(parent_id: i32) -> ServiceError {
    ServiceError::ValidationError(format!("Parent category {} does not exist", parent_id))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i32>,
}

/// Partial update. `parent_id` distinguishes "leave as is" (absent) from
/// "make root" (`null`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent_id: Option<Option<i32>>,
}

/// Maps a present field (even `null`) to `Some`, leaving `None` for absent ones.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
