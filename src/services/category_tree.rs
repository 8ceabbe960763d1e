//! In-memory index over the flat category table.
//!
//! The whole table is loaded per request and indexed once (`id → record`,
//! `parent → children`). Path, descendant and validation queries then walk the
//! index instead of re-scanning the rows at every level.

use crate::entities::category;
use crate::errors::ServiceError;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

/// The fields of a category the hierarchy logic cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
}

impl CategoryRecord {
    pub fn new(id: i32, name: impl Into<String>, parent_id: Option<i32>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
        }
    }
}

impl From<category::Model> for CategoryRecord {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            parent_id: model.parent_id,
        }
    }
}

/// One breadcrumb step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSegment {
    pub id: i32,
    pub name: String,
}

/// A category with its subcategories attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
    pub children: Vec<CategoryNode>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    by_id: HashMap<i32, CategoryRecord>,
    children: HashMap<i32, Vec<i32>>,
    roots: Vec<i32>,
}

impl CategoryTree {
    pub fn from_models<I>(models: I) -> Self
    where
        I: IntoIterator<Item = category::Model>,
    {
        Self::from_records(models.into_iter().map(CategoryRecord::from))
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = CategoryRecord>,
    {
        let by_id: HashMap<i32, CategoryRecord> =
            records.into_iter().map(|record| (record.id, record)).collect();

        let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
        let mut roots = Vec::new();
        for record in by_id.values() {
            match record.parent_id {
                Some(parent_id) => {
                    children.entry(parent_id).or_default().push(record.id);
                    // a dangling parent reference still leaves the row reachable
                    if !by_id.contains_key(&parent_id) {
                        roots.push(record.id);
                    }
                }
                None => roots.push(record.id),
            }
        }

        let order = |ids: &mut Vec<i32>| {
            ids.sort_by(|a, b| {
                let (a, b) = (&by_id[a], &by_id[b]);
                a.name.cmp(&b.name).then(a.id.cmp(&b.id))
            })
        };
        order(&mut roots);
        for ids in children.values_mut() {
            order(ids);
        }

        Self {
            by_id,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: i32) -> Option<&CategoryRecord> {
        self.by_id.get(&id)
    }

    /// Direct children of `id`, ordered by name.
    pub fn children_of(&self, id: i32) -> &[i32] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Root-to-leaf breadcrumb ending at `id`.
    ///
    /// Unknown ids yield an empty path. Every id is visited at most once, so a
    /// cycle in stored data surfaces as `CorruptHierarchy` instead of looping.
    pub fn resolve_path(&self, id: i32) -> Result<Vec<PathSegment>, ServiceError> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id);

        while let Some(current_id) = current {
            let Some(record) = self.by_id.get(&current_id) else {
                break;
            };
            if !visited.insert(current_id) {
                return Err(ServiceError::CorruptHierarchy(current_id));
            }
            path.push(PathSegment {
                id: record.id,
                name: record.name.clone(),
            });
            current = record.parent_id;
        }

        path.reverse();
        Ok(path)
    }

    /// Every category below `id`, not including `id`.
    pub fn descendants_exclusive_of_self(&self, id: i32) -> Result<BTreeSet<i32>, ServiceError> {
        let mut found = BTreeSet::new();
        let mut stack: Vec<i32> = self.children_of(id).to_vec();

        while let Some(next) = stack.pop() {
            // single-parent rows never meet twice unless the links loop
            if next == id || !found.insert(next) {
                return Err(ServiceError::CorruptHierarchy(next));
            }
            stack.extend_from_slice(self.children_of(next));
        }

        Ok(found)
    }

    /// `id` together with every category below it.
    ///
    /// Used both for "which parents would create a cycle" and for expanding a
    /// listing category filter.
    pub fn descendants_inclusive_of_self(&self, id: i32) -> Result<BTreeSet<i32>, ServiceError> {
        let mut ids = self.descendants_exclusive_of_self(id)?;
        ids.insert(id);
        Ok(ids)
    }

    /// Checks that re-parenting `category_id` under `proposed_parent_id` keeps the hierarchy acyclic.
    pub fn validate_no_cycle(
        &self,
        category_id: i32,
        proposed_parent_id: Option<i32>,
    ) -> Result<(), ServiceError> {
        let Some(parent_id) = proposed_parent_id else {
            return Ok(());
        };

        if parent_id == category_id {
            return Err(ServiceError::SelfParent(category_id));
        }

        if self
            .descendants_inclusive_of_self(category_id)?
            .contains(&parent_id)
        {
            return Err(ServiceError::CircularReference {
                category_id,
                parent_id,
            });
        }

        Ok(())
    }

    /// Checks that `category_id` may be deleted given how many listings reference it.
    ///
    /// Subcategories are checked first so a category with children always
    /// reports `HasSubcategories`.
    pub fn validate_deletable(&self, category_id: i32, listing_count: u64) -> Result<(), ServiceError> {
        if !self.children_of(category_id).is_empty() {
            return Err(ServiceError::HasSubcategories(category_id));
        }
        if listing_count > 0 {
            return Err(ServiceError::HasListings(category_id));
        }
        Ok(())
    }

    /// The hierarchy as nested nodes, roots and siblings ordered by name.
    ///
    /// Rows caught in a parent cycle have no root above them and are left out.
    pub fn forest(&self) -> Vec<CategoryNode> {
        self.roots.iter().map(|&id| self.build_node(id)).collect()
    }

    fn build_node(&self, id: i32) -> CategoryNode {
        let record = &self.by_id[&id];
        CategoryNode {
            id,
            name: record.name.clone(),
            parent_id: record.parent_id,
            children: self
                .children_of(id)
                .iter()
                .map(|&child| self.build_node(child))
                .collect(),
        }
    }
}
