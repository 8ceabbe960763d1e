//! Turns raw listing search options into a normalized query.
//!
//! Nothing here touches the database: the category filter is expanded against
//! an already-loaded [`CategoryTree`], paging is clamped, and the search text is
//! turned into an escaped `LIKE` pattern. `ListingService::search` executes the
//! result.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::category_tree::CategoryTree;
use sea_orm::DbBackend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortBy {
    Price,
    #[default]
    Date,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Caller-supplied search options, every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingQueryOptions {
    pub category_id: Option<i32>,
    pub search_term: Option<String>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Page size bounds applied while resolving options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl From<&AppConfig> for PageLimits {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            default_page_size: cfg.api_default_page_size,
            max_page_size: cfg.api_max_page_size,
        }
    }
}

/// A fully resolved listing search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// The requested category and all of its descendants; `None` means any category.
    pub category_ids: Option<BTreeSet<i32>>,
    /// Trimmed search text, case preserved.
    pub search: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: u64,
    pub page_size: u64,
}

impl ListingQuery {
    /// Normalizes `options`.
    ///
    /// `tree` is only consulted when a category filter is present, so callers
    /// may pass an empty tree otherwise. A category id missing from the tree
    /// still filters on that id alone.
    pub fn resolve(
        options: &ListingQueryOptions,
        tree: &CategoryTree,
        limits: PageLimits,
    ) -> Result<Self, ServiceError> {
        let category_ids = match options.category_id {
            Some(id) => Some(tree.descendants_inclusive_of_self(id)?),
            None => None,
        };

        let search = options
            .search_term
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);

        let page_size =
            clamp_positive(options.page_size, limits.default_page_size).min(limits.max_page_size.max(1));
        // keeps the row offset representable as a signed 64-bit bind value
        let max_page = i64::MAX as u64 / page_size + 1;
        let page = clamp_positive(options.page, DEFAULT_PAGE).min(max_page);

        Ok(Self {
            category_ids,
            search,
            sort_by: options.sort_by.unwrap_or_default(),
            sort_order: options.sort_order.unwrap_or_default(),
            page,
            page_size,
        })
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }

    /// `%term%` with LIKE wildcards in the term escaped by `\`, lowercased the
    /// way `lower()` lowercases the title on `backend`.
    ///
    /// SQLite's `lower()` only folds ASCII letters, so there the term is folded
    /// the same way and non-ASCII letters match case-sensitively.
    pub fn like_pattern(&self, backend: DbBackend) -> Option<String> {
        self.search.as_deref().map(|term| {
            let folded = match backend {
                DbBackend::Sqlite => term.to_ascii_lowercase(),
                _ => term.to_lowercase(),
            };
            format!("%{}%", escape_like(&folded))
        })
    }

    pub fn total_pages(&self, total_count: u64) -> u64 {
        if total_count == 0 {
            0
        } else {
            (total_count + self.page_size - 1) / self.page_size
        }
    }
}

fn clamp_positive(value: Option<i64>, default: u64) -> u64 {
    match value {
        Some(v) if v >= 1 => v as u64,
        Some(_) => 1,
        None => default,
    }
}

pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
