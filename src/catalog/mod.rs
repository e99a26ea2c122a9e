/// Catalog store abstraction layer
///
/// Provides the CatalogStore trait and associated types for the read paths the
/// recommendation engine needs: rating-ordered scans, id lookups, keyword
/// matching, shelf-derived popularity, and per-user shelf/preference state.
/// The trait abstraction enables multiple backends — currently PostgreSQL —
/// and in-memory mocks for engine tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::BookrecError;

pub mod postgres;

/// A catalog entry as the engine sees it. Immutable within a request.
///
/// `rating` is on a 0–10 scale when present. The embedding vector is stored
/// separately and reached through the vector index, never carried here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub isbn: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    /// Douban-style 0–10 rating, absent for unrated titles
    pub rating: Option<f64>,
    pub category: Option<String>,
    pub page_count: Option<i32>,
}

/// Read-side contract the engine requires from the catalog.
///
/// All implementations must be Send + Sync to support concurrent access.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Items ordered by rating descending (unrated treated as 0), id
    /// descending as tie-break, excluding the given ids. Bounded by `limit`.
    async fn items_by_rating_desc(
        &self,
        exclude_ids: &HashSet<i64>,
        limit: u32,
    ) -> Result<Vec<CatalogItem>, BookrecError>;

    /// Fetch items by id. Missing ids are silently absent from the result.
    async fn items_by_id(&self, ids: &[i64]) -> Result<Vec<CatalogItem>, BookrecError>;

    /// Items whose title or description contains any of the given terms,
    /// case-insensitively. Bounded by `limit`.
    async fn items_matching_text(
        &self,
        terms: &[String],
        limit: u32,
    ) -> Result<Vec<CatalogItem>, BookrecError>;

    /// How many shelves each item appears on — the popularity signal.
    async fn shelf_counts(&self) -> Result<HashMap<i64, i64>, BookrecError>;

    /// Items the user shelved positively (want-to-read or read).
    async fn positive_shelf_items(&self, user_id: i64) -> Result<Vec<CatalogItem>, BookrecError>;

    /// Authors of items the user explicitly abandoned.
    async fn dropped_shelf_authors(&self, user_id: i64) -> Result<HashSet<String>, BookrecError>;

    /// Item ids the user marked "not interested". Excluded from all retrieval.
    async fn not_interested_items(&self, user_id: i64) -> Result<HashSet<i64>, BookrecError>;

    /// Previously persisted aggregate interest vector for the user, if any.
    /// Used as the personalization seed when individual shelf embeddings are
    /// unavailable.
    async fn interest_vector(&self, user_id: i64) -> Result<Option<Vec<f32>>, BookrecError>;
}
