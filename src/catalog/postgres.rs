/// PostgreSQL-backed implementation of CatalogStore
///
/// Uses sqlx with PgPool for connection pooling. Supports optional migration
/// execution on startup. The same pool is shared with the pgvector index.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions, PgRow},
    Row,
};

use crate::catalog::{CatalogItem, CatalogStore};
use crate::errors::BookrecError;

/// PostgreSQL-backed catalog store using a sqlx connection pool.
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Connect to the PostgreSQL database at database_url.
    ///
    /// Configures a production-ready connection pool with sensible defaults.
    /// If run_migrations is true, automatically runs pending migrations.
    pub async fn connect(database_url: &str, run_migrations: bool) -> Result<Self, BookrecError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await
            .map_err(|e| BookrecError::Storage(format!("Failed to connect to database: {}", e)))?;

        if run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| BookrecError::Storage(format!("Migration failed: {}", e)))?;
        }

        Ok(PostgresCatalogStore { pool })
    }

    /// Clone of the underlying pool, for collaborators sharing the database
    /// (the pgvector index reads book_embeddings from the same instance).
    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}

const ITEM_COLUMNS: &str =
    "id, isbn, title, author, publisher, description, cover_url, rating, category, page_count";

/// Map a sqlx PgRow to a CatalogItem.
fn row_to_item(row: &PgRow) -> Result<CatalogItem, BookrecError> {
    Ok(CatalogItem {
        id: row.try_get("id").map_err(|e| BookrecError::Storage(e.to_string()))?,
        isbn: row.try_get("isbn").map_err(|e| BookrecError::Storage(e.to_string()))?,
        title: row.try_get("title").map_err(|e| BookrecError::Storage(e.to_string()))?,
        author: row.try_get("author").map_err(|e| BookrecError::Storage(e.to_string()))?,
        publisher: row.try_get("publisher").map_err(|e| BookrecError::Storage(e.to_string()))?,
        description: row.try_get("description").map_err(|e| BookrecError::Storage(e.to_string()))?,
        cover_url: row.try_get("cover_url").map_err(|e| BookrecError::Storage(e.to_string()))?,
        rating: row.try_get("rating").map_err(|e| BookrecError::Storage(e.to_string()))?,
        category: row.try_get("category").map_err(|e| BookrecError::Storage(e.to_string()))?,
        page_count: row.try_get("page_count").map_err(|e| BookrecError::Storage(e.to_string()))?,
    })
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn items_by_rating_desc(
        &self,
        exclude_ids: &HashSet<i64>,
        limit: u32,
    ) -> Result<Vec<CatalogItem>, BookrecError> {
        let exclude: Vec<i64> = exclude_ids.iter().copied().collect();
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM books \
             WHERE id <> ALL($1) \
             ORDER BY COALESCE(rating, 0) DESC, id DESC \
             LIMIT $2",
        ))
        .bind(&exclude)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BookrecError::Storage(format!("Rating scan failed: {}", e)))?;

        rows.iter().map(row_to_item).collect()
    }

    async fn items_by_id(&self, ids: &[i64]) -> Result<Vec<CatalogItem>, BookrecError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM books WHERE id = ANY($1)",
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BookrecError::Storage(format!("Id lookup failed: {}", e)))?;

        rows.iter().map(row_to_item).collect()
    }

    async fn items_matching_text(
        &self,
        terms: &[String],
        limit: u32,
    ) -> Result<Vec<CatalogItem>, BookrecError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        // Single array bind: a row matches when any term appears in the title
        // or description, case-insensitively.
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM books b \
             WHERE EXISTS (\
                 SELECT 1 FROM unnest($1::text[]) AS t(term) \
                 WHERE b.title ILIKE '%' || t.term || '%' \
                    OR b.description ILIKE '%' || t.term || '%'\
             ) \
             ORDER BY COALESCE(b.rating, 0) DESC, b.id DESC \
             LIMIT $2",
        ))
        .bind(terms)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BookrecError::Storage(format!("Keyword match failed: {}", e)))?;

        rows.iter().map(row_to_item).collect()
    }

    async fn shelf_counts(&self) -> Result<HashMap<i64, i64>, BookrecError> {
        let rows = sqlx::query("SELECT book_id, COUNT(*) AS cnt FROM bookshelf GROUP BY book_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BookrecError::Storage(format!("Shelf count query failed: {}", e)))?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("book_id").map_err(|e| BookrecError::Storage(e.to_string()))?;
            let cnt: i64 = row.try_get("cnt").map_err(|e| BookrecError::Storage(e.to_string()))?;
            counts.insert(id, cnt);
        }
        Ok(counts)
    }

    async fn positive_shelf_items(&self, user_id: i64) -> Result<Vec<CatalogItem>, BookrecError> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM books b \
             JOIN bookshelf s ON s.book_id = b.id \
             WHERE s.user_id = $1 AND s.status IN ('to_read', 'read') \
             ORDER BY b.id",
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BookrecError::Storage(format!("Shelf query failed: {}", e)))?;

        rows.iter().map(row_to_item).collect()
    }

    async fn dropped_shelf_authors(&self, user_id: i64) -> Result<HashSet<String>, BookrecError> {
        let rows = sqlx::query(
            "SELECT DISTINCT b.author FROM books b \
             JOIN bookshelf s ON s.book_id = b.id \
             WHERE s.user_id = $1 AND s.status = 'dropped' AND b.author IS NOT NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BookrecError::Storage(format!("Dropped author query failed: {}", e)))?;

        let mut authors = HashSet::new();
        for row in &rows {
            let author: String = row.try_get("author").map_err(|e| BookrecError::Storage(e.to_string()))?;
            let trimmed = author.trim();
            if !trimmed.is_empty() {
                authors.insert(trimmed.to_string());
            }
        }
        Ok(authors)
    }

    async fn not_interested_items(&self, user_id: i64) -> Result<HashSet<i64>, BookrecError> {
        let rows = sqlx::query(
            "SELECT book_id FROM user_preferences \
             WHERE user_id = $1 AND preference_type = 'not_interested'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BookrecError::Storage(format!("Preference query failed: {}", e)))?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in &rows {
            ids.insert(row.try_get::<i64, _>("book_id").map_err(|e| BookrecError::Storage(e.to_string()))?);
        }
        Ok(ids)
    }

    async fn interest_vector(&self, user_id: i64) -> Result<Option<Vec<f32>>, BookrecError> {
        let row = sqlx::query(
            "SELECT interest_vector FROM user_reading_profile WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BookrecError::Storage(format!("Reading profile query failed: {}", e)))?;

        match row {
            Some(row) => {
                let vector: Option<pgvector::Vector> = row
                    .try_get("interest_vector")
                    .map_err(|e| BookrecError::Storage(e.to_string()))?;
                Ok(vector.map(|v| v.to_vec()))
            }
            None => Ok(None),
        }
    }
}
