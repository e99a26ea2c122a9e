/// pgvector-backed implementation of VectorIndex
///
/// Book embeddings live in the same PostgreSQL instance as the catalog
/// (book_embeddings table, `vector` column). Search uses the cosine distance
/// operator `<=>`; reported distances are therefore in [0, 2].

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{VectorHit, VectorIndex, VectorIndexError};

pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    pub fn new(pool: PgPool) -> Self {
        PgVectorIndex { pool }
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn embeddings_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Vec<f32>>, VectorIndexError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT book_id, embedding FROM book_embeddings WHERE book_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VectorIndexError::Lookup(e.to_string()))?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row
                .try_get("book_id")
                .map_err(|e| VectorIndexError::Lookup(e.to_string()))?;
            let embedding: pgvector::Vector = row
                .try_get("embedding")
                .map_err(|e| VectorIndexError::Lookup(e.to_string()))?;
            out.insert(id, embedding.to_vec());
        }
        Ok(out)
    }

    async fn search_similar(
        &self,
        vector: &[f32],
        top_k: u32,
    ) -> Result<Vec<VectorHit>, VectorIndexError> {
        let query_vec = pgvector::Vector::from(vector.to_vec());

        let rows = sqlx::query(
            "SELECT book_id, (embedding <=> $1)::float8 AS distance \
             FROM book_embeddings \
             ORDER BY embedding <=> $1 \
             LIMIT $2",
        )
        .bind(&query_vec)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VectorIndexError::Search(e.to_string()))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let item_id: i64 = row
                .try_get("book_id")
                .map_err(|e| VectorIndexError::Search(e.to_string()))?;
            let distance: f64 = row
                .try_get("distance")
                .map_err(|e| VectorIndexError::Search(e.to_string()))?;
            hits.push(VectorHit { item_id, distance });
        }
        Ok(hits)
    }
}
