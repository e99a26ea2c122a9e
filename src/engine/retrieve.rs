/// Candidate pool assembly
///
/// Builds the bounded candidate pool a ranking request scores. Two shapes:
/// the personalized pool (rating-ordered catalog scan unioned with a
/// nearest-neighbor search seeded from the user's shelf) and the query pool
/// (keyword-matched catalog rows unioned with a search seeded from the query
/// embedding).
///
/// Pool order is deterministic: scan/keyword rows first in their retrieval
/// order, then vector hits in ascending-distance order, deduplicated by id.
/// Vector-index failures degrade to the non-vector half of the pool; catalog
/// failures propagate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::catalog::{CatalogItem, CatalogStore};
use crate::config::EngineConfig;
use crate::engine::resilient::guard;
use crate::errors::BookrecError;
use crate::vector::{VectorHit, VectorIndex};

/// A scored-ready candidate pool.
pub struct CandidatePool {
    /// Deterministically ordered, deduplicated candidates
    pub items: Vec<CatalogItem>,
    /// Per-call-normalized similarity for items that came from (or matched
    /// ahead of) the vector search
    pub similarity: HashMap<i64, f64>,
    /// Whether a personalization seed actually contributed to this pool
    pub personalized: bool,
}

pub struct CandidateRetriever {
    catalog: Arc<dyn CatalogStore>,
    index: Arc<dyn VectorIndex>,
    config: EngineConfig,
}

impl CandidateRetriever {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        index: Arc<dyn VectorIndex>,
        config: EngineConfig,
    ) -> Self {
        CandidateRetriever {
            catalog,
            index,
            config,
        }
    }

    /// Pool for the personalized path.
    ///
    /// Always starts from the rating-ordered scan (excluding shelved and
    /// not-interested ids). When a seed vector can be derived from the shelf,
    /// nearest neighbors are appended and the pool is marked personalized.
    pub async fn personalized_pool(
        &self,
        user_id: i64,
        positive_ids: &[i64],
        excluded: &HashSet<i64>,
    ) -> Result<CandidatePool, BookrecError> {
        let mut exclusion: HashSet<i64> = excluded.clone();
        exclusion.extend(positive_ids.iter().copied());

        let base = self
            .catalog
            .items_by_rating_desc(&exclusion, self.config.pool_size)
            .await?;

        let seed = if positive_ids.is_empty() {
            None
        } else {
            self.seed_vector(user_id, positive_ids).await
        };

        let Some(seed) = seed else {
            return Ok(CandidatePool {
                items: base,
                similarity: HashMap::new(),
                personalized: false,
            });
        };

        let hits = guard(
            Duration::from_secs(self.config.search_timeout_secs),
            "shelf_vector_search",
            self.index.search_similar(&seed, self.config.shelf_top_k),
            Vec::new(),
        )
        .await
        .into_inner();

        let hits: Vec<VectorHit> = hits
            .into_iter()
            .filter(|h| !exclusion.contains(&h.item_id))
            .collect();
        let similarity = similarity_from_hits(&hits);

        let mut items = base;
        let mut seen: HashSet<i64> = items.iter().map(|b| b.id).collect();
        let hit_ids: Vec<i64> = hits.iter().map(|h| h.item_id).collect();
        let hit_items = self.items_in_order(&hit_ids).await?;
        for item in hit_items {
            if seen.insert(item.id) {
                items.push(item);
            }
        }

        debug!(
            user_id,
            pool = items.len(),
            vector_hits = hit_ids.len(),
            "assembled personalized pool"
        );

        Ok(CandidatePool {
            items,
            similarity,
            personalized: true,
        })
    }

    /// Pool for the query path.
    ///
    /// Keyword-matched rows come first and carry full similarity so the
    /// scorer treats a direct genre hit as a perfect semantic match; vector
    /// hits follow, ranked by keyword-match count with distance order
    /// breaking ties. Either half may be empty.
    pub async fn query_pool(
        &self,
        query_vector: Option<&[f32]>,
        match_terms: &[String],
        excluded: &HashSet<i64>,
    ) -> Result<CandidatePool, BookrecError> {
        let mut items: Vec<CatalogItem> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut similarity: HashMap<i64, f64> = HashMap::new();

        if !match_terms.is_empty() {
            let matched = self
                .catalog
                .items_matching_text(match_terms, self.config.genre_match_limit)
                .await?;
            for item in matched {
                if excluded.contains(&item.id) {
                    continue;
                }
                if seen.insert(item.id) {
                    similarity.insert(item.id, 1.0);
                    items.push(item);
                }
            }
        }

        if let Some(vector) = query_vector {
            let hits = guard(
                Duration::from_secs(self.config.search_timeout_secs),
                "query_vector_search",
                self.index.search_similar(vector, self.config.query_top_k),
                Vec::new(),
            )
            .await
            .into_inner();

            let hits: Vec<VectorHit> = hits
                .into_iter()
                .filter(|h| !excluded.contains(&h.item_id) && !seen.contains(&h.item_id))
                .collect();
            let vector_similarity = similarity_from_hits(&hits);
            let hit_ids: Vec<i64> = hits.iter().map(|h| h.item_id).collect();
            let mut hit_items = self.items_in_order(&hit_ids).await?;
            rank_by_keyword_matches(&mut hit_items, match_terms);
            for item in hit_items {
                if seen.insert(item.id) {
                    if let Some(&sim) = vector_similarity.get(&item.id) {
                        similarity.insert(item.id, sim);
                    }
                    items.push(item);
                }
            }
        }

        Ok(CandidatePool {
            items,
            similarity,
            personalized: true,
        })
    }

    /// Derive the personalization seed: average the shelf embeddings, or fall
    /// back to the persisted interest vector. Both sources may be missing.
    async fn seed_vector(&self, user_id: i64, positive_ids: &[i64]) -> Option<Vec<f32>> {
        let embeddings = guard(
            Duration::from_secs(self.config.search_timeout_secs),
            "shelf_embedding_lookup",
            self.index.embeddings_by_ids(positive_ids),
            HashMap::new(),
        )
        .await
        .into_inner();

        if let Some(seed) = average_embeddings(&embeddings) {
            return Some(seed);
        }

        match self.catalog.interest_vector(user_id).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(user_id, error = %e, "interest vector lookup failed, skipping personalization seed");
                None
            }
        }
    }

    /// Fetch items for the given ids, re-ordered to match the id list. Ids
    /// the catalog no longer knows are dropped.
    async fn items_in_order(&self, ids: &[i64]) -> Result<Vec<CatalogItem>, BookrecError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let fetched = self.catalog.items_by_id(ids).await?;
        let mut by_id: HashMap<i64, CatalogItem> =
            fetched.into_iter().map(|b| (b.id, b)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

/// Stable reorder by how many of the terms appear in the title or
/// description, most matches first, case-insensitively. Ties keep the
/// incoming (ascending-distance) order. No-op without terms.
pub fn rank_by_keyword_matches(items: &mut [CatalogItem], terms: &[String]) {
    if terms.is_empty() {
        return;
    }
    let lowered: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
    items.sort_by_cached_key(|item| {
        let haystack = format!(
            "{} {}",
            item.title,
            item.description.as_deref().unwrap_or("")
        )
        .to_lowercase();
        std::cmp::Reverse(
            lowered
                .iter()
                .filter(|t| haystack.contains(t.as_str()))
                .count(),
        )
    });
}

/// Normalize hit distances into similarities within one call:
/// `sim = 1 - distance / max_distance`. With a zero or degenerate max every
/// hit counts as a perfect match. Not comparable across calls.
pub fn similarity_from_hits(hits: &[VectorHit]) -> HashMap<i64, f64> {
    let max_distance = hits.iter().map(|h| h.distance).fold(0.0_f64, f64::max);
    hits.iter()
        .map(|h| {
            let sim = if max_distance > 0.0 {
                (1.0 - h.distance / max_distance).clamp(0.0, 1.0)
            } else {
                1.0
            };
            (h.item_id, sim)
        })
        .collect()
}

/// Component-wise mean of the embeddings. Vectors whose dimension disagrees
/// with the first are skipped. Returns None for an empty map.
pub fn average_embeddings(embeddings: &HashMap<i64, Vec<f32>>) -> Option<Vec<f32>> {
    let mut ids: Vec<i64> = embeddings.keys().copied().collect();
    ids.sort_unstable();

    let dimension = embeddings.get(ids.first()?)?.len();
    if dimension == 0 {
        return None;
    }

    let mut sum = vec![0.0_f32; dimension];
    let mut count = 0u32;
    for id in &ids {
        let v = &embeddings[id];
        if v.len() != dimension {
            continue;
        }
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += x;
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }
    for s in sum.iter_mut() {
        *s /= count as f32;
    }
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_normalized_per_call() {
        let hits = vec![
            VectorHit {
                item_id: 1,
                distance: 0.0,
            },
            VectorHit {
                item_id: 2,
                distance: 0.25,
            },
            VectorHit {
                item_id: 3,
                distance: 0.5,
            },
        ];
        let sims = similarity_from_hits(&hits);
        assert!((sims[&1] - 1.0).abs() < 1e-12);
        assert!((sims[&2] - 0.5).abs() < 1e-12);
        assert!((sims[&3] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_degenerate_distances() {
        let hits = vec![
            VectorHit {
                item_id: 1,
                distance: 0.0,
            },
            VectorHit {
                item_id: 2,
                distance: 0.0,
            },
        ];
        let sims = similarity_from_hits(&hits);
        assert_eq!(sims[&1], 1.0);
        assert_eq!(sims[&2], 1.0);
    }

    #[test]
    fn test_similarity_empty_hits() {
        assert!(similarity_from_hits(&[]).is_empty());
    }

    #[test]
    fn test_average_embeddings_mean() {
        let embeddings = HashMap::from([
            (1_i64, vec![1.0_f32, 0.0, 2.0]),
            (2, vec![3.0, 2.0, 0.0]),
        ]);
        let seed = average_embeddings(&embeddings).unwrap();
        assert_eq!(seed, vec![2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_average_embeddings_skips_dimension_mismatch() {
        let mut embeddings = HashMap::new();
        embeddings.insert(1_i64, vec![2.0_f32, 4.0]);
        embeddings.insert(2, vec![1.0]);
        let seed = average_embeddings(&embeddings);
        // With id order fixed by sorting, id 1 defines the dimension
        assert_eq!(seed, Some(vec![2.0, 4.0]));
    }

    #[test]
    fn test_average_embeddings_empty() {
        assert_eq!(average_embeddings(&HashMap::new()), None);
    }

    fn plain_item(id: i64, title: &str, description: &str) -> CatalogItem {
        CatalogItem {
            id,
            isbn: None,
            title: title.to_string(),
            author: None,
            publisher: None,
            description: Some(description.to_string()),
            cover_url: None,
            rating: None,
            category: None,
            page_count: None,
        }
    }

    fn terms(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_keyword_rank_prefers_more_matches() {
        let mut items = vec![
            plain_item(1, "Quiet Days", "a slow story"),
            plain_item(2, "Detective Nights", "a Mystery full of suspense"),
            plain_item(3, "City Mystery", "streets at dusk"),
        ];
        rank_by_keyword_matches(&mut items, &terms(&["mystery", "suspense", "detective"]));
        let ids: Vec<i64> = items.iter().map(|b| b.id).collect();
        // Three matches, then one, then zero; matching is case-insensitive
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_keyword_rank_keeps_distance_order_on_ties() {
        let mut items = vec![
            plain_item(1, "First Mystery", ""),
            plain_item(2, "Second Mystery", ""),
            plain_item(3, "Third Mystery", ""),
        ];
        rank_by_keyword_matches(&mut items, &terms(&["mystery"]));
        let ids: Vec<i64> = items.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_keyword_rank_noop_without_terms() {
        let mut items = vec![plain_item(2, "B", "x"), plain_item(1, "A", "y")];
        rank_by_keyword_matches(&mut items, &[]);
        let ids: Vec<i64> = items.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
