/// Recommendation engine
///
/// Orchestrates the two ranking paths: shelf-personalized recommendations
/// and free-text query recommendations. The catalog store is the only
/// required collaborator; the vector index, embedding provider, and text
/// generator are all optional and every call to them is guarded by a time
/// budget with a deterministic fallback, so a request never fails because a
/// model or index is down.

pub mod diversity;
pub mod expand;
pub mod reasons;
pub mod resilient;
pub mod retrieve;
pub mod score;
pub mod signals;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogItem, CatalogStore};
use crate::config::{EngineConfig, GenerationConfig};
use crate::embedding::EmbeddingProvider;
use crate::engine::expand::{detect_genres, expand};
use crate::engine::reasons::ReasonCache;
use crate::engine::resilient::guard;
use crate::engine::retrieve::CandidateRetriever;
use crate::engine::score::{score_candidates, AffinityProfile, ScoreMode};
use crate::errors::BookrecError;
use crate::generation::{
    build_intent_prompt, build_reason_prompt, fallback_intent, fallback_reason, parse_intent,
    QueryIntent, TextGenerator,
};
use crate::vector::VectorIndex;

const MIN_QUERY_RESULTS: u32 = 5;
const MAX_QUERY_RESULTS: u32 = 8;
const MAX_PAGE_LIMIT: u32 = 50;

/// One recommended title with its presentation text.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub item: CatalogItem,
    /// Generated (or template) recommendation text
    pub reason: String,
    /// Whether the reason came from the TTL cache
    pub from_cache: bool,
    /// Whether the reason is the deterministic template fallback
    pub fallback_reason: bool,
    /// First substantive sentence of the reason, for compact display
    pub highlight: Option<String>,
}

/// Result of a free-text query request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecommendations {
    pub recommendations: Vec<Recommendation>,
    /// Guidance for the caller when retrieval fell back or came up empty
    pub message: Option<String>,
    /// True when neither semantic search nor keyword matching found anything
    /// and the results are a popularity fallback (or empty)
    pub no_strong_match: bool,
}

pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogStore>,
    retriever: CandidateRetriever,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn TextGenerator>>,
    reason_cache: Arc<ReasonCache>,
    config: EngineConfig,
    generation: GenerationConfig,
}

impl RecommendationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        generator: Option<Arc<dyn TextGenerator>>,
        config: EngineConfig,
        generation: GenerationConfig,
    ) -> Self {
        let reason_cache = Arc::new(ReasonCache::new(Duration::from_secs(
            config.reason_ttl_secs,
        )));
        let retriever = CandidateRetriever::new(Arc::clone(&catalog), index, config.clone());
        RecommendationEngine {
            catalog,
            retriever,
            embedder,
            generator,
            reason_cache,
            config,
            generation,
        }
    }

    /// Personalized recommendations for a user, paginated.
    ///
    /// The full candidate pool is scored and diversified once, then the page
    /// is sliced out of that single ordering — so consecutive pages never
    /// overlap or reorder. `refresh` shuffles the pool before the diversity
    /// pass to vary the ordering; without it the ordering is deterministic.
    pub async fn recommend_for_user(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
        refresh: bool,
    ) -> Result<Vec<Recommendation>, BookrecError> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(BookrecError::validation(
                "limit",
                &format!("limit must be between 1 and {}", MAX_PAGE_LIMIT),
            ));
        }

        let not_interested = self.not_interested_or_empty(user_id).await;
        let positive = match self.catalog.positive_shelf_items(user_id).await {
            Ok(items) => items,
            Err(e) => {
                warn!(user_id, error = %e, "shelf lookup failed, falling back to cold start");
                Vec::new()
            }
        };
        let dropped = match self.catalog.dropped_shelf_authors(user_id).await {
            Ok(authors) => authors,
            Err(e) => {
                warn!(user_id, error = %e, "dropped-author lookup failed, skipping penalty");
                HashSet::new()
            }
        };
        let profile = AffinityProfile::from_shelf(&positive, dropped);

        let pool = self
            .retriever
            .personalized_pool(user_id, &profile.positive_ids, &not_interested)
            .await?;

        let mode = if pool.personalized && profile.has_signal() {
            ScoreMode::Personalized
        } else {
            ScoreMode::RatingPopularity
        };
        let popularity = self.shelf_counts_or_empty().await;
        let scored = score_candidates(pool.items, &pool.similarity, &popularity, &profile, mode);

        let mut rng = self.request_rng();
        let ordering = diversity::order(
            scored,
            self.config.max_pool as usize,
            self.config.diversity_window as usize,
            refresh,
            &mut rng,
        );

        let start = (offset as usize).min(ordering.len());
        let end = (start + limit as usize).min(ordering.len());
        let page: Vec<CatalogItem> = ordering[start..end].to_vec();

        info!(
            user_id,
            mode = ?mode,
            pool = ordering.len(),
            page = page.len(),
            offset,
            refresh,
            "personalized recommendations ready"
        );

        Ok(self.attach_reasons(page, None).await)
    }

    /// Recommendations for a free-text request ("something cozy for a rainy
    /// weekend"). Returns 5-8 titles with query-aware reasons.
    pub async fn recommend_by_query(
        &self,
        query: &str,
        user_id: Option<i64>,
    ) -> Result<QueryRecommendations, BookrecError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BookrecError::validation("query", "query must not be blank"));
        }

        let excluded = match user_id {
            Some(id) => self.not_interested_or_empty(id).await,
            None => HashSet::new(),
        };

        let intent = self.extract_intent(query).await;
        let mut genres = intent.genres.clone();
        for g in detect_genres(query) {
            if !genres.contains(&g) {
                genres.push(g);
            }
        }
        let expanded = expand(query, &intent.keywords, &genres);
        debug!(
            search_text = %expanded.search_text,
            terms = expanded.match_terms.len(),
            "expanded query"
        );

        let query_vector = self.embed_query(&expanded.search_text).await;
        let pool = self
            .retriever
            .query_pool(query_vector.as_deref(), &expanded.match_terms, &excluded)
            .await?;

        let mut rng = self.request_rng();
        let target = rng.gen_range(MIN_QUERY_RESULTS..=MAX_QUERY_RESULTS) as usize;

        if pool.items.is_empty() {
            return self.query_fallback(query, &excluded, target, rng).await;
        }

        let popularity = self.shelf_counts_or_empty().await;
        let scored = score_candidates(
            pool.items,
            &pool.similarity,
            &popularity,
            &AffinityProfile::default(),
            ScoreMode::Personalized,
        );
        let picked = diversity::select(
            scored,
            target,
            self.config.diversity_window as usize,
            true,
            &mut rng,
        );

        info!(results = picked.len(), "query recommendations ready");

        Ok(QueryRecommendations {
            recommendations: self.attach_reasons(picked, Some(query.to_string())).await,
            message: None,
            no_strong_match: false,
        })
    }

    /// When nothing matched the request, fall back to a popularity ranking
    /// with a guidance message, or an empty answer if the catalog has nothing.
    async fn query_fallback(
        &self,
        query: &str,
        excluded: &HashSet<i64>,
        target: usize,
        mut rng: StdRng,
    ) -> Result<QueryRecommendations, BookrecError> {
        warn!(query, "no retrieval results, using popularity fallback");

        let base = self
            .catalog
            .items_by_rating_desc(excluded, self.config.pool_size)
            .await?;
        if base.is_empty() {
            return Ok(QueryRecommendations {
                recommendations: Vec::new(),
                message: Some("No books available to recommend right now.".to_string()),
                no_strong_match: true,
            });
        }

        let popularity = self.shelf_counts_or_empty().await;
        let scored = score_candidates(
            base,
            &HashMap::new(),
            &popularity,
            &AffinityProfile::default(),
            ScoreMode::RatingPopularity,
        );
        let picked = diversity::select(
            scored,
            target,
            self.config.diversity_window as usize,
            true,
            &mut rng,
        );

        Ok(QueryRecommendations {
            recommendations: self.attach_reasons(picked, Some(query.to_string())).await,
            message: Some(
                "Nothing matched that request closely; here are some widely loved titles instead."
                    .to_string(),
            ),
            no_strong_match: true,
        })
    }

    /// Generate reason text for each item concurrently, preserving order.
    ///
    /// Without query context, reasons are served from and written to the TTL
    /// cache; contextual reasons are always generated fresh. Fallback texts
    /// are never cached so a later request can retry generation.
    async fn attach_reasons(
        &self,
        items: Vec<CatalogItem>,
        user_context: Option<String>,
    ) -> Vec<Recommendation> {
        let cacheable = user_context.is_none();
        let mut generated: Vec<Option<String>> = vec![None; items.len()];
        let mut cached: Vec<bool> = vec![false; items.len()];

        let mut pending: Vec<usize> = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if cacheable {
                if let Some(text) = self.reason_cache.get(item.id) {
                    generated[i] = Some(text);
                    cached[i] = true;
                    continue;
                }
            }
            pending.push(i);
        }

        if let Some(generator) = &self.generator {
            let budget = Duration::from_secs(self.config.generation_timeout_secs);
            let mut tasks: JoinSet<(usize, Option<String>)> = JoinSet::new();
            for &i in &pending {
                let generator = Arc::clone(generator);
                let prompt = build_reason_prompt(&items[i], user_context.as_deref());
                let temperature = self.generation.temperature;
                let max_tokens = self.generation.max_tokens;
                tasks.spawn(async move {
                    let result = tokio::time::timeout(
                        budget,
                        generator.complete(&prompt, temperature, max_tokens),
                    )
                    .await;
                    match result {
                        Ok(Ok(text)) if !text.trim().is_empty() => {
                            (i, Some(text.trim().to_string()))
                        }
                        Ok(Ok(_)) => {
                            warn!(slot = i, "empty reason from generator, using fallback");
                            (i, None)
                        }
                        Ok(Err(e)) => {
                            warn!(slot = i, error = %e, "reason generation failed, using fallback");
                            (i, None)
                        }
                        Err(_) => {
                            warn!(slot = i, "reason generation timed out, using fallback");
                            (i, None)
                        }
                    }
                });
            }
            while let Some(joined) = tasks.join_next().await {
                if let Ok((i, text)) = joined {
                    if let Some(text) = &text {
                        if cacheable {
                            self.reason_cache.put(items[i].id, text.clone());
                        }
                    }
                    generated[i] = text;
                }
            }
        }

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let (reason, fallback) = match generated[i].take() {
                    Some(text) => (text, false),
                    None => (fallback_reason(&item), true),
                };
                let highlight = first_sentence(&reason);
                Recommendation {
                    item,
                    reason,
                    from_cache: cached[i],
                    fallback_reason: fallback,
                    highlight,
                }
            })
            .collect()
    }

    /// LLM keyword/genre extraction under its own budget; any failure falls
    /// back to the first tokens of the query.
    async fn extract_intent(&self, query: &str) -> QueryIntent {
        let Some(generator) = &self.generator else {
            return fallback_intent(query);
        };
        let prompt = build_intent_prompt(query);
        let attempt = guard(
            Duration::from_secs(self.config.intent_timeout_secs),
            "intent_extraction",
            async {
                let content = generator.complete(&prompt, 0.0, 200).await?;
                parse_intent(&content)
            },
            fallback_intent(query),
        )
        .await;
        attempt.into_inner()
    }

    async fn embed_query(&self, search_text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        guard(
            Duration::from_secs(self.config.embed_timeout_secs),
            "query_embedding",
            async { embedder.embed(search_text).await.map(Some) },
            None,
        )
        .await
        .into_inner()
    }

    async fn not_interested_or_empty(&self, user_id: i64) -> HashSet<i64> {
        match self.catalog.not_interested_items(user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(user_id, error = %e, "not-interested lookup failed, not excluding");
                HashSet::new()
            }
        }
    }

    async fn shelf_counts_or_empty(&self) -> HashMap<i64, i64> {
        match self.catalog.shelf_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "shelf count lookup failed, popularity signal empty");
                HashMap::new()
            }
        }
    }

    fn request_rng(&self) -> StdRng {
        match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// First sentence of the reason with more than five characters, for compact
/// card display. Sentence boundaries cover both Latin and CJK punctuation.
fn first_sentence(text: &str) -> Option<String> {
    text.split(['.', '!', '?', '。', '！', '？'])
        .map(str::trim)
        .find(|s| s.chars().count() > 5)
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sentence_picks_first_substantive() {
        let text = "Yes. A slow-burning portrait of a family in decline. Haunting.";
        assert_eq!(
            first_sentence(text),
            Some("A slow-burning portrait of a family in decline".to_string())
        );
    }

    #[test]
    fn test_first_sentence_cjk_punctuation() {
        let text = "好书！一部温柔而锋利的成长小说。";
        assert_eq!(
            first_sentence(text),
            Some("一部温柔而锋利的成长小说".to_string())
        );
    }

    #[test]
    fn test_first_sentence_none_when_all_short() {
        assert_eq!(first_sentence("Ok. Yes!"), None);
    }
}
