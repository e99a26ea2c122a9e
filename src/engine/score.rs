/// Affinity scoring — blending normalized signals into one final score
///
/// Two modes: rating/popularity only (cold start, anonymous fallback pools)
/// and personalized (similarity plus shelf-derived author/category affinity).
/// All weights are fixed constants; the final score is clamped to [0, 1].
/// Ties are left to the reranker's iteration order.

use std::collections::{HashMap, HashSet};

use crate::catalog::CatalogItem;
use crate::engine::signals::normalize;

// Personalized blend
const SIMILARITY_WEIGHT: f64 = 0.5;
const AUTHOR_BONUS: f64 = 0.3;
const CATEGORY_BONUS: f64 = 0.2;
const DROPPED_PENALTY: f64 = 0.4;
const PERSONAL_WEIGHT: f64 = 0.5;
const RATING_WEIGHT: f64 = 0.3;
const POPULARITY_WEIGHT: f64 = 0.2;

// Cold-start blend
const COLD_RATING_WEIGHT: f64 = 0.6;
const COLD_POPULARITY_WEIGHT: f64 = 0.4;

/// How to blend signals for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    /// No usable personalization signal: 0.6 * rating + 0.4 * popularity
    RatingPopularity,
    /// Shelf- or query-seeded: 0.5 * personal + 0.3 * rating + 0.2 * popularity
    Personalized,
}

/// Per-request affinity profile derived from the user's shelf snapshot.
///
/// Authors and categories are trimmed; empty strings never populate the
/// sets. Never persisted — recomputed on every ranking request.
#[derive(Debug, Clone, Default)]
pub struct AffinityProfile {
    /// Items the user shelved positively (want-to-read/read)
    pub positive_ids: Vec<i64>,
    pub preferred_authors: HashSet<String>,
    pub preferred_categories: HashSet<String>,
    pub dropped_authors: HashSet<String>,
}

impl AffinityProfile {
    /// Build a profile from the positive shelf items and the dropped-author
    /// set the catalog reported.
    pub fn from_shelf(positive: &[CatalogItem], dropped_authors: HashSet<String>) -> Self {
        let mut profile = AffinityProfile {
            dropped_authors,
            ..AffinityProfile::default()
        };
        for item in positive {
            profile.positive_ids.push(item.id);
            if let Some(author) = &item.author {
                let trimmed = author.trim();
                if !trimmed.is_empty() {
                    profile.preferred_authors.insert(trimmed.to_string());
                }
            }
            if let Some(category) = &item.category {
                let trimmed = category.trim();
                if !trimmed.is_empty() {
                    profile.preferred_categories.insert(trimmed.to_string());
                }
            }
        }
        profile
    }

    /// Whether the shelf carries any personalization signal.
    pub fn has_signal(&self) -> bool {
        !self.positive_ids.is_empty()
    }
}

/// An item with its raw signals and final blended score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub item: CatalogItem,
    /// Per-call-normalized vector similarity; absent for rating-scan items
    pub similarity: Option<f64>,
    pub rating_norm: f64,
    pub popularity_norm: f64,
    pub author_match: bool,
    pub category_match: bool,
    pub dropped_author: bool,
    /// Final blended score, clamped to [0, 1]
    pub score: f64,
}

/// Score every candidate in the pool.
///
/// Rating and popularity are min-max normalized across the pool (popularity
/// log-compressed first). Missing ratings count as 0 before normalization;
/// missing similarity is treated as 0.0, not an exclusion.
pub fn score_candidates(
    items: Vec<CatalogItem>,
    similarity: &HashMap<i64, f64>,
    popularity: &HashMap<i64, i64>,
    profile: &AffinityProfile,
    mode: ScoreMode,
) -> Vec<ScoredCandidate> {
    if items.is_empty() {
        return Vec::new();
    }

    let ratings: Vec<f64> = items
        .iter()
        .map(|b| b.rating.unwrap_or(0.0) / 10.0)
        .collect();
    let pops: Vec<f64> = items
        .iter()
        .map(|b| *popularity.get(&b.id).unwrap_or(&0) as f64)
        .collect();
    let rating_norm = normalize(&ratings, false);
    let popularity_norm = normalize(&pops, true);

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let r = rating_norm[i];
            let p = popularity_norm[i];
            let sim = similarity.get(&item.id).copied();

            let author = item.author.as_deref().unwrap_or("").trim();
            let category = item.category.as_deref().unwrap_or("").trim();
            let author_match = !author.is_empty() && profile.preferred_authors.contains(author);
            let category_match =
                !category.is_empty() && profile.preferred_categories.contains(category);
            let dropped_author = !author.is_empty() && profile.dropped_authors.contains(author);

            let score = match mode {
                ScoreMode::RatingPopularity => {
                    COLD_RATING_WEIGHT * r + COLD_POPULARITY_WEIGHT * p
                }
                ScoreMode::Personalized => {
                    let personal = (sim.unwrap_or(0.0) * SIMILARITY_WEIGHT
                        + if author_match { AUTHOR_BONUS } else { 0.0 }
                        + if category_match { CATEGORY_BONUS } else { 0.0 }
                        - if dropped_author { DROPPED_PENALTY } else { 0.0 })
                        .clamp(0.0, 1.0);
                    PERSONAL_WEIGHT * personal + RATING_WEIGHT * r + POPULARITY_WEIGHT * p
                }
            };

            ScoredCandidate {
                item,
                similarity: sim,
                rating_norm: r,
                popularity_norm: p,
                author_match,
                category_match,
                dropped_author,
                score: score.clamp(0.0, 1.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, author: Option<&str>, category: Option<&str>, rating: Option<f64>) -> CatalogItem {
        CatalogItem {
            id,
            isbn: None,
            title: format!("Book {}", id),
            author: author.map(|a| a.to_string()),
            publisher: None,
            description: None,
            cover_url: None,
            rating,
            category: category.map(|c| c.to_string()),
            page_count: None,
        }
    }

    #[test]
    fn test_profile_skips_blank_authors_and_categories() {
        let shelf = vec![
            item(1, Some("  "), Some("Fiction"), None),
            item(2, Some("Ursula K. Le Guin "), Some(""), None),
        ];
        let profile = AffinityProfile::from_shelf(&shelf, HashSet::new());
        assert_eq!(profile.positive_ids, vec![1, 2]);
        assert!(profile.preferred_authors.contains("Ursula K. Le Guin"));
        assert_eq!(profile.preferred_authors.len(), 1);
        assert_eq!(profile.preferred_categories.len(), 1);
    }

    #[test]
    fn test_cold_start_formula() {
        let items = vec![
            item(1, None, None, Some(10.0)),
            item(2, None, None, Some(5.0)),
            item(3, None, None, None),
        ];
        let popularity = HashMap::from([(1, 0i64), (2, 9), (3, 99)]);
        let scored = score_candidates(
            items,
            &HashMap::new(),
            &popularity,
            &AffinityProfile::default(),
            ScoreMode::RatingPopularity,
        );
        // rating_norm = [1.0, 0.5, 0.0]; pop_norm (log) = [0.0, 0.5, 1.0]
        assert!((scored[0].score - 0.6).abs() < 1e-9);
        assert!((scored[1].score - (0.6 * 0.5 + 0.4 * 0.5)).abs() < 1e-9);
        assert!((scored[2].score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_personalized_author_and_category_bonuses() {
        let mut profile = AffinityProfile::default();
        profile.positive_ids.push(99);
        profile.preferred_authors.insert("Agatha Christie".to_string());
        profile.preferred_categories.insert("Mystery".to_string());

        let items = vec![
            item(1, Some("Agatha Christie"), Some("Mystery"), Some(8.0)),
            item(2, Some("Nobody"), Some("Cooking"), Some(8.0)),
        ];
        let scored = score_candidates(
            items,
            &HashMap::new(),
            &HashMap::new(),
            &profile,
            ScoreMode::Personalized,
        );
        // Equal rating/popularity; only the affinity bonuses differ:
        // personal = 0.3 + 0.2 = 0.5 vs 0.0 -> score gap of 0.25
        assert!(scored[0].author_match && scored[0].category_match);
        assert!((scored[0].score - scored[1].score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_dropped_author_penalty_floors_at_zero() {
        let mut profile = AffinityProfile::default();
        profile.positive_ids.push(99);
        profile.dropped_authors.insert("Tiresome".to_string());

        let items = vec![
            item(1, Some("Tiresome"), None, Some(8.0)),
            item(2, Some("Fresh"), None, Some(8.0)),
        ];
        let sims = HashMap::from([(1, 0.2), (2, 0.2)]);
        let scored = score_candidates(
            items,
            &sims,
            &HashMap::new(),
            &profile,
            ScoreMode::Personalized,
        );
        // personal for the dropped author: clamp(0.1 - 0.4) = 0.0
        assert!(scored[0].dropped_author);
        assert!(scored[0].score < scored[1].score);
        assert!(scored.iter().all(|c| (0.0..=1.0).contains(&c.score)));
    }

    #[test]
    fn test_missing_similarity_treated_as_zero() {
        let mut profile = AffinityProfile::default();
        profile.positive_ids.push(99);

        let items = vec![item(1, None, None, Some(8.0)), item(2, None, None, Some(8.0))];
        let sims = HashMap::from([(2, 1.0)]);
        let scored = score_candidates(
            items,
            &sims,
            &HashMap::new(),
            &profile,
            ScoreMode::Personalized,
        );
        assert_eq!(scored[0].similarity, None);
        assert!(scored[0].score < scored[1].score);
    }
}
