/// Greedy diversity reranking
///
/// Selects an ordering from top-scored candidates that avoids repeating
/// authors and categories early. The selection scans a bounded look-ahead
/// window and prefers unseen categories (weight 2) over unseen authors
/// (weight 1); ties keep the earliest-scanned candidate, so the pass is
/// deterministic unless an explicit refresh shuffle was requested.
///
/// For pagination the engine diversifies the top max_pool once per request
/// and slices pages out of that single stable ordering.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::CatalogItem;
use crate::engine::score::ScoredCandidate;

/// Produce the full paging ordering: the top `max_pool` candidates by score,
/// shuffled when `randomize` is set, then diversity-ordered end to end.
///
/// Unlike [`select`], the shuffle and the greedy pass always run — a pool
/// smaller than `max_pool` still gets diversified and still responds to a
/// refresh. Pages are sliced out of the returned ordering.
pub fn order(
    mut candidates: Vec<ScoredCandidate>,
    max_pool: usize,
    window: usize,
    randomize: bool,
    rng: &mut impl Rng,
) -> Vec<CatalogItem> {
    sort_by_score(&mut candidates);
    candidates.truncate(max_pool);

    if randomize {
        candidates.shuffle(rng);
    }

    let target = candidates.len();
    diversify(candidates, target, window)
}

/// Select up to `target` items from the scored pool.
///
/// Steps: sort by score descending (stable, so retrieval order breaks ties),
/// optionally shuffle when `randomize` is set (refresh semantics — variety
/// over strict score order), then run the greedy diversity pass with the
/// given look-ahead `window`. Pools no larger than the target skip the
/// greedy pass and come back score-sorted.
pub fn select(
    mut candidates: Vec<ScoredCandidate>,
    target: usize,
    window: usize,
    randomize: bool,
    rng: &mut impl Rng,
) -> Vec<CatalogItem> {
    sort_by_score(&mut candidates);

    if candidates.len() <= target {
        return candidates.into_iter().map(|c| c.item).collect();
    }

    if randomize {
        candidates.shuffle(rng);
    }

    diversify(candidates, target, window)
}

fn sort_by_score(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Greedy pass: repeatedly pick, from the next `window` unselected
/// candidates, the one introducing the most unseen categories/authors.
///
/// Items without a category or author never mark the seen sets (and so
/// always look novel) — matching how unclassified titles are treated in the
/// shelf data. When the scan window ties, the earliest candidate wins.
fn diversify(pool: Vec<ScoredCandidate>, target: usize, window: usize) -> Vec<CatalogItem> {
    let mut rest = pool;
    let mut result = Vec::with_capacity(target);
    let mut seen_categories: Vec<String> = Vec::new();
    let mut seen_authors: Vec<String> = Vec::new();

    while result.len() < target && !rest.is_empty() {
        let scan = window.min(rest.len());
        let mut best_idx = 0;
        let mut best_novelty = -1i32;
        for (i, candidate) in rest.iter().take(scan).enumerate() {
            let category = candidate.item.category.as_deref().unwrap_or("").trim();
            let author = candidate.item.author.as_deref().unwrap_or("").trim();
            let novelty = if seen_categories.iter().any(|c| c == category) { 0 } else { 2 }
                + if seen_authors.iter().any(|a| a == author) { 0 } else { 1 };
            if novelty > best_novelty {
                best_novelty = novelty;
                best_idx = i;
            }
        }

        let picked = rest.remove(best_idx);
        if let Some(category) = picked.item.category.as_deref() {
            let trimmed = category.trim();
            if !trimmed.is_empty() && !seen_categories.iter().any(|c| c == trimmed) {
                seen_categories.push(trimmed.to_string());
            }
        }
        if let Some(author) = picked.item.author.as_deref() {
            let trimmed = author.trim();
            if !trimmed.is_empty() && !seen_authors.iter().any(|a| a == trimmed) {
                seen_authors.push(trimmed.to_string());
            }
        }
        result.push(picked.item);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn candidate(id: i64, author: &str, category: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            item: CatalogItem {
                id,
                isbn: None,
                title: format!("Book {}", id),
                author: Some(author.to_string()),
                publisher: None,
                description: None,
                cover_url: None,
                rating: None,
                category: Some(category.to_string()),
                page_count: None,
            },
            similarity: None,
            rating_norm: 0.0,
            popularity_norm: 0.0,
            author_match: false,
            category_match: false,
            dropped_author: false,
            score,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_small_pool_returned_score_sorted() {
        let pool = vec![
            candidate(1, "A", "c1", 0.2),
            candidate(2, "B", "c2", 0.9),
            candidate(3, "C", "c3", 0.5),
        ];
        let picked = select(pool, 5, 20, false, &mut rng());
        let ids: Vec<i64> = picked.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_category_spread_before_repeats() {
        // Ten high-scoring candidates across five categories; the first five
        // picks must cover all five categories.
        let mut pool = Vec::new();
        for i in 0..10i64 {
            let category = format!("cat{}", i % 5);
            let author = format!("author{}", i);
            pool.push(candidate(i, &author, &category, 1.0 - i as f64 * 0.01));
        }
        let picked = select(pool, 5, 20, false, &mut rng());
        let categories: std::collections::HashSet<_> = picked
            .iter()
            .map(|b| b.category.clone().unwrap())
            .collect();
        assert_eq!(categories.len(), 5);
    }

    #[test]
    fn test_repeat_category_deferred() {
        let pool = vec![
            candidate(1, "A", "mystery", 0.9),
            candidate(2, "B", "mystery", 0.8),
            candidate(3, "C", "romance", 0.7),
            candidate(4, "D", "cooking", 0.6),
        ];
        let picked = select(pool, 3, 20, false, &mut rng());
        let ids: Vec<i64> = picked.iter().map(|b| b.id).collect();
        // The second mystery is passed over while unseen categories remain
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn test_exhausted_pool_fills_in_order() {
        let pool = vec![
            candidate(1, "A", "c", 0.9),
            candidate(2, "A", "c", 0.8),
            candidate(3, "A", "c", 0.7),
            candidate(4, "A", "c", 0.6),
        ];
        let picked = select(pool, 3, 20, false, &mut rng());
        let ids: Vec<i64> = picked.iter().map(|b| b.id).collect();
        // All equally non-novel after the first pick: earliest-scanned wins
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_window_bounds_lookahead() {
        // With window 2 the reranker cannot see the novel category at
        // position 3 until the window slides.
        let pool = vec![
            candidate(1, "A", "mystery", 0.9),
            candidate(2, "B", "mystery", 0.8),
            candidate(3, "C", "mystery", 0.7),
            candidate(4, "D", "romance", 0.6),
        ];
        let picked = select(pool, 2, 2, false, &mut rng());
        let ids: Vec<i64> = picked.iter().map(|b| b.id).collect();
        // Second pick scans {2, 3}: author novelty only, earliest wins
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_deterministic_without_randomize() {
        let pool: Vec<ScoredCandidate> = (0..30i64)
            .map(|i| candidate(i, &format!("a{}", i % 7), &format!("c{}", i % 4), 1.0 - i as f64 * 0.02))
            .collect();
        let first = select(pool.clone(), 10, 20, false, &mut rng());
        let second = select(pool, 10, 20, false, &mut rng());
        let first_ids: Vec<i64> = first.iter().map(|b| b.id).collect();
        let second_ids: Vec<i64> = second.iter().map(|b| b.id).collect();
        assert_eq!(first_ids, second_ids);
    }

    /// Five top-scored mysteries ahead of five distinct categories.
    fn clustered_pool() -> Vec<ScoredCandidate> {
        let mut pool = Vec::new();
        for i in 1..=5i64 {
            pool.push(candidate(i, &format!("m{}", i), "mystery", 0.95 - i as f64 * 0.01));
        }
        for (j, cat) in ["romance", "sci-fi", "history", "cooking", "drama"]
            .iter()
            .enumerate()
        {
            let id = 6 + j as i64;
            pool.push(candidate(id, &format!("o{}", id), cat, 0.5 - j as f64 * 0.01));
        }
        pool
    }

    #[test]
    fn test_order_diversifies_pool_smaller_than_max() {
        // Pool of 10 with max_pool 300: the greedy pass must still run, so
        // the score-clustered mysteries get broken up immediately.
        let picked = order(clustered_pool(), 300, 20, false, &mut rng());
        let ids: Vec<i64> = picked.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 6, 7, 8, 9, 10, 2, 3, 4, 5]);
    }

    #[test]
    fn test_order_truncates_to_max_pool() {
        let picked = order(clustered_pool(), 4, 20, false, &mut rng());
        let ids: Vec<i64> = picked.iter().map(|b| b.id).collect();
        // Only the top four by score survive the cut, then diversify
        assert_eq!(ids.len(), 4);
        assert!(ids.contains(&1));
        assert!(!ids.contains(&10));
    }

    #[test]
    fn test_order_randomize_changes_small_pool_ordering() {
        let plain = order(clustered_pool(), 300, 20, false, &mut rng());
        let shuffled = order(clustered_pool(), 300, 20, true, &mut StdRng::seed_from_u64(3));
        let plain_ids: Vec<i64> = plain.iter().map(|b| b.id).collect();
        let shuffled_ids: Vec<i64> = shuffled.iter().map(|b| b.id).collect();
        assert_ne!(plain_ids, shuffled_ids);
        // Same membership either way
        let a: std::collections::HashSet<i64> = plain_ids.into_iter().collect();
        let b: std::collections::HashSet<i64> = shuffled_ids.into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_randomize_uses_injected_rng() {
        let pool: Vec<ScoredCandidate> = (0..30i64)
            .map(|i| candidate(i, &format!("a{}", i), &format!("c{}", i), 1.0 - i as f64 * 0.02))
            .collect();
        let seeded_a = select(pool.clone(), 10, 20, true, &mut StdRng::seed_from_u64(1));
        let seeded_b = select(pool, 10, 20, true, &mut StdRng::seed_from_u64(1));
        let a: Vec<i64> = seeded_a.iter().map(|b| b.id).collect();
        let b: Vec<i64> = seeded_b.iter().map(|b| b.id).collect();
        // Same seed, same shuffled ordering
        assert_eq!(a, b);
    }
}
