/// Genre query expansion
///
/// Maps canonical genre labels to related vocabulary and uses the expansion
/// two ways: enriching the text sent to semantic search (so the query vector
/// leans toward topical vocabulary rather than literal phrasing) and driving
/// a direct keyword-match fallback against the catalog.
///
/// The catalog's descriptive text is largely English (Open Library sourced)
/// while queries may be Chinese, so each entry carries both languages.

/// Result of expanding a query against keywords, genres, and the synonym
/// table.
#[derive(Debug, Clone)]
pub struct ExpandedQuery {
    /// Enriched text for semantic search: original query, then keywords,
    /// then genre labels, then synonym expansions, space-joined.
    pub search_text: String,
    /// Deduplicated term list for the keyword-match catalog fallback.
    /// Empty when no keywords or genres were supplied.
    pub match_terms: Vec<String>,
}

/// Related terms for a canonical genre label. Each expansion includes the
/// label itself so a bare genre word still matches catalog text directly.
pub fn synonyms_for(genre: &str) -> Option<&'static [&'static str]> {
    let terms: &'static [&'static str] = match genre {
        "推理" | "推理小说" | "mystery" => &[
            "mystery", "detective", "crime", "thriller", "推理", "悬疑", "侦探", "本格",
            "社会派", "解谜",
        ],
        "悬疑" | "suspense" => &[
            "suspense", "mystery", "detective", "thriller", "悬疑", "推理", "侦探",
        ],
        "科幻" | "science fiction" | "sci-fi" => &[
            "science fiction", "sci-fi", "future", "space", "科幻", "未来", "太空",
            "人工智能",
        ],
        "言情" | "romance" => &["romance", "love", "言情", "爱情", "治愈", "温暖"],
        _ => return None,
    };
    Some(terms)
}

/// Detect genre labels mentioned verbatim in free text.
///
/// Keeps the keyword-match fallback working when LLM intent extraction is
/// unavailable: a query containing "mystery" activates the mystery expansion
/// even if no genre list was supplied.
pub fn detect_genres(text: &str) -> Vec<String> {
    const LABELS: &[&str] = &[
        "推理小说",
        "推理",
        "悬疑",
        "科幻",
        "言情",
        "mystery",
        "suspense",
        "science fiction",
        "sci-fi",
        "romance",
    ];
    let lowered = text.to_lowercase();
    LABELS
        .iter()
        .filter(|label| lowered.contains(&label.to_lowercase()))
        .map(|label| label.to_string())
        .collect()
}

/// Expand a query for retrieval.
///
/// Produces the enriched search text and the keyword-match predicate set.
/// Terms are trimmed, deduplicated, and order-preserving. With no keywords
/// and no genres, the search text is the original query unchanged and
/// match_terms is empty (no fallback retrieval).
pub fn expand(text: &str, keywords: &[String], genres: &[String]) -> ExpandedQuery {
    let mut parts: Vec<String> = vec![text.trim().to_string()];
    let mut terms: Vec<String> = Vec::new();

    let push_part = |parts: &mut Vec<String>, value: &str| {
        let trimmed = value.trim();
        if !trimmed.is_empty() && !parts.iter().any(|p| p == trimmed) {
            parts.push(trimmed.to_string());
        }
    };

    for k in keywords {
        push_part(&mut parts, k);
        push_term(&mut terms, k);
    }
    for g in genres {
        push_part(&mut parts, g);
        push_term(&mut terms, g);
    }
    for g in genres {
        if let Some(expansion) = synonyms_for(g.trim()) {
            for s in expansion {
                push_part(&mut parts, s);
                push_term(&mut terms, s);
            }
        }
    }

    ExpandedQuery {
        search_text: parts.join(" "),
        match_terms: terms,
    }
}

fn push_term(terms: &mut Vec<String>, value: &str) {
    let trimmed = value.trim();
    if !trimmed.is_empty() && !terms.iter().any(|t| t == trimmed) {
        terms.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_expand_without_hints_is_unchanged() {
        let expanded = expand("something to cheer me up", &[], &[]);
        assert_eq!(expanded.search_text, "something to cheer me up");
        assert!(expanded.match_terms.is_empty());
    }

    #[test]
    fn test_expand_appends_keywords_and_genres() {
        let expanded = expand(
            "rainy evening read",
            &strings(&["atmospheric"]),
            &strings(&["mystery"]),
        );
        assert!(expanded.search_text.starts_with("rainy evening read atmospheric mystery"));
        // Synonym expansion follows the genre label
        assert!(expanded.search_text.contains("detective"));
        assert!(expanded.match_terms.contains(&"atmospheric".to_string()));
        assert!(expanded.match_terms.contains(&"thriller".to_string()));
    }

    #[test]
    fn test_expand_deduplicates_preserving_order() {
        let expanded = expand(
            "mystery picks",
            &strings(&["mystery", "mystery"]),
            &strings(&["mystery"]),
        );
        let count = expanded
            .match_terms
            .iter()
            .filter(|t| t.as_str() == "mystery")
            .count();
        assert_eq!(count, 1);
        assert_eq!(expanded.match_terms[0], "mystery");
    }

    #[test]
    fn test_expand_skips_blank_terms() {
        let expanded = expand("read", &strings(&["  ", ""]), &[]);
        assert!(expanded.match_terms.is_empty());
        assert_eq!(expanded.search_text, "read");
    }

    #[test]
    fn test_cross_language_expansion() {
        let expanded = expand("想看点烧脑的", &[], &strings(&["推理"]));
        // Chinese genre label expands into English catalog vocabulary
        assert!(expanded.match_terms.contains(&"mystery".to_string()));
        assert!(expanded.match_terms.contains(&"detective".to_string()));
        assert!(expanded.match_terms.contains(&"悬疑".to_string()));
    }

    #[test]
    fn test_detect_genres_in_text() {
        let genres = detect_genres("I want a good Mystery tonight");
        assert_eq!(genres, vec!["mystery".to_string()]);
        assert!(detect_genres("just something nice").is_empty());
    }

    #[test]
    fn test_detect_genres_chinese() {
        let genres = detect_genres("来点推理小说吧");
        assert!(genres.contains(&"推理小说".to_string()));
        assert!(genres.contains(&"推理".to_string()));
    }
}
