/// Text generation provider trait, prompts, and fallback templates
///
/// Provides a pluggable interface for the LLM the engine uses for two jobs:
/// per-item recommendation reasons and keyword/genre intent extraction on the
/// query path. Both calls are wrapped in timeouts by the engine; every failure
/// mode has a deterministic fallback, so this collaborator can disappear
/// entirely without failing a request.

pub mod openai;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::CatalogItem;

/// Errors that can occur during text generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Inference or JSON parse failure
    #[error("Generation error: {0}")]
    Generation(String),

    /// API provider returned an HTTP error
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider not configured (e.g., missing API key)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Core trait for LLM text completion.
///
/// Implementations must be Send + Sync to support use in async contexts
/// and across thread boundaries (e.g., Arc<dyn TextGenerator>).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a prompt, returning the generated text.
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;

    /// Return the model name identifier used by this provider.
    fn model_name(&self) -> &str;
}

/// Keywords and genre labels extracted from a free-text query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryIntent {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Build the per-item recommendation reason prompt.
///
/// When `user_context` is present (query path), the reason ties the book to
/// what the reader asked for; otherwise it stands on the book alone.
pub fn build_reason_prompt(item: &CatalogItem, user_context: Option<&str>) -> String {
    let mut info = format!("Title: \"{}\"", item.title);
    if let Some(author) = &item.author {
        info.push_str(&format!("\nAuthor: {}", author));
    }
    if let Some(description) = &item.description {
        let snippet: String = description.chars().take(300).collect();
        info.push_str(&format!("\nSynopsis: {}", snippet));
    }
    if let Some(rating) = item.rating {
        info.push_str(&format!("\nRating: {:.1}/10", rating));
    }

    let context_line = match user_context {
        Some(ctx) => format!("The reader is looking for: {}\n\n", ctx),
        None => String::new(),
    };

    format!(
        "Write a 50-100 word recommendation for the book below.\n\
         Requirements:\n\
         1. Warm and evocative, something that resonates with a reader\n\
         2. Highlight what makes the book distinctive\n\
         3. Graceful language, but not overwrought\n\
         4. Make the reader want to pick it up\n\
         5. Describe the content directly; never say \"this book\" or \"this work\"\n\n\
         {context_line}Book:\n{info}\n\n\
         Output the recommendation text only, with no preamble or explanation."
    )
}

/// Build the keyword/genre intent extraction prompt for a free-text query.
pub fn build_intent_prompt(query: &str) -> String {
    format!(
        "Extract search intent from a reader's book request.\n\
         Given the request below, identify up to 5 topical keywords and up to \
         3 genre labels (e.g. mystery, science fiction, romance).\n\
         Output only valid JSON of the form \
         {{\"keywords\": [\"...\"], \"genres\": [\"...\"]}}. Do not add commentary.\n\n\
         Request: {query}"
    )
}

/// Parse the intent-extraction JSON from model output.
pub fn parse_intent(content: &str) -> Result<QueryIntent, GenerationError> {
    serde_json::from_str(content).map_err(|e| {
        GenerationError::Generation(format!(
            "Failed to parse intent JSON from model output: {} (content: {})",
            e, content
        ))
    })
}

/// Deterministic reason used when generation times out, fails, or is
/// disabled. Built only from title/author/rating, so the same item always
/// gets the same text.
pub fn fallback_reason(item: &CatalogItem) -> String {
    if let Some(rating) = item.rating {
        format!(
            "\"{}\" is well worth a read. Rated {:.1}/10, give it a try.",
            item.title, rating
        )
    } else if let Some(author) = &item.author {
        format!(
            "\"{}\" is one of {}'s signature works, worth savoring.",
            item.title, author
        )
    } else {
        format!("\"{}\" is well worth a read, give it a try.", item.title)
    }
}

/// Fallback intent when extraction is unavailable: the first five whitespace
/// tokens of the query become keywords, no genres.
pub fn fallback_intent(query: &str) -> QueryIntent {
    QueryIntent {
        keywords: query
            .split_whitespace()
            .take(5)
            .map(|t| t.to_string())
            .collect(),
        genres: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, author: Option<&str>, rating: Option<f64>) -> CatalogItem {
        CatalogItem {
            id: 1,
            isbn: None,
            title: title.to_string(),
            author: author.map(|a| a.to_string()),
            publisher: None,
            description: None,
            cover_url: None,
            rating,
            category: None,
            page_count: None,
        }
    }

    #[test]
    fn test_fallback_reason_prefers_rating() {
        let reason = fallback_reason(&item("Gone Girl", Some("Gillian Flynn"), Some(8.2)));
        assert!(reason.contains("8.2/10"));
        assert!(reason.contains("Gone Girl"));
    }

    #[test]
    fn test_fallback_reason_author_without_rating() {
        let reason = fallback_reason(&item("Gone Girl", Some("Gillian Flynn"), None));
        assert!(reason.contains("Gillian Flynn"));
    }

    #[test]
    fn test_fallback_reason_title_only() {
        let reason = fallback_reason(&item("Gone Girl", None, None));
        assert!(reason.contains("Gone Girl"));
    }

    #[test]
    fn test_fallback_reason_is_deterministic() {
        let a = fallback_reason(&item("Dune", Some("Frank Herbert"), Some(9.0)));
        let b = fallback_reason(&item("Dune", Some("Frank Herbert"), Some(9.0)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_intent_valid() {
        let intent =
            parse_intent(r#"{"keywords": ["space", "empire"], "genres": ["science fiction"]}"#)
                .unwrap();
        assert_eq!(intent.keywords, vec!["space", "empire"]);
        assert_eq!(intent.genres, vec!["science fiction"]);
    }

    #[test]
    fn test_parse_intent_missing_fields_default_empty() {
        let intent = parse_intent(r#"{"keywords": ["dragons"]}"#).unwrap();
        assert_eq!(intent.keywords, vec!["dragons"]);
        assert!(intent.genres.is_empty());
    }

    #[test]
    fn test_fallback_intent_takes_first_five_tokens() {
        let intent = fallback_intent("a gripping mystery set in rainy victorian london");
        assert_eq!(intent.keywords.len(), 5);
        assert_eq!(intent.keywords[0], "a");
        assert!(intent.genres.is_empty());
    }
}
