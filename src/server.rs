use rmcp::{
    ServerHandler,
    tool,
    model::{ServerCapabilities, Implementation, ProtocolVersion, CallToolResult},
    handler::server::wrapper::Parameters,
    ErrorData as McpError,
};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::{QueryRecommendations, Recommendation, RecommendationEngine};
use crate::errors::BookrecError;

pub struct RecommendationService {
    engine: Arc<RecommendationEngine>,
    start_time: Instant,
}

impl RecommendationService {
    pub fn new(engine: Arc<RecommendationEngine>) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
        }
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// Parameter structs

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RecommendForUserParams {
    /// User ID to personalize for (required)
    pub user_id: i64,
    /// Number of results to return (1-50, default: 10)
    pub limit: Option<u32>,
    /// Offset into the diversified ranking for pagination (default: 0)
    pub offset: Option<u32>,
    /// Shuffle the pool for a fresh ordering (default: false)
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RecommendByQueryParams {
    /// Free-text request, e.g. "something cozy for a rainy weekend" (required)
    pub query: String,
    /// Optional user ID, used only to exclude not-interested titles
    pub user_id: Option<i64>,
}

// Helper: convert BookrecError to CallToolResult with isError: true
fn engine_error_to_result(err: BookrecError) -> CallToolResult {
    match err {
        BookrecError::Validation { message, field } => {
            let mut obj = json!({
                "isError": true,
                "error": message,
            });
            if let Some(f) = field {
                obj["field"] = json!(f);
            }
            CallToolResult::structured_error(obj)
        }
        BookrecError::NotFound { id } => CallToolResult::structured_error(json!({
            "isError": true,
            "error": format!("Book not found: {}", id),
        })),
        BookrecError::Storage(msg) => CallToolResult::structured_error(json!({
            "isError": true,
            "error": format!("Storage error: {}", msg)
        })),
        other => CallToolResult::structured_error(json!({
            "isError": true,
            "error": other.to_string()
        })),
    }
}

fn recommendation_json(rec: &Recommendation) -> serde_json::Value {
    json!({
        "id": rec.item.id,
        "isbn": rec.item.isbn,
        "title": rec.item.title,
        "author": rec.item.author,
        "publisher": rec.item.publisher,
        "description": rec.item.description,
        "cover_url": rec.item.cover_url,
        "rating": rec.item.rating,
        "category": rec.item.category,
        "page_count": rec.item.page_count,
        "reason": rec.reason,
        "highlight": rec.highlight,
        "from_cache": rec.from_cache,
        "fallback_reason": rec.fallback_reason,
    })
}

// Tool implementations
#[rmcp::tool_router]
impl RecommendationService {
    #[tool(description = "Personalized book recommendations for a user, ranked from their bookshelf. Supports pagination via offset and a refresh flag for a reshuffled ordering.")]
    async fn recommend_for_user(
        &self,
        Parameters(params): Parameters<RecommendForUserParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            tool = "recommend_for_user",
            user_id = params.user_id,
            limit = ?params.limit,
            offset = ?params.offset,
            refresh = params.refresh,
            "Tool called"
        );

        let limit = params.limit.unwrap_or(10);
        let offset = params.offset.unwrap_or(0);

        match self
            .engine
            .recommend_for_user(params.user_id, limit, offset, params.refresh)
            .await
        {
            Ok(recommendations) => {
                let items: Vec<serde_json::Value> =
                    recommendations.iter().map(recommendation_json).collect();
                Ok(CallToolResult::structured(json!({
                    "recommendations": items,
                    "count": items.len(),
                    "offset": offset,
                    "hint": "Pass offset + count as the next offset to page deeper, or refresh: true for a new ordering"
                })))
            }
            Err(e) => Ok(engine_error_to_result(e)),
        }
    }

    #[tool(description = "Book recommendations for a free-text request such as a mood, topic, or genre. Returns 5-8 titles with a short reason for each.")]
    async fn recommend_by_query(
        &self,
        Parameters(params): Parameters<RecommendByQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            tool = "recommend_by_query",
            query = %params.query,
            user_id = ?params.user_id,
            "Tool called"
        );

        if params.query.trim().is_empty() {
            return Ok(CallToolResult::structured_error(json!({
                "isError": true,
                "error": "Field 'query' is required and cannot be empty",
                "field": "query"
            })));
        }

        match self
            .engine
            .recommend_by_query(&params.query, params.user_id)
            .await
        {
            Ok(QueryRecommendations {
                recommendations,
                message,
                no_strong_match,
            }) => {
                let items: Vec<serde_json::Value> =
                    recommendations.iter().map(recommendation_json).collect();
                Ok(CallToolResult::structured(json!({
                    "recommendations": items,
                    "count": items.len(),
                    "message": message,
                    "no_strong_match": no_strong_match,
                })))
            }
            Err(e) => Ok(engine_error_to_result(e)),
        }
    }

    #[tool(description = "Check server health and status")]
    async fn health_check(&self) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "health_check", "Tool called");

        Ok(CallToolResult::structured(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": self.uptime_seconds(),
        })))
    }
}

// ServerHandler implementation
#[rmcp::tool_handler(router = Self::tool_router())]
impl ServerHandler for RecommendationService {
    fn get_info(&self) -> rmcp::model::InitializeResult {
        rmcp::model::InitializeResult {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "bookrec".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "Personalized book recommendation server backed by PostgreSQL and pgvector"
                        .to_string(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Book recommendation server. Tools: recommend_for_user (shelf-personalized, paginated), recommend_by_query (free-text mood/topic requests), health_check.".to_string()
            ),
        }
    }
}
