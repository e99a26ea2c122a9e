/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: bookrec.toml (in working directory)
/// 3. Environment variables: prefixed BOOKREC_ (e.g., BOOKREC_LOG_LEVEL=debug,
///    BOOKREC_ENGINE__MAX_POOL=200 for nested fields)

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::errors::BookrecError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// PostgreSQL connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Tunables for the ranking core.
///
/// Defaults match the production behavior: bounded pools, per-call timeouts
/// for every external dependency, and a 300-second reason cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rating-ordered catalog scan size for the candidate pool
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Nearest-neighbor result count for the shelf-seeded search
    #[serde(default = "default_shelf_top_k")]
    pub shelf_top_k: u32,

    /// Nearest-neighbor result count for the query path
    #[serde(default = "default_query_top_k")]
    pub query_top_k: u32,

    /// Bound on keyword-match fallback retrieval
    #[serde(default = "default_genre_match_limit")]
    pub genre_match_limit: u32,

    /// Top-scored candidates diversified once per request; pages slice this
    #[serde(default = "default_max_pool")]
    pub max_pool: u32,

    /// Greedy diversity look-ahead window
    #[serde(default = "default_diversity_window")]
    pub diversity_window: u32,

    /// Reason cache entry lifetime in seconds
    #[serde(default = "default_reason_ttl_secs")]
    pub reason_ttl_secs: u64,

    /// Per-item budget for reason generation
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Budget for one vector-index search call
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,

    /// Budget for LLM keyword/genre extraction on the query path
    #[serde(default = "default_intent_timeout_secs")]
    pub intent_timeout_secs: u64,

    /// Budget for embedding the expanded query text
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    /// Fixed RNG seed for refresh shuffling. Unset in production; set in
    /// tests to make refresh ordering reproducible.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

/// Embedding provider settings (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "openai" or "disabled". When disabled, the query path relies on the
    /// genre keyword fallback and the personalized path on rating/popularity.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

/// Text generation settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "openai" or "disabled". When disabled, every reason uses the
    /// deterministic template fallback.
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost/bookrec".to_string()
}

fn default_pool_size() -> u32 {
    500
}

fn default_shelf_top_k() -> u32 {
    150
}

fn default_query_top_k() -> u32 {
    100
}

fn default_genre_match_limit() -> u32 {
    30
}

fn default_max_pool() -> u32 {
    300
}

fn default_diversity_window() -> u32 {
    20
}

fn default_reason_ttl_secs() -> u64 {
    300
}

fn default_generation_timeout_secs() -> u64 {
    8
}

fn default_search_timeout_secs() -> u64 {
    5
}

fn default_intent_timeout_secs() -> u64 {
    5
}

fn default_embed_timeout_secs() -> u64 {
    30
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_max_tokens() -> u32 {
    200
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            database_url: default_database_url(),
            engine: EngineConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pool_size: default_pool_size(),
            shelf_top_k: default_shelf_top_k(),
            query_top_k: default_query_top_k(),
            genre_match_limit: default_genre_match_limit(),
            max_pool: default_max_pool(),
            diversity_window: default_diversity_window(),
            reason_ttl_secs: default_reason_ttl_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
            search_timeout_secs: default_search_timeout_secs(),
            intent_timeout_secs: default_intent_timeout_secs(),
            embed_timeout_secs: default_embed_timeout_secs(),
            rng_seed: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            provider: default_embedding_provider(),
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            provider: default_generation_provider(),
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_generation_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: BOOKREC_LOG_LEVEL=debug overrides log_level in bookrec.toml
    pub fn load() -> Result<Config, BookrecError> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("bookrec.toml"))
            .merge(Env::prefixed("BOOKREC_").split("__"))
            .extract()
            .map_err(|e| BookrecError::Config(format!("Failed to load config: {}", e)))
    }
}
