/// OpenAI-compatible text generation provider
///
/// Calls any OpenAI-compatible Chat Completions API with reqwest. The
/// base_url is configurable — supports OpenAI and compatible endpoints.
/// Requires an API key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerationError, TextGenerator};

// --- HTTP request/response structs ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// OpenAI-compatible text generator.
pub struct OpenAITextGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAITextGenerator {
    /// Create a new OpenAITextGenerator.
    ///
    /// # Errors
    /// Returns `GenerationError::NotConfigured` if api_key is empty.
    pub fn new(base_url: String, api_key: String, model: String) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::NotConfigured(
                "API key is required when the generation provider is 'openai'. \
                 Set BOOKREC_GENERATION__API_KEY or generation.api_key in bookrec.toml"
                    .to_string(),
            ));
        }

        Ok(OpenAITextGenerator {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        })
    }
}

/// Strip one pair of matching surrounding quotes, if present. Models often
/// wrap short completions in quotation marks.
fn strip_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('「', '」')] {
        if trimmed.len() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
            let mut chars = trimmed.chars();
            chars.next();
            chars.next_back();
            return chars.as_str();
        }
    }
    trimmed
}

#[async_trait]
impl TextGenerator for OpenAITextGenerator {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Generation(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(GenerationError::Api {
                status,
                message: body,
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            GenerationError::Generation(format!("Failed to parse chat response: {}", e))
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                GenerationError::Generation("API returned empty choices list".to_string())
            })?;

        Ok(strip_quotes(&content).to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes_double() {
        assert_eq!(strip_quotes("\"warm and wise\""), "warm and wise");
    }

    #[test]
    fn test_strip_quotes_untouched() {
        assert_eq!(strip_quotes("warm \"and\" wise"), "warm \"and\" wise");
    }

    #[test]
    fn test_strip_quotes_trims_whitespace() {
        assert_eq!(strip_quotes("  plain text \n"), "plain text");
    }
}
