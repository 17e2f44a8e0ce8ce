// OpenAI embeddings and chat completions over plain HTTP
// Provider failures (auth, rate limit, network) are propagated to the
// caller as-is; there is no retry or backoff at this layer.

#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::{LibrarianError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const CHAT_TEMPERATURE: f32 = 0.2;

/// Anything that can turn text into embedding vectors.
pub trait Embedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input)?;
        vectors
            .pop()
            .ok_or_else(|| LibrarianError::Provider("Empty embedding response".to_string()))
    }
}

/// Anything that can run one chat completion turn.
///
/// Kept as an explicit seam so the conversation orchestrator can be tested
/// with scripted responses instead of a live model.
pub trait ChatCompleter {
    fn complete(&self, messages: &[ChatMessage], tools: Option<&[Tool]>) -> Result<ChatMessage>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Result of a local tool execution, answering the given tool call.
    #[inline]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

/// A callable tool declared to the model.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    organization: Option<String>,
    embedding_model: String,
    chat_model: String,
    agent: ureq::Agent,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            LibrarianError::Config("OPENAI_API_KEY is not set".to_string())
        })?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        let mut base_url = config.api_base.clone();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            base_url,
            api_key,
            organization: config.organization.clone(),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[inline]
    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    /// Minimal chat round-trip used by the health diagnostic.
    #[inline]
    pub fn chat_smoke_test(&self) -> Result<()> {
        let messages = [ChatMessage::system("ping"), ChatMessage::user("ping")];
        self.complete(&messages, None).map(|_| ())
    }

    fn post_json(&self, path: &str, body: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {} ({} bytes)", url, body.len());

        let mut request = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key));
        if let Some(org) = &self.organization {
            request = request.header("OpenAI-Organization", org);
        }

        match request.send(body) {
            Ok(mut response) => response
                .body_mut()
                .read_to_string()
                .map_err(|e| LibrarianError::Provider(format!("Failed to read response: {}", e))),
            Err(ureq::Error::StatusCode(status)) => {
                warn!("Provider returned HTTP {} for {}", status, url);
                Err(LibrarianError::Provider(format!(
                    "Provider request to {} failed: HTTP {}",
                    path, status
                )))
            }
            Err(e) => Err(LibrarianError::Provider(format!(
                "Provider request to {} failed: {}",
                path, e
            ))),
        }
    }
}

impl Embedder for OpenAiClient {
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating {} embeddings with model {}",
            texts.len(),
            self.embedding_model
        );

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let body = serde_json::to_string(&request)?;
        let response_text = self.post_json("/embeddings", &body)?;

        let response: EmbeddingResponse = serde_json::from_str(&response_text).map_err(|e| {
            LibrarianError::Provider(format!("Failed to parse embedding response: {}", e))
        })?;

        if response.data.len() != texts.len() {
            return Err(LibrarianError::Provider(format!(
                "Embedding count mismatch: requested {}, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl ChatCompleter for OpenAiClient {
    #[inline]
    fn complete(&self, messages: &[ChatMessage], tools: Option<&[Tool]>) -> Result<ChatMessage> {
        debug!(
            "Chat completion with model {} ({} messages, tools: {})",
            self.chat_model,
            messages.len(),
            tools.is_some()
        );

        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            tools,
            tool_choice: tools.map(|_| "auto"),
            temperature: CHAT_TEMPERATURE,
        };
        let body = serde_json::to_string(&request)?;
        let response_text = self.post_json("/chat/completions", &body)?;

        let mut response: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            LibrarianError::Provider(format!("Failed to parse chat response: {}", e))
        })?;

        if response.choices.is_empty() {
            return Err(LibrarianError::Provider(
                "Chat response contained no choices".to_string(),
            ));
        }
        Ok(response.choices.swap_remove(0).message)
    }
}
