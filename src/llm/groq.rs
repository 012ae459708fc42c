//! Groq provider implementation
//!
//! Groq exposes an OpenAI-compatible chat-completions API, so the wire
//! format is the familiar role/content/tool_calls/tool_call_id shape and
//! `arguments` travels as a JSON-encoded string.

use super::types::{ModelReply, ToolSpec};
use super::{ModelClient, ModelError};
use crate::thread::{Message, Role, ToolCall};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Configuration for the Groq client
#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl GroqConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GROQ_API_KEY").ok(),
            model: std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("GROQ_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        }
    }
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Groq service implementation
pub struct GroqClient {
    client: Client,
    config: GroqConfig,
}

impl GroqClient {
    pub fn new(config: GroqConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn translate_request(&self, messages: &[Message], tools: &[ToolSpec]) -> GroqRequest {
        let messages = messages.iter().map(translate_message).collect();

        let tools = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| WireTool {
                        r#type: "function".to_string(),
                        function: WireFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        };

        GroqRequest {
            model: self.config.model.clone(),
            messages,
            tools,
            temperature: 0.0,
        }
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ModelError {
        match status.as_u16() {
            401 | 403 => ModelError::auth(format!("Authentication failed: {body}")),
            429 => ModelError::rate_limit(format!("Rate limited: {body}")),
            400 => ModelError::invalid_request(format!("Invalid request: {body}")),
            500..=599 => ModelError::server_error(format!("Server error: {body}")),
            _ => ModelError::unknown(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl ModelClient for GroqClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ModelError::auth("GROQ_API_KEY is not configured"))?;

        let request = self.translate_request(messages, tools);

        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    ModelError::network(format!("Connection failed: {e}"))
                } else {
                    ModelError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let parsed: GroqResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::unknown(format!("Failed to parse response: {e}")))?;

        normalize_response(parsed)
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

fn translate_message(msg: &Message) -> WireMessage {
    // Assistant tool-request messages may have no text; the wire format
    // wants content omitted rather than empty in that case.
    let content = if msg.content.is_empty() && !msg.tool_calls.is_empty() {
        None
    } else {
        Some(msg.content.clone())
    };

    let tool_calls = if msg.tool_calls.is_empty() {
        None
    } else {
        Some(
            msg.tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    r#type: "function".to_string(),
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: serde_json::to_string(&tc.arguments)
                            .unwrap_or_else(|_| "{}".to_string()),
                    },
                })
                .collect(),
        )
    };

    WireMessage {
        role: msg.role,
        content,
        tool_calls,
        tool_call_id: msg.tool_call_id.clone(),
    }
}

fn normalize_response(resp: GroqResponse) -> Result<ModelReply, ModelError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::unknown("No choices in response"))?;

    let calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter(|tc| !tc.function.name.is_empty())
        .map(|tc| {
            let arguments = serde_json::from_str(&tc.function.arguments)
                .unwrap_or_else(|_| serde_json::json!({}));
            ToolCall::new(tc.id, tc.function.name, arguments)
        })
        .collect();

    Ok(ModelReply::from_parts(choice.message.content, calls))
}

// Groq API wire types

#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    r#type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqReplyMessage,
}

#[derive(Debug, Deserialize)]
struct GroqReplyMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}
