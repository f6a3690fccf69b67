//! Generation engine trait and the Anthropic Messages implementation.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::signature::{describe_output, parse_structured_output};
use crate::tool::{ToolInvocation, ToolRegistry};

use super::types::{GenerationRequest, GenerationResponse, StopReason, TokenUsage};

/// Opaque structured-generation capability.
///
/// An engine renders nothing and validates nothing: it takes a finished
/// prompt, resolves any tool calls against `request.tools` within the call,
/// and returns the raw structured output.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Run one generation, including nested tool calls.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;
}

/// Configuration for the HTTP engine.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Default model
    #[serde(default)]
    pub default_model: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Tool-use rounds allowed before giving up
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Maximum tokens per response when the request sets none
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tool_rounds() -> u32 {
    4
}

fn default_max_tokens() -> u32 {
    4096
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: None,
            timeout_secs: default_timeout_secs(),
            max_tool_rounds: default_max_tool_rounds(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);

    // Proxy auto-detection can fail in sandboxed environments.
    match Client::builder().timeout(timeout).build() {
        Ok(client) => Ok(client),
        Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e))),
    }
}

/// Engine backed by the Anthropic Messages API.
pub struct AnthropicEngine {
    config: ClientConfig,
    http: Client,
}

impl AnthropicEngine {
    const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    const DEFAULT_MODEL: &'static str = "claude-3-5-sonnet-20241022";
    const API_VERSION: &'static str = "2023-06-01";
    const SYSTEM_PROMPT: &'static str =
        "Answer with a single JSON object that matches the required output. \
         Call a tool only when the instructions ask for it.";

    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("API key is empty".to_string()));
        }
        let http = build_http_client(config.timeout_secs)?;

        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    async fn send(&self, api_request: &AnthropicRequest) -> Result<AnthropicResponse> {
        let url = format!("{}/v1/messages", self.base_url());

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(api_request)
            .send()
            .await
            .map_err(|e| Error::engine_unavailable_with_source("HTTP request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::engine_unavailable_with_source("Failed to read response", e))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<AnthropicError>(&body) {
                return Err(Error::engine_unavailable(format!(
                    "Anthropic API error ({}): {}",
                    error.error.error_type, error.error.message
                )));
            }
            return Err(Error::engine_unavailable(format!(
                "Anthropic API error ({}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::engine_unavailable_with_source("Failed to parse response", e))
    }
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

impl AnthropicMessage {
    fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }

    fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

fn tool_declarations(registry: &ToolRegistry) -> Vec<AnthropicTool> {
    registry
        .definitions()
        .into_iter()
        .map(|def| AnthropicTool {
            input_schema: def.input_schema(),
            name: def.name,
            description: def.description,
        })
        .collect()
}

fn user_prompt(request: &GenerationRequest) -> String {
    format!(
        "{}\n\n{}",
        request.prompt.trim_end(),
        describe_output(&request.output_fields)
    )
}

fn text_of(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Run every `tool_use` block and build the matching `tool_result` blocks.
fn run_tools(
    blocks: &[ContentBlock],
    registry: &ToolRegistry,
    invocations: &mut Vec<ToolInvocation>,
) -> Vec<ContentBlock> {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        })
        .map(|(id, name, input)| {
            let result = registry.invoke(name, input.clone());
            debug!(tool = %name, success = result.is_ok(), "Tool call resolved");
            invocations.push(ToolInvocation::from_result(
                id.clone(),
                name.clone(),
                input.clone(),
                &result,
            ));
            let (content, is_error) = match result {
                Ok(Value::String(s)) => (s, false),
                Ok(other) => (other.to_string(), false),
                Err(e) => (e.to_string(), true),
            };
            ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content,
                is_error,
            }
        })
        .collect()
}

#[async_trait]
impl GenerationEngine for AnthropicEngine {
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let model = request
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());

        let mut api_request = AnthropicRequest {
            model,
            messages: vec![AnthropicMessage::user(vec![ContentBlock::Text {
                text: user_prompt(&request),
            }])],
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system: Self::SYSTEM_PROMPT.to_string(),
            temperature: request.temperature,
            tools: tool_declarations(&request.tools),
        };

        let mut invocations = Vec::new();
        let mut usage = TokenUsage::default();
        let mut rounds = 0;

        loop {
            let response = self.send(&api_request).await?;
            usage.add(TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            });

            let stop_reason = response
                .stop_reason
                .as_deref()
                .map(StopReason::parse)
                .unwrap_or(StopReason::EndTurn);

            if stop_reason == StopReason::ToolUse {
                if rounds >= self.config.max_tool_rounds {
                    warn!(rounds, "Tool-use round limit reached");
                    return Err(Error::contract_violation(format!(
                        "engine kept calling tools after {} rounds",
                        rounds
                    )));
                }
                rounds += 1;

                let results = run_tools(&response.content, &request.tools, &mut invocations);
                let replay: Vec<ContentBlock> = response
                    .content
                    .into_iter()
                    .filter(|b| !matches!(b, ContentBlock::Unsupported))
                    .collect();
                api_request.messages.push(AnthropicMessage::assistant(replay));
                api_request.messages.push(AnthropicMessage::user(results));
                continue;
            }

            if stop_reason == StopReason::MaxTokens {
                warn!("Response truncated at max_tokens");
            }

            let output = parse_structured_output(&text_of(&response.content))?;

            info!(
                model = %response.model,
                tool_calls = invocations.len(),
                tokens = usage.total(),
                "Generation complete"
            );

            return Ok(GenerationResponse {
                output,
                tool_invocations: invocations,
                model: response.model,
                usage,
                timestamp: Utc::now(),
            });
        }
    }
}
