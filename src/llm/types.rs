//! Types for the generation engine boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::signature::FieldSpec;
use crate::tool::{ToolInvocation, ToolRegistry};

/// One structured-generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Correlation id for logs
    pub request_id: Uuid,
    /// Fully rendered prompt
    pub prompt: String,
    /// Declared output shape
    pub output_fields: Vec<FieldSpec>,
    /// Tools the engine may call
    pub tools: Arc<ToolRegistry>,
    /// Model override
    pub model: Option<String>,
    /// Temperature (0.0 - 1.0)
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, output_fields: Vec<FieldSpec>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            prompt: prompt.into(),
            output_fields,
            tools: Arc::new(ToolRegistry::new()),
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Sum usage across tool-use rounds.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Raw engine output plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Unvalidated structured output
    pub output: Value,
    /// Tool calls made while producing the output
    pub tool_invocations: Vec<ToolInvocation>,
    /// Model used
    pub model: String,
    /// Token usage across all rounds
    pub usage: TokenUsage,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

impl GenerationResponse {
    pub fn new(output: Value, model: impl Into<String>) -> Self {
        Self {
            output,
            tool_invocations: Vec::new(),
            model: model.into(),
            usage: TokenUsage::default(),
            timestamp: Utc::now(),
        }
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

impl StopReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            "tool_use" => Self::ToolUse,
            _ => Self::EndTurn,
        }
    }
}
