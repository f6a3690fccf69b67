//! Predict wrapper for executing signatures against an engine.
//!
//! One invocation is exactly one engine round-trip:
//! 1. conform inputs and render the prompt
//! 2. hand prompt, output shape and tools to the engine
//! 3. conform the raw output and decode it

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::ModuleConfig;
use crate::error::Result;
use crate::llm::{GenerationEngine, GenerationRequest, TokenUsage};
use crate::signature::Signature;
use crate::tool::{ToolInvocation, ToolRegistry};

/// Validated outputs plus what happened while producing them.
#[derive(Debug, Clone)]
pub struct Prediction<O> {
    /// Conformed, typed outputs
    pub outputs: O,
    /// Tool calls the engine made
    pub tool_invocations: Vec<ToolInvocation>,
    /// Token usage
    pub usage: TokenUsage,
    /// Model that answered
    pub model: String,
}

/// A module that predicts outputs for a given signature.
///
/// # Example
///
/// ```ignore
/// use redflag_core::module::Predict;
///
/// let predictor = Predict::<MySignature>::new(engine).with_tools(tools);
/// let prediction = predictor.invoke(&inputs).await?;
/// ```
pub struct Predict<S: Signature> {
    _phantom: PhantomData<S>,
    engine: Arc<dyn GenerationEngine>,
    tools: Arc<ToolRegistry>,
    config: ModuleConfig,
    name: String,
}

impl<S: Signature> Predict<S> {
    /// Create a Predict module with no tools.
    pub fn new(engine: Arc<dyn GenerationEngine>) -> Self {
        Self {
            _phantom: PhantomData,
            engine,
            tools: Arc::new(ToolRegistry::new()),
            config: ModuleConfig::default(),
            name: format!("Predict<{}>", S::name()),
        }
    }

    /// Offer these tools to the engine.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the module name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Name used in tracing spans.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tools offered to the engine.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Current configuration.
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    fn request(&self, prompt: String) -> GenerationRequest {
        let mut request = GenerationRequest::new(prompt, S::output_fields())
            .with_tools(self.tools.clone())
            .with_temperature(self.config.temperature);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    /// Run one validated generation.
    #[instrument(skip(self, inputs), fields(module = %self.name))]
    pub async fn invoke(&self, inputs: &S::Inputs) -> Result<Prediction<S::Outputs>> {
        let prompt = S::render_prompt(inputs)?;
        debug!(prompt_len = prompt.len(), tools = self.tools.len(), "Prompt rendered");

        let request = self.request(prompt);
        let request_id = request.request_id;
        let response = self.engine.generate(request).await?;

        for invocation in &response.tool_invocations {
            debug!(
                %request_id,
                tool = %invocation.tool,
                success = invocation.is_success(),
                "Engine called tool"
            );
        }

        let outputs = S::parse_output(response.output).map_err(|e| {
            warn!(
                %request_id,
                field = e.field().unwrap_or("$"),
                error = %e,
                "Engine output rejected"
            );
            e
        })?;

        Ok(Prediction {
            outputs,
            tool_invocations: response.tool_invocations,
            usage: response.usage,
            model: response.model,
        })
    }
}

impl<S: Signature> Clone for Predict<S> {
    fn clone(&self) -> Self {
        Self {
            _phantom: PhantomData,
            engine: self.engine.clone(),
            tools: self.tools.clone(),
            config: self.config.clone(),
            name: self.name.clone(),
        }
    }
}
