//! Deterministic engine for tests and offline demos.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::tool::ToolInvocation;

use super::client::GenerationEngine;
use super::types::{GenerationRequest, GenerationResponse, TokenUsage};

type Responder = Arc<dyn Fn(&GenerationRequest) -> Result<Value> + Send + Sync>;

/// Engine that answers from a script instead of a model.
///
/// Scripted tool calls run through the request's registry before the
/// response is produced, the same way a real engine resolves them.
///
/// # Example
///
/// ```
/// use redflag_core::llm::{GenerationEngine, GenerationRequest, ScriptedEngine};
/// use serde_json::json;
///
/// # tokio_test_block(async {
/// let engine = ScriptedEngine::respond_with(json!({"answer": "42"}));
/// let response = engine.generate(GenerationRequest::new("q", vec![])).await.unwrap();
/// assert_eq!(response.output["answer"], "42");
/// assert_eq!(engine.call_count(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct ScriptedEngine {
    responder: Responder,
    tool_calls: Vec<(String, Value)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    invocations: Mutex<Vec<ToolInvocation>>,
}

impl ScriptedEngine {
    /// Always answer with the same output.
    pub fn respond_with(output: Value) -> Self {
        Self::from_fn(move |_| Ok(output.clone()))
    }

    /// Answer by computing the output from the request.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(f),
            tool_calls: Vec::new(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Always fail as an unreachable engine would.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(move |_| Err(Error::engine_unavailable(message.clone())))
    }

    /// Call a tool before answering.
    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: Value) -> Self {
        self.tool_calls.push((name.into(), arguments));
        self
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Most recent prompt, if any.
    pub async fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().await.last().cloned()
    }

    /// Tool calls made across all generations.
    pub async fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.lock().await.clone()
    }
}

#[async_trait]
impl GenerationEngine for ScriptedEngine {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(request.prompt.clone());

        let mut tool_invocations = Vec::with_capacity(self.tool_calls.len());
        for (i, (name, arguments)) in self.tool_calls.iter().enumerate() {
            let result = request.tools.invoke(name, arguments.clone());
            let invocation = ToolInvocation::from_result(
                format!("scripted_{}_{}", call, i),
                name.clone(),
                arguments.clone(),
                &result,
            );
            self.invocations.lock().await.push(invocation.clone());
            tool_invocations.push(invocation);
            result?;
        }

        let output = (self.responder)(&request)?;

        let mut response = GenerationResponse::new(output, "scripted");
        response.tool_invocations = tool_invocations;
        response.usage = TokenUsage {
            input_tokens: (request.prompt.len() / 4) as u64,
            output_tokens: (response.output.to_string().len() / 4) as u64,
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ClarifyingQuestionTool, ToolRegistry};
    use serde_json::json;

    #[tokio::test]
    async fn test_respond_with_counts_and_captures() {
        let engine = ScriptedEngine::respond_with(json!({"ok": "yes"}));

        engine.generate(GenerationRequest::new("first", vec![])).await.unwrap();
        engine.generate(GenerationRequest::new("second", vec![])).await.unwrap();

        assert_eq!(engine.call_count(), 2);
        assert_eq!(engine.prompts().await, vec!["first", "second"]);
        assert_eq!(engine.last_prompt().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_from_fn_sees_request() {
        let engine = ScriptedEngine::from_fn(|req| Ok(json!({ "echo": req.prompt })));
        let response = engine
            .generate(GenerationRequest::new("ping", vec![]))
            .await
            .unwrap();
        assert_eq!(response.output, json!({"echo": "ping"}));
    }

    #[tokio::test]
    async fn test_failing() {
        let engine = ScriptedEngine::failing("offline");
        let err = engine
            .generate(GenerationRequest::new("x", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EngineUnavailable { .. }));
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_tool_call_runs_through_registry() {
        let engine = ScriptedEngine::respond_with(json!({}))
            .with_tool_call("askClarifyingQuestion", json!({"question": "Who texted first?"}));
        let tools = Arc::new(ToolRegistry::new().with_tool(Arc::new(ClarifyingQuestionTool)));

        let response = engine
            .generate(GenerationRequest::new("x", vec![]).with_tools(tools))
            .await
            .unwrap();

        assert_eq!(response.tool_invocations.len(), 1);
        assert_eq!(
            response.tool_invocations[0].output,
            Some(json!("Who texted first?"))
        );
        assert_eq!(engine.invocations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_tool_call_to_missing_tool_fails() {
        let engine = ScriptedEngine::respond_with(json!({})).with_tool_call("nope", json!({}));
        let err = engine
            .generate(GenerationRequest::new("x", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));
    }
}
