//! Prompt refinement: revise an instruction template from user feedback.
//!
//! Stateless. Each call is one engine round-trip with no tools.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::llm::GenerationEngine;
use crate::module::{ModuleConfig, Predict};
use crate::signature::{FieldSpec, FieldType, Signature};

/// The analysis instructions users refine from the feedback box.
pub const BASE_ANALYSIS_PROMPT: &str = r#"You are a deception analysis AI.

A user will paste a personal message, email, or chat log. Your task is to:

1. Detect signs of dishonesty, manipulation, evasion, or gaslighting.
2. Highlight suspicious phrases.
3. Provide short reasoning for each flag.
4. Give a final verdict:
   - "🟥 Likely Dishonest"
   - "🟨 Unclear / Mixed"
   - "🟩 Likely Honest"

Avoid being overly dramatic. Keep it short, Gen Z-friendly, and a little sarcastic if the tone fits. Format your response like this:

🧠 Analysis:
- "I was busy" → 🚩 Might be an excuse, vague wording.
- "You always overthink" → 🚩 Could be manipulative gaslighting.

📊 Verdict: 🟥 Likely Dishonest"#;

const REFINEMENT_TEMPLATE: &str = r#"You are an AI prompt engineer. Your task is to improve a prompt template based on user feedback.

Original Prompt:
{{originalPrompt}}

Feedback:
{{feedback}}

Instructions:
1. Analyze the feedback to identify what it implies is wrong with the original prompt.
2. Modify the prompt to address the feedback, focusing on clarity, accuracy, and effectiveness.
3. Explain the changes you made and why they will improve the prompt's performance.
4. Return the improved prompt and your reasoning.
"#;

/// Prompt plus the feedback to apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementRequest {
    pub original_prompt: String,
    pub feedback: String,
}

/// Revised prompt and why it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementResult {
    pub improved_prompt: String,
    pub reasoning: String,
}

/// Prompt-refinement signature.
pub struct ImprovePromptTemplate;

impl Signature for ImprovePromptTemplate {
    type Inputs = RefinementRequest;
    type Outputs = RefinementResult;

    fn template() -> &'static str {
        REFINEMENT_TEMPLATE
    }

    fn input_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("originalPrompt", FieldType::String)
                .with_description("The original prompt template to be improved.")
                .non_empty(),
            FieldSpec::new("feedback", FieldType::String)
                .with_description("User feedback on the performance of the original prompt.")
                .non_empty(),
        ]
    }

    fn output_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("improvedPrompt", FieldType::String)
                .with_description("The improved prompt template."),
            FieldSpec::new("reasoning", FieldType::String)
                .with_description("Explanation of the changes made to the prompt."),
        ]
    }

    fn name() -> &'static str {
        "ImprovePromptTemplate"
    }
}

/// Revises prompts against a generation engine.
#[derive(Clone)]
pub struct PromptRefiner {
    predict: Predict<ImprovePromptTemplate>,
}

impl PromptRefiner {
    pub fn new(engine: Arc<dyn GenerationEngine>) -> Self {
        Self {
            predict: Predict::new(engine).with_name("prompt-refinement"),
        }
    }

    /// Set the module configuration.
    pub fn with_config(mut self, config: ModuleConfig) -> Self {
        self.predict = self.predict.with_config(config);
        self
    }

    /// Revise `original_prompt` according to `feedback`.
    ///
    /// Blank feedback fails with [`Error::EmptyInput`] before the engine is
    /// called; a blank prompt is a [`Error::SchemaViolation`].
    #[instrument(
        skip(self, original_prompt, feedback),
        fields(prompt_len = original_prompt.len(), feedback_len = feedback.len())
    )]
    pub async fn refine(&self, original_prompt: &str, feedback: &str) -> Result<RefinementResult> {
        if feedback.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        let request = RefinementRequest {
            original_prompt: original_prompt.to_string(),
            feedback: feedback.to_string(),
        };
        let result = self.predict.invoke(&request).await?.outputs;

        info!(
            improved_len = result.improved_prompt.len(),
            "Prompt refinement complete"
        );
        Ok(result)
    }

    /// Refine [`BASE_ANALYSIS_PROMPT`].
    pub async fn refine_default(&self, feedback: &str) -> Result<RefinementResult> {
        self.refine(BASE_ANALYSIS_PROMPT, feedback).await
    }

    /// Refine a boundary request.
    pub async fn refine_request(&self, request: &RefinementRequest) -> Result<RefinementResult> {
        self.refine(&request.original_prompt, &request.feedback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedEngine;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Stub that echoes the original prompt back with example bullets added.
    fn bullet_appender() -> Arc<ScriptedEngine> {
        Arc::new(ScriptedEngine::from_fn(|req| {
            let original = req
                .prompt
                .split_once("Original Prompt:\n")
                .and_then(|(_, rest)| rest.split_once("\n\nFeedback:"))
                .map(|(original, _)| original.to_string())
                .unwrap_or_default();
            Ok(json!({
                "improvedPrompt": format!(
                    "{}\nExamples:\n- \"I was busy\" is vague.\n- \"You overthink\" deflects.",
                    original
                ),
                "reasoning": "Added concrete examples because the feedback asked for them."
            }))
        }))
    }

    #[tokio::test]
    async fn test_refine_adds_lines_and_reasoning() {
        let engine = bullet_appender();
        let refiner = PromptRefiner::new(engine.clone());

        let result = refiner
            .refine("Detect lies.", "Too vague, add examples")
            .await
            .unwrap();

        assert!(result.improved_prompt.lines().count() > "Detect lies.".lines().count());
        assert!(result.improved_prompt.starts_with("Detect lies.\n"));
        assert!(!result.reasoning.is_empty());
        assert_eq!(engine.call_count(), 1);

        let prompt = engine.last_prompt().await.unwrap();
        assert!(prompt.contains("Original Prompt:\nDetect lies.\n\nFeedback:\nToo vague, add examples\n"));
    }

    #[tokio::test]
    async fn test_blank_feedback_never_reaches_engine() {
        let engine = bullet_appender();
        let refiner = PromptRefiner::new(engine.clone());

        let err = refiner.refine("Detect lies.", "  ").await.unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_prompt_is_schema_violation() {
        let engine = bullet_appender();
        let err = PromptRefiner::new(engine.clone())
            .refine("", "more examples")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SchemaViolation { .. }));
        assert_eq!(err.field(), Some("originalPrompt"));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refine_default_uses_base_prompt() {
        let engine = bullet_appender();
        let result = PromptRefiner::new(engine.clone())
            .refine_default("Be less sarcastic")
            .await
            .unwrap();

        assert!(result.improved_prompt.starts_with(BASE_ANALYSIS_PROMPT));
        let prompt = engine.last_prompt().await.unwrap();
        assert!(prompt.contains("📊 Verdict: 🟥 Likely Dishonest"));
    }

    #[tokio::test]
    async fn test_tools_are_not_offered() {
        let engine = Arc::new(ScriptedEngine::from_fn(|req| {
            assert!(req.tools.is_empty());
            Ok(json!({"improvedPrompt": "p", "reasoning": "r"}))
        }));
        PromptRefiner::new(engine).refine("a", "b").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_reasoning_is_contract_violation() {
        let engine = Arc::new(ScriptedEngine::respond_with(json!({"improvedPrompt": "p"})));
        let err = PromptRefiner::new(engine).refine("a", "b").await.unwrap_err();
        assert!(matches!(err, Error::GenerationContractViolation { .. }));
        assert_eq!(err.field(), Some("reasoning"));
    }

    #[tokio::test]
    async fn test_refine_request_wire_shape() {
        let request: RefinementRequest = serde_json::from_value(json!({
            "originalPrompt": "Detect lies.",
            "feedback": "shorter"
        }))
        .unwrap();
        let result = PromptRefiner::new(bullet_appender())
            .refine_request(&request)
            .await
            .unwrap();

        let wire = serde_json::to_value(&result).unwrap();
        assert!(wire.get("improvedPrompt").is_some());
        assert!(wire.get("reasoning").is_some());
    }
}
