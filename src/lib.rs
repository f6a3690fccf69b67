//! # redflag-core
//!
//! Conversational deception analysis over a structured-generation engine.
//!
//! ## Core Components
//!
//! - **Signature**: declared input/output shapes, validation and coercion
//! - **Prompt**: single-pass template rendering with conditional sections
//! - **Module**: `Predict`, one validated engine round-trip per call
//! - **Tool**: tools the engine may call, including the clarifying question
//! - **Analysis**: `DeceptionAnalyzer`, verdicts and clarifying questions
//! - **Refine**: `PromptRefiner`, feedback-driven prompt revision
//! - **Conversation / Session**: append-only history and a thread helper
//!
//! ## Example
//!
//! ```
//! use redflag_core::{Conversation, DeceptionAnalyzer, ScriptedEngine, Verdict};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let engine = Arc::new(ScriptedEngine::respond_with(json!({
//!     "analysis": "- \"I was busy\" → 🚩 vague",
//!     "verdict": "🟨 Unclear / Mixed",
//!     "clarifyingQuestion": "Busy with what?"
//! })));
//! let analyzer = DeceptionAnalyzer::new(engine);
//! let mut conversation = Conversation::new(&analyzer);
//!
//! let result = conversation.send("I was busy").await.unwrap();
//! assert_eq!(result.verdict, Verdict::Unclear);
//! assert_eq!(conversation.history().len(), 2);
//! # });
//! ```

pub mod analysis;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod module;
pub mod prompt;
pub mod refine;
pub mod session;
pub mod signature;
pub mod tool;

// Re-exports for convenience
pub use analysis::{
    AnalysisRequest, AnalysisResult, AnalyzeText, DeceptionAnalyzer, Verdict, ANALYSIS_TEMPLATE,
};
pub use conversation::{ConversationHistory, Role, Turn};
pub use error::{Error, ErrorClass, Result};
pub use llm::{
    AnthropicEngine, ClientConfig, GenerationEngine, GenerationRequest, GenerationResponse,
    ScriptedEngine, TokenUsage,
};
pub use module::{ModuleConfig, Predict, Prediction};
pub use prompt::PromptTemplate;
pub use refine::{
    ImprovePromptTemplate, PromptRefiner, RefinementRequest, RefinementResult,
    BASE_ANALYSIS_PROMPT,
};
pub use session::Conversation;
pub use signature::{FieldSpec, FieldType, Signature, ValidationError};
pub use tool::{ClarifyingQuestionTool, Tool, ToolDefinition, ToolInvocation, ToolRegistry};
