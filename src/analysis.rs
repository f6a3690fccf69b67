//! Deception analysis over a message and its conversation so far.
//!
//! [`DeceptionAnalyzer::analyze`] is the core entry point. It rejects blank
//! input, renders the analysis template with the history transcript, offers
//! the engine the clarifying-question tool, and returns only fully validated
//! results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::conversation::{ConversationHistory, Role};
use crate::error::{Error, Result};
use crate::llm::GenerationEngine;
use crate::module::{ModuleConfig, Predict, Prediction};
use crate::signature::{conform, FieldSpec, FieldType, Signature};
use crate::tool::{ClarifyingQuestionTool, ToolRegistry};

/// Instruction template for a single analysis turn.
pub const ANALYSIS_TEMPLATE: &str = r#"You are a deception analysis AI, helping couples and lovers settle arguments by identifying potential red flags in messages.

A user will paste a personal message, email, or chat log. Your task is to:

1. Detect signs of dishonesty, manipulation, evasion, or gaslighting.
2. Highlight suspicious phrases.
3. Provide short reasoning for each flag.
4. If the message is unclear or lacks the details needed for a proper analysis, use the askClarifyingQuestion tool to ask a question that would help you perform a better analysis, and put that question in clarifyingQuestion. Otherwise leave clarifyingQuestion empty.
5. Give a final verdict, exactly one of:
   - "🟥 Likely Dishonest"
   - "🟨 Unclear / Mixed"
   - "🟩 Likely Honest"

Avoid being overly dramatic. Keep it short and Gen Z-friendly. Write the analysis like this:

🧠 Analysis:
- "I was busy" → 🚩 Might be an excuse, vague wording.
- "You always overthink" → 🚩 Could be manipulative gaslighting.

{{#history}}
Conversation History:
{{history}}

{{/history}}
Now analyze this message:
{{userText}}
"#;

/// Final judgement on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "🟥 Likely Dishonest")]
    LikelyDishonest,
    #[serde(rename = "🟨 Unclear / Mixed")]
    Unclear,
    #[serde(rename = "🟩 Likely Honest")]
    LikelyHonest,
}

impl Verdict {
    /// Every verdict, most to least suspicious.
    pub const ALL: [Verdict; 3] = [
        Verdict::LikelyDishonest,
        Verdict::Unclear,
        Verdict::LikelyHonest,
    ];

    /// Canonical string, glyph included.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::LikelyDishonest => "🟥 Likely Dishonest",
            Verdict::Unclear => "🟨 Unclear / Mixed",
            Verdict::LikelyHonest => "🟩 Likely Honest",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Verdict::LikelyDishonest => "🟥",
            Verdict::Unclear => "🟨",
            Verdict::LikelyHonest => "🟩",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::LikelyDishonest => "Likely Dishonest",
            Verdict::Unclear => "Unclear / Mixed",
            Verdict::LikelyHonest => "Likely Honest",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = Error;

    /// Exact match on the canonical string only.
    fn from_str(s: &str) -> Result<Self> {
        Verdict::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::GenerationContractViolation {
                field: Some("verdict".to_string()),
                message: format!("'{}' is not a recognised verdict", s),
            })
    }
}

/// Validated outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Flagged phrases with reasoning
    pub analysis: String,
    pub verdict: Verdict,
    /// Follow-up question, empty when none is needed
    pub clarifying_question: String,
}

impl AnalysisResult {
    /// Whether the analyzer is waiting on more detail.
    pub fn needs_clarification(&self) -> bool {
        !self.clarifying_question.trim().is_empty()
    }

    /// The assistant turn recorded into history.
    pub fn summary(&self) -> String {
        let mut out = format!("{}\n\nVerdict: {}", self.analysis, self.verdict);
        if self.needs_clarification() {
            out.push_str("\n\nQuestion: ");
            out.push_str(&self.clarifying_question);
        }
        out
    }
}

/// Inbound request as it arrives at the transport boundary.
///
/// Every decode goes through [`AnalysisRequest::from_wire`], serde included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct AnalysisRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<ConversationHistory>,
}

#[derive(Deserialize)]
struct WireRequest {
    text: String,
    #[serde(default)]
    history: Option<ConversationHistory>,
}

impl AnalysisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            history: None,
        }
    }

    pub fn with_history(mut self, history: ConversationHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Decode an untyped request body.
    ///
    /// A missing `text` decodes as empty (rejected later as
    /// [`Error::EmptyInput`]); any other shape problem is a
    /// [`Error::SchemaViolation`] naming the field.
    pub fn from_wire(body: &Value) -> Result<Self> {
        let fields = vec![
            FieldSpec::new("text", FieldType::String).with_default(""),
            FieldSpec::new("history", history_type()).optional(),
        ];
        let conformed = conform(body, &fields).map_err(|e| Error::from_input_validation(&e))?;
        let wire: WireRequest = serde_json::from_value(conformed)?;
        Ok(Self {
            text: wire.text,
            history: wire.history,
        })
    }
}

impl TryFrom<Value> for AnalysisRequest {
    type Error = Error;

    fn try_from(body: Value) -> Result<Self> {
        Self::from_wire(&body)
    }
}

/// Signature inputs for one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeTextInputs {
    #[serde(rename = "userText")]
    pub user_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<ConversationHistory>,
}

fn history_type() -> FieldType {
    FieldType::list(FieldType::object(vec![
        FieldSpec::new(
            "role",
            FieldType::enum_of(Role::ALL.iter().map(|r| r.as_str())),
        ),
        FieldSpec::new("content", FieldType::String),
    ]))
}

/// Deception-analysis signature.
pub struct AnalyzeText;

impl Signature for AnalyzeText {
    type Inputs = AnalyzeTextInputs;
    type Outputs = AnalysisResult;

    fn template() -> &'static str {
        ANALYSIS_TEMPLATE
    }

    fn input_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("userText", FieldType::String)
                .with_description("The text to analyze for deception.")
                .non_empty(),
            FieldSpec::new("history", history_type())
                .with_description("The history of the conversation.")
                .optional(),
        ]
    }

    fn output_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("analysis", FieldType::String)
                .with_description("The analysis, highlighting suspicious phrases and reasoning."),
            FieldSpec::new(
                "verdict",
                FieldType::enum_of(Verdict::ALL.iter().map(|v| v.as_str())),
            )
            .with_description("The final verdict on the likelihood of dishonesty."),
            FieldSpec::new("clarifyingQuestion", FieldType::String).with_description(
                "A clarifying question to ask the user, or an empty string if none is needed.",
            ),
        ]
    }

    fn name() -> &'static str {
        "AnalyzeText"
    }
}

/// Runs deception analysis against a generation engine.
#[derive(Clone)]
pub struct DeceptionAnalyzer {
    predict: Predict<AnalyzeText>,
}

impl DeceptionAnalyzer {
    /// Create an analyzer offering the clarifying-question tool.
    pub fn new(engine: Arc<dyn GenerationEngine>) -> Self {
        let tools = ToolRegistry::new().with_tool(Arc::new(ClarifyingQuestionTool));
        Self {
            predict: Predict::new(engine)
                .with_tools(Arc::new(tools))
                .with_name("deception-analysis"),
        }
    }

    /// Set the module configuration.
    pub fn with_config(mut self, config: ModuleConfig) -> Self {
        self.predict = self.predict.with_config(config);
        self
    }

    /// Analyze `user_text` in the context of `history`.
    ///
    /// Blank text fails with [`Error::EmptyInput`] before the engine is
    /// called. The history is only read.
    pub async fn analyze(
        &self,
        user_text: &str,
        history: Option<&ConversationHistory>,
    ) -> Result<AnalysisResult> {
        self.analyze_detailed(user_text, history)
            .await
            .map(|p| p.outputs)
    }

    /// Same as [`DeceptionAnalyzer::analyze`], keeping tool calls and usage.
    #[instrument(
        skip(self, user_text, history),
        fields(text_len = user_text.len(), history_len = history.map_or(0, |h| h.len()))
    )]
    pub async fn analyze_detailed(
        &self,
        user_text: &str,
        history: Option<&ConversationHistory>,
    ) -> Result<Prediction<AnalysisResult>> {
        if user_text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        let inputs = AnalyzeTextInputs {
            user_text: user_text.to_string(),
            history: history.filter(|h| !h.is_empty()).cloned(),
        };

        let prediction = self.predict.invoke(&inputs).await?;
        info!(
            verdict = %prediction.outputs.verdict,
            clarifying = prediction.outputs.needs_clarification(),
            tool_calls = prediction.tool_invocations.len(),
            "Analysis complete"
        );
        Ok(prediction)
    }

    /// Analyze a boundary request.
    pub async fn analyze_request(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        self.analyze(&request.text, request.history.as_ref()).await
    }
}
