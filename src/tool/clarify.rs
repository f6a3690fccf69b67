//! The clarifying-question tool.
//!
//! The engine calls this when a message lacks the detail needed for a
//! confident verdict. The tool hands the question straight back.

use super::{Tool, ToolDefinition};
use crate::error::Result;
use crate::signature::{FieldSpec, FieldType};
use serde_json::Value;

/// Registered tool name.
pub const CLARIFY_TOOL_NAME: &str = "askClarifyingQuestion";

/// Identity tool returning the question it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClarifyingQuestionTool;

impl ClarifyingQuestionTool {
    /// Return the question unchanged.
    pub fn ask(question: &str) -> String {
        question.to_string()
    }
}

impl Tool for ClarifyingQuestionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            CLARIFY_TOOL_NAME,
            "Asks the user a clarifying question to gather more information about the message.",
        )
        .with_input(
            FieldSpec::new("question", FieldType::String)
                .with_description("The clarifying question to ask the user."),
        )
        .with_output(FieldType::String)
    }

    fn call(&self, arguments: Value) -> Result<Value> {
        let question = arguments
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(Value::String(Self::ask(question)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tool::ToolRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_returns_question_verbatim() {
        let registry = ToolRegistry::new().with_tool(Arc::new(ClarifyingQuestionTool));
        let out = registry
            .invoke(
                CLARIFY_TOOL_NAME,
                json!({"question": "What time did this happen?"}),
            )
            .unwrap();
        assert_eq!(out, json!("What time did this happen?"));
    }

    #[test]
    fn test_ask_is_identity() {
        for q in ["", "Who?", "  spaced  ", "Was it 🟥 or 🟩?"] {
            assert_eq!(ClarifyingQuestionTool::ask(q), q);
        }
    }

    #[test]
    fn test_missing_question_is_schema_violation() {
        let registry = ToolRegistry::new().with_tool(Arc::new(ClarifyingQuestionTool));
        let err = registry.invoke(CLARIFY_TOOL_NAME, json!({})).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { .. }));
        assert_eq!(err.field(), Some("question"));
    }

    #[test]
    fn test_definition() {
        let def = ClarifyingQuestionTool.definition();
        assert_eq!(def.name, "askClarifyingQuestion");
        assert_eq!(def.output_type, FieldType::String);
        assert_eq!(
            def.input_schema()["properties"]["question"]["type"],
            "string"
        );
    }
}
