//! Tools the generation engine may call during a single invocation.
//!
//! A [`Tool`] declares its argument shape with [`FieldSpec`]s. The
//! [`ToolRegistry`] conforms arguments against that shape before the tool
//! runs, so implementations only ever see well-formed input.

pub mod clarify;

pub use clarify::{ClarifyingQuestionTool, CLARIFY_TOOL_NAME};

use crate::error::{Error, Result};
use crate::signature::{conform, FieldSpec, FieldType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Declaration of a tool as offered to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must be unique within a registry)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Argument fields
    pub input_fields: Vec<FieldSpec>,
    /// Shape of the value the tool returns
    pub output_type: FieldType,
}

impl ToolDefinition {
    /// Create a tool definition with no arguments returning a string.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_fields: Vec::new(),
            output_type: FieldType::String,
        }
    }

    /// Add an argument field.
    pub fn with_input(mut self, field: FieldSpec) -> Self {
        self.input_fields.push(field);
        self
    }

    /// Set the output shape.
    pub fn with_output(mut self, output_type: FieldType) -> Self {
        self.output_type = output_type;
        self
    }

    /// JSON Schema for the arguments.
    pub fn input_schema(&self) -> Value {
        FieldType::object(self.input_fields.clone()).to_json_schema()
    }
}

/// A callable tool.
pub trait Tool: Send + Sync {
    /// Declaration offered to the engine.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool on already-conformed arguments.
    fn call(&self, arguments: Value) -> Result<Value>;
}

/// Record of one tool call made during a generation.
///
/// Returned alongside the response for tracing; never part of history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Engine-assigned call id
    pub id: String,
    /// Tool name
    pub tool: String,
    /// Arguments as sent by the engine
    pub arguments: Value,
    /// Tool output on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolInvocation {
    /// Build the record from a call result.
    pub fn from_result(
        id: impl Into<String>,
        tool: impl Into<String>,
        arguments: Value,
        result: &Result<Value>,
    ) -> Self {
        let (output, error) = match result {
            Ok(value) => (Some(value.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            id: id.into(),
            tool: tool.into(),
            arguments,
            output,
            error,
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Registry of tools keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    /// Builder form of [`ToolRegistry::register`].
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Definitions of every registered tool, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Get tool count.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Conform the arguments and run the named tool.
    pub fn invoke(&self, name: &str, arguments: Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        let definition = tool.definition();
        let conformed = conform(&arguments, &definition.input_fields)
            .map_err(|e| Error::from_input_validation(&e))?;

        tool.call(conformed)
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Shout;

    impl Tool for Shout {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("shout", "Uppercase the text")
                .with_input(FieldSpec::new("text", FieldType::String))
        }

        fn call(&self, arguments: Value) -> Result<Value> {
            let text = arguments["text"].as_str().unwrap_or_default();
            Ok(Value::String(text.to_uppercase()))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(Arc::new(Shout))
            .with_tool(Arc::new(ClarifyingQuestionTool))
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("shout").is_some());
        assert!(registry.get("whisper").is_none());

        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["askClarifyingQuestion", "shout"]);
    }

    #[test]
    fn test_invoke_conforms_arguments() {
        let out = registry()
            .invoke("shout", json!({"text": "hey", "volume": 11}))
            .unwrap();
        assert_eq!(out, json!("HEY"));
    }

    #[test]
    fn test_invoke_rejects_bad_arguments() {
        let err = registry().invoke("shout", json!({"text": 5})).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { .. }));
        assert_eq!(err.field(), Some("text"));
    }

    #[test]
    fn test_invoke_unknown_tool() {
        let err = registry().invoke("whisper", json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownTool(ref name) if name == "whisper"));
    }

    #[test]
    fn test_input_schema() {
        let schema = Shout.definition().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[test]
    fn test_invocation_record() {
        let ok = ToolInvocation::from_result("t1", "shout", json!({"text": "a"}), &Ok(json!("A")));
        assert!(ok.is_success());
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"id": "t1", "tool": "shout", "arguments": {"text": "a"}, "output": "A"})
        );

        let failed = ToolInvocation::from_result(
            "t2",
            "whisper",
            json!({}),
            &Err(Error::UnknownTool("whisper".into())),
        );
        assert!(!failed.is_success());
        assert_eq!(failed.error.as_deref(), Some("Unknown tool: whisper"));
    }

    #[test]
    fn test_debug_lists_names() {
        let debug = format!("{:?}", registry());
        assert!(debug.contains("askClarifyingQuestion"));
    }
}
