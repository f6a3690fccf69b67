//! Type definitions for declared shapes.
//!
//! This module provides the core types for describing engine I/O contracts:
//! - **FieldSpec**: Metadata for input and output fields
//! - **FieldType**: Type information for validation and prompt generation

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Specification for a field in a signature.
///
/// FieldSpec describes metadata about an input or output field including
/// its type, description (for prompt generation), and validation constraints.
///
/// # Example
///
/// ```
/// use redflag_core::signature::{FieldSpec, FieldType};
///
/// let field = FieldSpec::new("userText", FieldType::String)
///     .with_description("The text to analyze for deception")
///     .non_empty();
/// assert!(field.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name (matches the serialized key)
    pub name: String,
    /// Field type for validation
    pub field_type: FieldType,
    /// Human-readable description (for prompt generation)
    pub description: String,
    /// Whether field is required
    pub required: bool,
    /// Whether an empty string is rejected
    #[serde(default)]
    pub non_empty: bool,
    /// Default value (JSON) if not required
    pub default: Option<Value>,
}

impl FieldSpec {
    /// Create a new required field specification.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: String::new(),
            required: true,
            non_empty: false,
            default: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the field as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Reject empty strings for this field.
    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    /// Set a default value for optional fields.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    /// Format the field for prompt generation.
    ///
    /// Returns a string like "verdict (a|b|c): The final verdict"
    pub fn to_prompt_line(&self) -> String {
        let type_hint = self.field_type.to_prompt_hint();
        let label = &self.name;
        let required_marker = if self.required { "" } else { " (optional)" };

        if self.description.is_empty() {
            format!("{label} ({type_hint}){required_marker}")
        } else {
            format!("{label} ({type_hint}){required_marker}: {}", self.description)
        }
    }
}

/// Type of a field for validation and prompt generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldType {
    /// Free text
    String,
    /// List of items of a specific type
    List(Box<FieldType>),
    /// Nested object with fields
    Object(Vec<FieldSpec>),
    /// Enumeration with allowed values
    Enum(Vec<String>),
}

impl FieldType {
    /// Create a list type.
    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Create an object type with fields.
    pub fn object(fields: Vec<FieldSpec>) -> Self {
        Self::Object(fields)
    }

    /// Create an enum type with allowed values.
    pub fn enum_of(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Enum(values.into_iter().map(|v| v.into()).collect())
    }

    /// Get a hint string for prompts (e.g., "string", "list[object]").
    pub fn to_prompt_hint(&self) -> String {
        match self {
            Self::String => "string".to_string(),
            Self::List(inner) => format!("list[{}]", inner.to_prompt_hint()),
            Self::Object(_) => "object".to_string(),
            Self::Enum(values) => {
                if values.len() <= 5 {
                    values.join("|")
                } else {
                    format!("one of {} values", values.len())
                }
            }
        }
    }

    /// Generate a JSON schema fragment for this type.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::String => serde_json::json!({ "type": "string" }),
            Self::List(inner) => serde_json::json!({
                "type": "array",
                "items": inner.to_json_schema()
            }),
            Self::Object(fields) => {
                let properties: serde_json::Map<String, Value> = fields
                    .iter()
                    .map(|f| {
                        let mut schema = f.field_type.to_json_schema();
                        if !f.description.is_empty() {
                            schema["description"] = Value::String(f.description.clone());
                        }
                        (f.name.clone(), schema)
                    })
                    .collect();
                let required: Vec<&str> = fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.as_str())
                    .collect();
                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                })
            }
            Self::Enum(values) => serde_json::json!({
                "type": "string",
                "enum": values
            }),
        }
    }
}

impl Default for FieldType {
    fn default() -> Self {
        Self::String
    }
}
