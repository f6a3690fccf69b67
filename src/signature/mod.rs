//! Typed signatures for structured generation.
//!
//! A signature is the contract between the caller and the generation engine:
//! - a prompt template with named placeholders
//! - the declared input shape, conformed before anything is rendered
//! - the declared output shape, conformed before anything is returned
//!
//! # Example
//!
//! ```
//! use redflag_core::signature::{FieldSpec, FieldType, Signature};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct EchoInputs {
//!     text: String,
//! }
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct EchoOutputs {
//!     echoed: String,
//! }
//!
//! struct Echo;
//!
//! impl Signature for Echo {
//!     type Inputs = EchoInputs;
//!     type Outputs = EchoOutputs;
//!
//!     fn template() -> &'static str {
//!         "Repeat this back:\n{{text}}"
//!     }
//!
//!     fn input_fields() -> Vec<FieldSpec> {
//!         vec![FieldSpec::new("text", FieldType::String).non_empty()]
//!     }
//!
//!     fn output_fields() -> Vec<FieldSpec> {
//!         vec![FieldSpec::new("echoed", FieldType::String)]
//!     }
//! }
//!
//! let prompt = Echo::render_prompt(&EchoInputs { text: "hi".into() }).unwrap();
//! assert_eq!(prompt, "Repeat this back:\nhi");
//! ```

pub mod types;
pub mod validation;

pub use types::{FieldSpec, FieldType};
pub use validation::{conform, ValidationError};

use crate::error::{Error, Result};
use crate::prompt::PromptTemplate;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;

/// Error that occurs when extracting a JSON object from engine text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Response was not valid JSON
    InvalidJson {
        /// The parse error message
        message: String,
        /// Preview of the response that failed to parse
        response_preview: String,
    },

    /// Response was empty or contained no extractable content
    EmptyResponse,
}

impl ParseError {
    /// Create an invalid JSON error from a serde error.
    pub fn invalid_json(err: &serde_json::Error, response: &str) -> Self {
        Self::InvalidJson {
            message: err.to_string(),
            response_preview: truncate(response, 200),
        }
    }

    /// Get a human-readable error message.
    pub fn to_user_message(&self) -> String {
        match self {
            Self::InvalidJson {
                message,
                response_preview,
            } => {
                format!(
                    "Failed to parse response as JSON: {}. Response: {}",
                    message, response_preview
                )
            }
            Self::EmptyResponse => "Engine returned an empty response".to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_user_message())
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::contract_violation(err.to_user_message())
    }
}

/// Core trait defining a typed structured-generation contract.
pub trait Signature: Send + Sync + 'static {
    /// Input type (must be serializable).
    type Inputs: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Output type (must be deserializable).
    type Outputs: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Prompt template rendered against the conformed inputs.
    ///
    /// See [`PromptTemplate`] for the placeholder syntax.
    fn template() -> &'static str;

    /// Input field specifications.
    fn input_fields() -> Vec<FieldSpec>;

    /// Output field specifications.
    fn output_fields() -> Vec<FieldSpec>;

    /// Get the signature name (defaults to type name).
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Conform the inputs and render the prompt.
    ///
    /// Inputs that do not match [`Signature::input_fields`] fail with
    /// [`Error::SchemaViolation`] before anything is rendered.
    fn render_prompt(inputs: &Self::Inputs) -> Result<String>
    where
        Self: Sized,
    {
        let value = serde_json::to_value(inputs)?;
        let conformed = conform(&value, &Self::input_fields())
            .map_err(|e| Error::from_input_validation(&e))?;
        let template = PromptTemplate::parse(Self::template())?;
        Ok(template.render(&conformed))
    }

    /// Conform raw engine output and decode it into [`Signature::Outputs`].
    ///
    /// Nothing partial is ever returned: any violation is a
    /// [`Error::GenerationContractViolation`].
    fn parse_output(value: Value) -> Result<Self::Outputs>
    where
        Self: Sized,
    {
        let conformed = conform(&value, &Self::output_fields())
            .map_err(|e| Error::from_output_validation(&e))?;
        serde_json::from_value(conformed).map_err(|e| Error::GenerationContractViolation {
            field: None,
            message: format!("{} does not decode: {}", Self::name(), e),
        })
    }

    /// Generate a JSON schema for the output type.
    fn output_schema() -> Value
    where
        Self: Sized,
    {
        FieldType::object(Self::output_fields()).to_json_schema()
    }
}

/// Parse engine text into a JSON value, tolerating markdown fences.
pub fn parse_structured_output(response: &str) -> std::result::Result<Value, ParseError> {
    let response = response.trim();

    if response.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let json_str = extract_json(response);
    serde_json::from_str(json_str).map_err(|e| ParseError::invalid_json(&e, json_str))
}

/// Describe the output contract as prompt text.
///
/// Appended by engines that have no native structured-output mode.
pub fn describe_output(fields: &[FieldSpec]) -> String {
    let mut out = String::from("## Required Output\n\n");
    out.push_str("Respond with a JSON object containing:\n\n");
    for field in fields {
        out.push_str(&format!("- {}\n", field.to_prompt_line()));
    }

    let mut template = serde_json::Map::new();
    for field in fields {
        template.insert(field.name.clone(), field_placeholder(&field.field_type));
    }
    out.push_str("\n```json\n");
    out.push_str(&serde_json::to_string_pretty(&Value::Object(template)).unwrap_or_default());
    out.push_str("\n```\n");
    out
}

/// Extract JSON from a response that may contain markdown or other text.
fn extract_json(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let content_start = start + 7;
        if let Some(end) = response[content_start..].find("```") {
            return response[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = response.find("```") {
        let content_start = start + 3;
        // Skip language identifier if present
        let content_start = response[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = response[content_start..].find("```") {
            return response[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end > start {
                return &response[start..=end];
            }
        }
    }

    response
}

fn field_placeholder(field_type: &FieldType) -> Value {
    match field_type {
        FieldType::String => Value::String("<string>".to_string()),
        FieldType::List(inner) => Value::Array(vec![field_placeholder(inner)]),
        FieldType::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|f| (f.name.clone(), field_placeholder(&f.field_type)))
                .collect(),
        ),
        FieldType::Enum(values) => Value::String(values.join("|")),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct GreetInputs {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct GreetOutputs {
        greeting: String,
        tone: String,
    }

    struct Greet;

    impl Signature for Greet {
        type Inputs = GreetInputs;
        type Outputs = GreetOutputs;

        fn template() -> &'static str {
            "Greet {{name}}.\n{{#nickname}}\nThey go by {{nickname}}.\n{{/nickname}}\nBe brief."
        }

        fn input_fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("name", FieldType::String).non_empty(),
                FieldSpec::new("nickname", FieldType::String).optional(),
            ]
        }

        fn output_fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("greeting", FieldType::String),
                FieldSpec::new("tone", FieldType::enum_of(["warm", "formal"])),
            ]
        }
    }

    #[test]
    fn test_render_prompt_with_optional_section() {
        let with = GreetInputs {
            name: "Sam".into(),
            nickname: Some("Sammy".into()),
        };
        assert_eq!(
            Greet::render_prompt(&with).unwrap(),
            "Greet Sam.\nThey go by Sammy.\nBe brief."
        );

        let without = GreetInputs {
            name: "Sam".into(),
            nickname: None,
        };
        assert_eq!(Greet::render_prompt(&without).unwrap(), "Greet Sam.\nBe brief.");
    }

    #[test]
    fn test_render_prompt_rejects_blank_input() {
        let inputs = GreetInputs {
            name: "  ".into(),
            nickname: None,
        };
        let err = Greet::render_prompt(&inputs).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { .. }));
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn test_parse_output_success_drops_extras() {
        let out = Greet::parse_output(json!({
            "greeting": "hey",
            "tone": "warm",
            "confidence": 0.4
        }))
        .unwrap();
        assert_eq!(
            out,
            GreetOutputs {
                greeting: "hey".into(),
                tone: "warm".into()
            }
        );
    }

    #[test]
    fn test_parse_output_missing_field() {
        let err = Greet::parse_output(json!({"greeting": "hey"})).unwrap_err();
        assert!(matches!(err, Error::GenerationContractViolation { .. }));
        assert_eq!(err.field(), Some("tone"));
    }

    #[test]
    fn test_parse_output_enum_outside_set() {
        let err = Greet::parse_output(json!({"greeting": "hey", "tone": "rude"})).unwrap_err();
        assert!(matches!(err, Error::GenerationContractViolation { .. }));
        assert!(err.to_string().contains("rude"));
    }

    #[test]
    fn test_output_schema() {
        let schema = Greet::output_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["greeting", "tone"]));
        assert_eq!(schema["properties"]["tone"]["enum"], json!(["warm", "formal"]));
    }

    #[test]
    fn test_parse_structured_output_variants() {
        let fenced = "Sure:\n```json\n{\"greeting\": \"hi\"}\n```";
        assert_eq!(parse_structured_output(fenced).unwrap(), json!({"greeting": "hi"}));

        let bare_fence = "```\n{\"a\": 1}\n```";
        assert_eq!(parse_structured_output(bare_fence).unwrap(), json!({"a": 1}));

        let inline = "Here you go {\"a\": [1, 2]} done";
        assert_eq!(parse_structured_output(inline).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_parse_structured_output_errors() {
        assert_eq!(parse_structured_output("   "), Err(ParseError::EmptyResponse));
        assert!(matches!(
            parse_structured_output("no json here"),
            Err(ParseError::InvalidJson { .. })
        ));

        let err: Error = ParseError::EmptyResponse.into();
        assert!(matches!(err, Error::GenerationContractViolation { .. }));
    }

    #[test]
    fn test_describe_output() {
        let text = describe_output(&Greet::output_fields());
        assert!(text.starts_with("## Required Output"));
        assert!(text.contains("- tone (warm|formal)"));
        assert!(text.contains("\"tone\": \"warm|formal\""));
        assert!(text.contains("\"greeting\": \"<string>\""));
    }
}
