//! Validation for declared shapes.
//!
//! [`conform`] returns the value coerced to the shape, or the first
//! violation with a dotted path to the offending field.

use super::types::{FieldSpec, FieldType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Error that occurs during signature validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "error_type", rename_all = "snake_case")]
pub enum ValidationError {
    /// A required field is missing.
    MissingField {
        /// Name of the missing field
        field: String,
        /// Expected type of the field
        expected_type: FieldType,
    },

    /// Field value has the wrong type.
    TypeMismatch {
        /// Name of the field
        field: String,
        /// Expected type
        expected: FieldType,
        /// Actual type description
        got: String,
        /// Preview of the actual value (first 100 chars)
        value_preview: String,
    },

    /// Enum field has an invalid value.
    EnumInvalid {
        /// Name of the field
        field: String,
        /// The invalid value that was provided
        value: String,
        /// List of allowed values
        allowed: Vec<String>,
    },

    /// A constraint was violated.
    ConstraintViolated {
        /// Name of the field
        field: String,
        /// Description of the constraint that was violated
        constraint: String,
    },

    /// Nested object validation failed.
    NestedError {
        /// Path to the nested field (e.g., "history[2]")
        path: String,
        /// The underlying validation error
        error: Box<ValidationError>,
    },

    /// The value is not an object at all.
    NotAnObject {
        /// Actual type description
        got: String,
    },
}

impl ValidationError {
    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>, expected_type: FieldType) -> Self {
        Self::MissingField {
            field: field.into(),
            expected_type,
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(field: impl Into<String>, expected: FieldType, value: &Value) -> Self {
        let got = value_type_name(value);
        let value_preview = truncate_preview(&value.to_string(), 100);
        Self::TypeMismatch {
            field: field.into(),
            expected,
            got,
            value_preview,
        }
    }

    /// Create an enum invalid error.
    pub fn enum_invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        allowed: Vec<String>,
    ) -> Self {
        Self::EnumInvalid {
            field: field.into(),
            value: value.into(),
            allowed,
        }
    }

    /// Create a constraint violated error.
    pub fn constraint_violated(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::ConstraintViolated {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    /// Wrap this error with a path prefix for nested fields.
    pub fn with_path(self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        match self {
            Self::NestedError { path, error } => Self::NestedError {
                path: format!("{}.{}", parent, path),
                error,
            },
            other => Self::NestedError {
                path: parent,
                error: Box::new(other),
            },
        }
    }

    /// Full dotted path of the offending field.
    pub fn field_path(&self) -> String {
        match self {
            Self::MissingField { field, .. }
            | Self::TypeMismatch { field, .. }
            | Self::EnumInvalid { field, .. }
            | Self::ConstraintViolated { field, .. } => field.clone(),
            Self::NestedError { path, error } => match error.as_ref() {
                Self::NotAnObject { .. } => path.clone(),
                inner => format!("{}.{}", path, inner.field_path()),
            },
            Self::NotAnObject { .. } => "$".to_string(),
        }
    }

    /// Get a human-readable error message.
    pub fn to_user_message(&self) -> String {
        match self {
            Self::MissingField {
                field,
                expected_type,
            } => {
                format!(
                    "Missing required field '{}' (expected {})",
                    field,
                    expected_type.to_prompt_hint()
                )
            }
            Self::TypeMismatch {
                field,
                expected,
                got,
                value_preview,
            } => {
                format!(
                    "Field '{}' has wrong type: expected {}, got {} (value: {})",
                    field,
                    expected.to_prompt_hint(),
                    got,
                    value_preview
                )
            }
            Self::EnumInvalid {
                field,
                value,
                allowed,
            } => {
                format!(
                    "Field '{}' has invalid value '{}'. Allowed values: {}",
                    field,
                    value,
                    allowed.join(", ")
                )
            }
            Self::ConstraintViolated { field, constraint } => {
                format!("Field '{}' violates constraint: {}", field, constraint)
            }
            Self::NestedError { path, error } => {
                format!("At '{}': {}", path, error.to_user_message())
            }
            Self::NotAnObject { got } => format!("Expected an object, got {}", got),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_user_message())
    }
}

impl std::error::Error for ValidationError {}

/// Coerce a JSON object to the declared fields.
///
/// Undeclared keys are dropped, `null` on an optional field counts as absent,
/// and defaults fill missing optional fields. Fails with the first violation.
///
/// # Example
///
/// ```
/// use redflag_core::signature::{conform, FieldSpec, FieldType};
/// use serde_json::json;
///
/// let fields = vec![
///     FieldSpec::new("question", FieldType::String),
///     FieldSpec::new("note", FieldType::String).with_default(""),
/// ];
///
/// let value = json!({"question": "When?", "extra": 1});
/// assert_eq!(conform(&value, &fields).unwrap(), json!({"question": "When?", "note": ""}));
/// ```
pub fn conform(value: &Value, fields: &[FieldSpec]) -> Result<Value, ValidationError> {
    let obj = value.as_object().ok_or_else(|| ValidationError::NotAnObject {
        got: value_type_name(value),
    })?;

    let mut out = Map::new();

    for field in fields {
        match obj.get(&field.name) {
            Some(Value::Null) | None if !field.required => {
                if let Some(default) = &field.default {
                    out.insert(field.name.clone(), default.clone());
                }
            }
            Some(field_value) => {
                let conformed = conform_value(field_value, &field.field_type, &field.name)?;
                check_non_empty(field, &conformed)?;
                out.insert(field.name.clone(), conformed);
            }
            None => {
                return Err(ValidationError::missing_field(
                    &field.name,
                    field.field_type.clone(),
                ));
            }
        }
    }

    Ok(Value::Object(out))
}

fn conform_value(
    value: &Value,
    field_type: &FieldType,
    field_name: &str,
) -> Result<Value, ValidationError> {
    match field_type {
        FieldType::String => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(ValidationError::type_mismatch(
                field_name,
                FieldType::String,
                other,
            )),
        },
        FieldType::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.iter().any(|a| a == s) => Ok(value.clone()),
            Some(s) => Err(ValidationError::enum_invalid(field_name, s, allowed.clone())),
            None => Err(ValidationError::type_mismatch(
                field_name,
                field_type.clone(),
                value,
            )),
        },
        FieldType::List(inner) => {
            let arr = value.as_array().ok_or_else(|| {
                ValidationError::type_mismatch(field_name, field_type.clone(), value)
            })?;
            arr.iter()
                .enumerate()
                .map(|(i, item)| conform_value(item, inner, &format!("{}[{}]", field_name, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        FieldType::Object(fields) => {
            if !value.is_object() {
                return Err(ValidationError::type_mismatch(
                    field_name,
                    field_type.clone(),
                    value,
                ));
            }
            conform(value, fields).map_err(|e| e.with_path(field_name))
        }
    }
}

fn check_non_empty(field: &FieldSpec, value: &Value) -> Result<(), ValidationError> {
    if field.non_empty && value.as_str().is_some_and(|s| s.trim().is_empty()) {
        return Err(ValidationError::constraint_violated(
            &field.name,
            "must not be empty",
        ));
    }
    Ok(())
}

/// Get a human-readable type name for a JSON value.
fn value_type_name(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer".to_string()
            } else {
                "number".to_string()
            }
        }
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

/// Truncate a string for preview purposes.
fn truncate_preview(s: &str, max_len: usize) -> String {
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
    use serde_json::json;

    fn turn_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("role", FieldType::enum_of(["user", "assistant"])),
            FieldSpec::new("content", FieldType::String),
        ]
    }

    fn request_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("userText", FieldType::String).non_empty(),
            FieldSpec::new("history", FieldType::list(FieldType::object(turn_fields())))
                .optional(),
        ]
    }

    #[test]
    fn test_conform_success() {
        let value = json!({
            "userText": "I was busy",
            "history": [{"role": "user", "content": "where were you"}]
        });
        assert_eq!(conform(&value, &request_fields()).unwrap(), value);
    }

    #[test]
    fn test_conform_optional_missing() {
        let value = json!({"userText": "hi"});
        assert_eq!(conform(&value, &request_fields()).unwrap(), value);
    }

    #[test]
    fn test_conform_enum() {
        let fields = vec![FieldSpec::new(
            "verdict",
            FieldType::enum_of(["honest", "dishonest"]),
        )];

        assert!(conform(&json!({"verdict": "honest"}), &fields).is_ok());

        let err = conform(&json!({"verdict": "probably"}), &fields).unwrap_err();
        assert!(matches!(err, ValidationError::EnumInvalid { .. }));
    }

    #[test]
    fn test_conform_not_an_object() {
        let err = conform(&json!("text"), &request_fields()).unwrap_err();
        assert!(matches!(err, ValidationError::NotAnObject { .. }));
        assert_eq!(err.field_path(), "$");
    }

    #[test]
    fn test_conform_drops_unknown_and_applies_defaults() {
        let fields = vec![
            FieldSpec::new("analysis", FieldType::String),
            FieldSpec::new("clarifyingQuestion", FieldType::String).with_default(""),
        ];
        let value = json!({"analysis": "fine", "confidence": 0.9});

        assert_eq!(
            conform(&value, &fields).unwrap(),
            json!({"analysis": "fine", "clarifyingQuestion": ""})
        );
    }

    #[test]
    fn test_conform_null_optional_is_absent() {
        let value = json!({"userText": "hi", "history": null});
        assert_eq!(
            conform(&value, &request_fields()).unwrap(),
            json!({"userText": "hi"})
        );
    }

    #[test]
    fn test_conform_returns_first_violation() {
        let value = json!({
            "userText": "hi",
            "history": [
                {"role": "user", "content": "a"},
                {"role": "system", "content": "b"},
                {"role": "user"}
            ]
        });
        let err = conform(&value, &request_fields()).unwrap_err();

        assert!(matches!(err, ValidationError::NestedError { .. }));
        assert_eq!(err.field_path(), "history[1].role");
        assert!(err.to_user_message().contains("system"));
    }

    #[test]
    fn test_conform_accepts_empty_free_text() {
        let fields = vec![FieldSpec::new("clarifyingQuestion", FieldType::String)];
        assert!(conform(&json!({"clarifyingQuestion": ""}), &fields).is_ok());
    }

    #[test]
    fn test_conform_rejects_blank_non_empty_field() {
        let err = conform(&json!({"userText": "   "}), &request_fields()).unwrap_err();
        assert!(matches!(err, ValidationError::ConstraintViolated { .. }));
        assert_eq!(err.field_path(), "userText");
    }

    #[test]
    fn test_conform_missing_required() {
        let fields = vec![
            FieldSpec::new("analysis", FieldType::String),
            FieldSpec::new("verdict", FieldType::String),
        ];
        let err = conform(&json!({"analysis": "x"}), &fields).unwrap_err();
        assert_eq!(err, ValidationError::missing_field("verdict", FieldType::String));
    }

    #[test]
    fn test_nested_error_path() {
        let inner = ValidationError::missing_field("role", FieldType::String);
        let nested = inner.with_path("history[0]").with_path("request");

        assert_eq!(nested.field_path(), "request.history[0].role");
        assert!(nested.to_user_message().contains("request.history[0]"));
    }

    #[test]
    fn test_type_mismatch_preview_truncates_on_char_boundary() {
        let long = "🟥".repeat(60);
        let err = ValidationError::type_mismatch("verdict", FieldType::list(FieldType::String), &json!(long));
        assert!(err.to_user_message().ends_with("...)"));
    }

    #[test]
    fn test_serialization() {
        let error = ValidationError::type_mismatch("content", FieldType::String, &json!(42));

        let json = serde_json::to_string(&error).unwrap();
        let deserialized: ValidationError = serde_json::from_str(&json).unwrap();

        assert_eq!(error, deserialized);
    }
}
