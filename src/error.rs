//! Error types for redflag-core.

use thiserror::Error;

use crate::signature::ValidationError;

/// Result type alias using redflag-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during analysis and refinement.
#[derive(Error, Debug)]
pub enum Error {
    /// Input (or tool arguments) did not conform to the declared shape
    #[error("Schema violation at '{field}': {message}")]
    SchemaViolation { field: String, message: String },

    /// Engine output reached us but failed structural validation
    #[error("Generation contract violation: {message}")]
    GenerationContractViolation {
        field: Option<String>,
        message: String,
    },

    /// The generation engine could not be reached or failed internally
    #[error("Generation engine unavailable: {message}")]
    EngineUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No analyzable text was supplied
    #[error("No text provided")]
    EmptyInput,

    /// The engine asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Prompt template is malformed
    #[error("Template error: {0}")]
    Template(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse status classification for the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller sent something unusable.
    BadRequest,
    /// Something failed on our side or the engine's.
    InternalFailure,
}

impl Error {
    /// Create a schema violation for a field.
    pub fn schema_violation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a contract violation not tied to a single field.
    pub fn contract_violation(message: impl Into<String>) -> Self {
        Self::GenerationContractViolation {
            field: None,
            message: message.into(),
        }
    }

    /// Create an engine-unavailable error.
    pub fn engine_unavailable(message: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create an engine-unavailable error with source.
    pub fn engine_unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::EngineUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Lift a validation failure on caller-supplied data.
    pub fn from_input_validation(error: &ValidationError) -> Self {
        Self::SchemaViolation {
            field: error.field_path(),
            message: error.to_user_message(),
        }
    }

    /// Lift a validation failure on engine output.
    pub fn from_output_validation(error: &ValidationError) -> Self {
        Self::GenerationContractViolation {
            field: Some(error.field_path()),
            message: error.to_user_message(),
        }
    }

    /// Offending field, if the error names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::SchemaViolation { field, .. } => Some(field),
            Self::GenerationContractViolation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Status classification for the transport collaborator.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::EmptyInput | Self::SchemaViolation { .. } => ErrorClass::BadRequest,
            _ => ErrorClass::InternalFailure,
        }
    }
}
