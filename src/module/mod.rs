//! Executable modules over typed signatures.
//!
//! A module binds a [`Signature`] to a generation engine. [`Predict`] is the
//! single-step module: render, generate once, validate.
//!
//! # Example
//!
//! ```ignore
//! use redflag_core::module::{ModuleConfig, Predict};
//!
//! let predictor = Predict::<MySignature>::new(engine)
//!     .with_config(ModuleConfig::new().with_temperature(0.2));
//!
//! let outputs = predictor.invoke(&inputs).await?.outputs;
//! ```

mod predict;

pub use predict::{Predict, Prediction};

use serde::{Deserialize, Serialize};

/// Configuration for module execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Model to use (engine default if unset).
    pub model: Option<String>,
    /// Temperature for sampling.
    pub temperature: f64,
    /// Maximum tokens for completion.
    pub max_tokens: Option<u32>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

impl ModuleConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    /// Set the maximum tokens.
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}
