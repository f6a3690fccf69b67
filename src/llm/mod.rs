//! Generation engine boundary.
//!
//! The core treats the engine as an opaque capability: a rendered prompt, an
//! output shape and a tool registry go in, raw structured output comes out.
//!
//! ## Example
//!
//! ```rust,ignore
//! use redflag_core::llm::{AnthropicEngine, ClientConfig, GenerationEngine, GenerationRequest};
//!
//! let engine = AnthropicEngine::new(
//!     ClientConfig::new("your-api-key")
//!         .with_default_model("claude-3-5-sonnet-20241022")
//! )?;
//!
//! let response = engine.generate(GenerationRequest::new("Say hi", vec![])).await?;
//! ```

mod client;
mod mock;
mod types;

pub use client::{AnthropicEngine, ClientConfig, GenerationEngine};
pub use mock::ScriptedEngine;
pub use types::{GenerationRequest, GenerationResponse, StopReason, TokenUsage};
