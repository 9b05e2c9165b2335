//! Request types for the connector.
//!
//! This module defines the canonical request every provider translator
//! consumes. It is built once at the RPC boundary and never mutated.

use crate::types::ModelId;
use serde::{Deserialize, Serialize};

/// Canonical prompt request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Per-provider model code
    pub model: ModelId,

    /// Prompt text
    pub message: String,

    /// Advisory generation parameters
    #[serde(default)]
    pub parameters: ParameterBag,

    /// Calling application tag, forwarded where the provider supports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
}

impl PromptRequest {
    /// Create a request with default parameters
    #[must_use]
    pub fn new(model: impl Into<ModelId>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
            parameters: ParameterBag::default(),
            application_id: None,
        }
    }

    /// Set the generation parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: ParameterBag) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the application tag
    #[must_use]
    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }
}

/// Provider-agnostic generation knobs.
///
/// Every field is optional and advisory: a translator copies the fields its
/// provider understands and drops the rest.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterBag {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Frequency penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Nucleus sampling mass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ParameterBag {
    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set top-p
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set frequency penalty
    #[must_use]
    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    /// Set presence penalty
    #[must_use]
    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    /// Max tokens, treating zero as "not set"
    #[must_use]
    pub fn positive_max_tokens(&self) -> Option<u32> {
        self.max_tokens.filter(|n| *n > 0)
    }
}
