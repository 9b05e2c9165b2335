//! Response types for the connector.

use serde::{Deserialize, Serialize};

/// Canonical unary response.
///
/// Token counters are always concrete integers; providers that do not report
/// usage produce zeros.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PromptResponse {
    /// Generated text
    pub content: String,
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens produced by the completion
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl PromptResponse {
    /// Build a response from optional usage counters.
    ///
    /// Missing counters become `0`; a missing total is derived from the
    /// other two.
    #[must_use]
    pub fn from_usage(
        content: impl Into<String>,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
        total_tokens: Option<u32>,
    ) -> Self {
        let prompt_tokens = prompt_tokens.unwrap_or(0);
        let completion_tokens = completion_tokens.unwrap_or(0);
        Self {
            content: content.into(),
            prompt_tokens,
            completion_tokens,
            total_tokens: total_tokens
                .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
        }
    }
}

/// Why a stream ended, normalized across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// Natural completion
    Done,
    /// Truncated by a token or length cap
    Limit,
    /// Provider-side failure
    Error,
}

impl FinishReason {
    /// Resolve a provider finish signal through a lookup table.
    ///
    /// Signals absent from the table are treated as failures.
    #[must_use]
    pub fn lookup(table: &[(&str, Self)], signal: &str) -> Self {
        table
            .iter()
            .find(|(native, _)| *native == signal)
            .map_or(Self::Error, |(_, reason)| *reason)
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "DONE"),
            Self::Limit => write!(f, "LIMIT"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One element of a streamed completion
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text delta to append
    pub content: String,
    /// Set on the terminal chunk only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    /// A content-only delta
    #[must_use]
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: None,
        }
    }

    /// A terminal chunk
    #[must_use]
    pub fn finished(content: impl Into<String>, reason: FinishReason) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some(reason),
        }
    }

    /// Whether this chunk ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}
