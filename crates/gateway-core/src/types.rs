//! Identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies which third-party provider a connector talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// OpenAI-style chat completions API
    #[serde(rename = "openai")]
    OpenAI,
    /// Cohere-style generate API
    Cohere,
}

impl ProviderId {
    /// All known providers
    pub const ALL: [Self; 2] = [Self::OpenAI, Self::Cohere];

    /// Stable lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Cohere => "cohere",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "cohere" => Ok(Self::Cohere),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Raw model enum code as it arrived on the wire.
///
/// Each provider owns a closed model enumeration; the code is only resolved
/// by that provider's translator, which falls back to a default model for
/// `0` and for codes it does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModelId(pub i32);

impl ModelId {
    /// The "unspecified" code
    pub const UNSPECIFIED: Self = Self(0);

    /// Raw code
    #[must_use]
    pub fn code(self) -> i32 {
        self.0
    }
}

impl From<i32> for ModelId {
    fn from(code: i32) -> Self {
        Self(code)
    }
}
