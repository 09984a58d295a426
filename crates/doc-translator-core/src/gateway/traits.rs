use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Language;
use crate::error::Result;

/// Information about a gateway backend
#[derive(Debug, Clone)]
pub struct GatewayInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Model identifier sent with each request
    pub model: String,
}

/// What the model is asked to do with the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Translate { target: Language },
    Summarize,
    TranslateSummary { target: Language },
}

/// [`Instruction`] without its payload, for logs and API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Translate,
    Summarize,
    TranslateSummary,
}

impl Instruction {
    pub const fn kind(&self) -> InstructionKind {
        match self {
            Self::Translate { .. } => InstructionKind::Translate,
            Self::Summarize => InstructionKind::Summarize,
            Self::TranslateSummary { .. } => InstructionKind::TranslateSummary,
        }
    }

    /// System message sent ahead of the text
    pub fn system_prompt(&self) -> String {
        match self {
            Self::Translate { target } => format!("Translate the following text to {target}."),
            Self::Summarize => "Summarize the following text.".to_string(),
            Self::TranslateSummary { target } => {
                format!("Translate the following summarized text to {target}.")
            }
        }
    }
}

impl std::fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Translate => "translate",
            Self::Summarize => "summarize",
            Self::TranslateSummary => "translate summary",
        })
    }
}

/// Narrow interface to the language model: one instruction, one text in,
/// one text out.
#[async_trait]
pub trait TextTransform: Send + Sync {
    /// Get information about this gateway
    fn info(&self) -> GatewayInfo;

    /// Get the gateway name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Apply `instruction` to `text` with a single model call
    async fn transform(&self, text: &str, instruction: &Instruction) -> Result<String>;
}
