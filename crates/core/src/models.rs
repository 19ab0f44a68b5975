//! Records exchanged between the feature layer and the model.
//!
//! Everything here is request-scoped: a record lives as long as the view that
//! displays it and is never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The structured result of a word lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct VocabularyInfo {
    pub word: String,
    pub definition: String,
    /// The prompt asks for three; the count is not enforced.
    pub examples: Vec<String>,
    pub synonyms: Vec<String>,
}

/// One grammatical mistake and why it is wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
pub struct GrammarError {
    pub error: String,
    pub explanation: String,
}

/// The result of a grammar check.
///
/// `errors` is always present. An empty list is a valid result meaning the
/// passage needed no corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct GrammarCorrection {
    pub original_text: String,
    pub corrected_text: String,
    pub errors: Vec<GrammarError>,
}

impl GrammarCorrection {
    /// True when the model found nothing to correct.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Bot => write!(f, "bot"),
        }
    }
}

/// A single entry in a conversation transcript. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
        }
    }
}

/// Reading level a generated story is pitched at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Beginner => write!(f, "Beginner"),
            Level::Intermediate => write!(f, "Intermediate"),
            Level::Advanced => write!(f, "Advanced"),
        }
    }
}

/// A generated story, kept as the raw model text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub level: Level,
    pub text: String,
}

impl Story {
    /// Splits the story into display paragraphs, one per non-blank line.
    pub fn paragraphs(&self) -> Vec<&str> {
        self.text
            .split('\n')
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}

/// The user-facing features, each with its own fixed messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Vocabulary,
    Grammar,
    Story,
    Conversation,
}

impl Feature {
    /// Message shown when the input is empty or whitespace-only.
    pub fn empty_input_message(self) -> &'static str {
        match self {
            Feature::Vocabulary => "Please enter a word.",
            Feature::Grammar => "Please enter some text to check.",
            Feature::Story => "Please enter a story prompt.",
            Feature::Conversation => "Please enter a message.",
        }
    }

    /// Static message shown in place of any failed call.
    pub fn failure_message(self) -> &'static str {
        match self {
            Feature::Vocabulary => "Failed to fetch word information. Please try again.",
            Feature::Grammar => "Failed to check grammar. Please try again.",
            Feature::Story => "Failed to generate story. Please try again.",
            Feature::Conversation => "Sorry, I encountered an error. Please try again.",
        }
    }
}
