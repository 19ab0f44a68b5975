//! API Models
//!
//! Request payloads and response bodies for the HTTP API, with `utoipa`
//! schemas for the OpenAPI document. Response bodies are built from the
//! core view snapshots; nothing here is persisted.

use lingo_core::{
    conversation::Conversation,
    models::{ChatMessage, GrammarCorrection, Level, Sender, Story},
    tutor::WordLookup,
    view::ViewSnapshot,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
pub struct LookupWordPayload {
    #[schema(example = "serendipity")]
    pub word: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckGrammarPayload {
    #[schema(example = "She don't like apples.")]
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateStoryPayload {
    #[schema(example = "A lost puppy in a big city")]
    pub prompt: String,
    #[serde(default)]
    #[schema(value_type = String, example = "Intermediate")]
    pub level: Level,
}

#[derive(Deserialize, ToSchema)]
pub struct SendMessagePayload {
    #[schema(example = "How do I use 'affect' vs 'effect'?")]
    pub text: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct WorkspaceCreated {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
}

/// Format of the pronunciation clip; the audio itself is served as WAV.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct PronunciationBody {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: usize,
    pub duration_ms: u64,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct VocabularyBody {
    pub word: String,
    pub definition: String,
    pub examples: Vec<String>,
    pub synonyms: Vec<String>,
    pub pronunciation: PronunciationBody,
}

impl From<WordLookup> for VocabularyBody {
    fn from(lookup: WordLookup) -> Self {
        let audio = lookup.pronunciation.decode();
        Self {
            word: lookup.info.word,
            definition: lookup.info.definition,
            examples: lookup.info.examples,
            synonyms: lookup.info.synonyms,
            pronunciation: PronunciationBody {
                sample_rate: audio.sample_rate,
                channels: audio.channel_count(),
                frames: audio.frames(),
                duration_ms: audio.duration().as_millis() as u64,
            },
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GrammarVerdict {
    /// No corrections were needed.
    Clean,
    Corrected,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct GrammarErrorBody {
    pub error: String,
    pub explanation: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct GrammarBody {
    pub original_text: String,
    pub corrected_text: String,
    pub errors: Vec<GrammarErrorBody>,
    pub verdict: GrammarVerdict,
}

impl From<GrammarCorrection> for GrammarBody {
    fn from(correction: GrammarCorrection) -> Self {
        let verdict = if correction.is_clean() {
            GrammarVerdict::Clean
        } else {
            GrammarVerdict::Corrected
        };
        Self {
            original_text: correction.original_text,
            corrected_text: correction.corrected_text,
            errors: correction
                .errors
                .into_iter()
                .map(|e| GrammarErrorBody {
                    error: e.error,
                    explanation: e.explanation,
                })
                .collect(),
            verdict,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct StoryBody {
    #[schema(value_type = String, example = "Intermediate")]
    pub level: Level,
    pub text: String,
    pub paragraphs: Vec<String>,
}

impl From<Story> for StoryBody {
    fn from(story: Story) -> Self {
        let paragraphs = story.paragraphs().into_iter().map(str::to_string).collect();
        Self {
            level: story.level,
            text: story.text,
            paragraphs,
        }
    }
}

/// Generates a view body type wrapping an optional result.
macro_rules! view_body {
    ($name:ident, $body:ty, $result:ty) => {
        #[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
        pub struct $name {
            /// True while a request is outstanding.
            pub busy: bool,
            /// Inline message for the input form (validation or failure).
            pub error: Option<String>,
            pub result: Option<$body>,
        }

        impl From<ViewSnapshot<$result>> for $name {
            fn from(snapshot: ViewSnapshot<$result>) -> Self {
                Self {
                    busy: snapshot.busy,
                    error: snapshot.error,
                    result: snapshot.result.map(Into::into),
                }
            }
        }
    };
}

view_body!(VocabularyView, VocabularyBody, WordLookup);
view_body!(GrammarView, GrammarBody, GrammarCorrection);
view_body!(StoryView, StoryBody, Story);

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChatMessageBody {
    #[schema(value_type = String, example = "user")]
    pub sender: Sender,
    pub text: String,
}

impl From<ChatMessage> for ChatMessageBody {
    fn from(message: ChatMessage) -> Self {
        Self {
            sender: message.sender,
            text: message.text,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ConversationView {
    pub busy: bool,
    pub messages: Vec<ChatMessageBody>,
}

impl From<&Conversation> for ConversationView {
    fn from(conversation: &Conversation) -> Self {
        Self {
            busy: conversation.is_busy(),
            messages: conversation
                .messages()
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingo_core::{
        audio::{PronunciationAudio, encode_pcm16_base64},
        models::{GrammarError, VocabularyInfo},
    };
    use serde_json::json;

    #[test]
    fn test_story_payload_defaults_level() {
        let payload: GenerateStoryPayload =
            serde_json::from_str(r#"{"prompt": "A dragon"}"#).unwrap();
        assert_eq!(payload.level, Level::Intermediate);

        let payload: GenerateStoryPayload =
            serde_json::from_str(r#"{"prompt": "A dragon", "level": "Advanced"}"#).unwrap();
        assert_eq!(payload.level, Level::Advanced);
    }

    #[test]
    fn test_payload_missing_field() {
        let result: Result<LookupWordPayload, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_grammar_verdict_distinguishes_clean_result() {
        let clean = GrammarBody::from(GrammarCorrection {
            original_text: "I run.".to_string(),
            corrected_text: "I run.".to_string(),
            errors: vec![],
        });
        assert_eq!(clean.verdict, GrammarVerdict::Clean);

        let corrected = GrammarBody::from(GrammarCorrection {
            original_text: "I runs.".to_string(),
            corrected_text: "I run.".to_string(),
            errors: vec![GrammarError {
                error: "runs".to_string(),
                explanation: "Use the base form with 'I'.".to_string(),
            }],
        });
        let json = serde_json::to_value(&corrected).unwrap();
        assert_eq!(json["verdict"], "corrected");
        assert_eq!(json["errors"][0]["error"], "runs");
    }

    #[test]
    fn test_vocabulary_view_describes_pronunciation() {
        let snapshot = ViewSnapshot {
            busy: false,
            error: None,
            result: Some(WordLookup {
                info: VocabularyInfo {
                    word: "calm".to_string(),
                    definition: "Not agitated.".to_string(),
                    examples: vec!["Stay calm.".to_string()],
                    synonyms: vec!["serene".to_string()],
                },
                pronunciation: PronunciationAudio::from_base64(&encode_pcm16_base64(
                    &[0.0; 12000],
                ))
                .unwrap(),
            }),
        };

        let json = serde_json::to_value(VocabularyView::from(snapshot)).unwrap();
        assert_eq!(json["busy"], false);
        assert_eq!(json["error"], serde_json::Value::Null);
        assert_eq!(
            json["result"]["pronunciation"],
            json!({"sample_rate": 24000, "channels": 1, "frames": 12000, "duration_ms": 500})
        );
    }

    #[test]
    fn test_empty_view_serialization() {
        let view = StoryView::from(ViewSnapshot::<Story> {
            busy: true,
            error: None,
            result: None,
        });
        assert_eq!(
            serde_json::to_string(&view).unwrap(),
            r#"{"busy":true,"error":null,"result":null}"#
        );
    }

    #[test]
    fn test_chat_message_body_sender() {
        let body = ChatMessageBody::from(ChatMessage::user("Hi"));
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"sender":"user","text":"Hi"}"#
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Workspace not found".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"message":"Workspace not found"}"#
        );
    }
}
