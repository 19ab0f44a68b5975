//! Feature operations: word lookup, grammar check, story generation, and
//! conversation practice.

use crate::{
    audio::PronunciationAudio,
    conversation::Conversation,
    error::{Result, TutorError},
    llm_client::{ModelClient, generate_record},
    models::{Feature, GrammarCorrection, Level, Story, VocabularyInfo},
    prompts::PromptLibrary,
    schema::{grammar_shape, vocabulary_shape},
};
use std::sync::Arc;
use tracing::{info, instrument};

pub const DEFAULT_VOICE: &str = "Kore";

/// The joint result of a word lookup: text info and its pronunciation.
#[derive(Debug, Clone, PartialEq)]
pub struct WordLookup {
    pub info: VocabularyInfo,
    pub pronunciation: PronunciationAudio,
}

/// Turns user input into model calls for each feature.
///
/// Grammar checks can go to a separate (typically stronger) model; every
/// other feature uses the default client.
pub struct Tutor {
    client: Arc<dyn ModelClient>,
    grammar_client: Arc<dyn ModelClient>,
    prompts: PromptLibrary,
    voice: String,
}

impl Tutor {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            grammar_client: client.clone(),
            client,
            prompts: PromptLibrary::default(),
            voice: DEFAULT_VOICE.to_string(),
        }
    }

    pub fn with_grammar_client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.grammar_client = client;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Looks up a word and fetches its pronunciation concurrently.
    ///
    /// Both calls must succeed; there is no partial result.
    #[instrument(skip(self))]
    pub async fn lookup_word(&self, word: &str) -> Result<WordLookup> {
        require_input(word, Feature::Vocabulary)?;
        let info_prompt = self.prompts.vocabulary(word);
        let speech_prompt = self.prompts.pronunciation(word);
        let shape = vocabulary_shape();

        let (info, audio) = tokio::try_join!(
            generate_record::<VocabularyInfo>(self.client.as_ref(), &info_prompt, &shape),
            self.client.generate_audio(&speech_prompt, &self.voice),
        )?;
        let pronunciation = PronunciationAudio::from_base64(&audio)?;

        info!(
            examples = info.examples.len(),
            synonyms = info.synonyms.len(),
            audio_bytes = pronunciation.len(),
            "Word lookup complete"
        );
        Ok(WordLookup {
            info,
            pronunciation,
        })
    }

    #[instrument(skip_all, fields(chars = text.len()))]
    pub async fn check_grammar(&self, text: &str) -> Result<GrammarCorrection> {
        require_input(text, Feature::Grammar)?;
        let prompt = self.prompts.grammar(text);
        let correction: GrammarCorrection =
            generate_record(self.grammar_client.as_ref(), &prompt, &grammar_shape()).await?;
        info!(errors = correction.errors.len(), "Grammar check complete");
        Ok(correction)
    }

    #[instrument(skip(self, prompt))]
    pub async fn generate_story(&self, prompt: &str, level: Level) -> Result<Story> {
        require_input(prompt, Feature::Story)?;
        let text = self
            .client
            .generate_text(&self.prompts.story(prompt, level))
            .await?;
        info!(chars = text.len(), "Story generated");
        Ok(Story { level, text })
    }

    /// Opens a new practice conversation with the tutor persona.
    pub fn start_conversation(&self) -> Conversation {
        info!("Opening conversation session");
        Conversation::open(self.client.as_ref(), self.prompts.tutor_persona())
    }
}

fn require_input(input: &str, feature: Feature) -> Result<()> {
    if input.trim().is_empty() {
        return Err(TutorError::Validation(
            feature.empty_input_message().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode_pcm16_base64;
    use crate::llm_client::{MockChatSession, MockModelClient};
    use crate::llm_client::ChatSession;
    use crate::models::Sender;
    use crate::view::Submission;
    use serde_json::json;

    fn vocabulary_payload() -> serde_json::Value {
        json!({
            "word": "candid",
            "definition": "Truthful and straightforward.",
            "examples": ["A candid answer.", "Candid photos.", "She was candid."],
            "synonyms": ["frank", "open"]
        })
    }

    #[tokio::test]
    async fn test_lookup_word_joins_info_and_audio() {
        let mut client = MockModelClient::new();
        client
            .expect_generate_structured()
            .withf(|prompt, shape| prompt.contains("\"candid\"") && *shape == vocabulary_shape())
            .times(1)
            .returning(|_, _| Ok(vocabulary_payload()));
        client
            .expect_generate_audio()
            .withf(|prompt, voice| prompt == "Say clearly: candid" && voice == "Kore")
            .times(1)
            .returning(|_, _| Ok(encode_pcm16_base64(&[0.5; 480])));

        let tutor = Tutor::new(Arc::new(client));
        let lookup = tutor.lookup_word("candid").await.unwrap();

        assert_eq!(lookup.info.synonyms, vec!["frank", "open"]);
        assert_eq!(lookup.pronunciation.decode().frames(), 480);
    }

    #[tokio::test]
    async fn test_lookup_word_fails_when_audio_missing() {
        let mut client = MockModelClient::new();
        client
            .expect_generate_structured()
            .returning(|_, _| Ok(vocabulary_payload()));
        client
            .expect_generate_audio()
            .returning(|_, _| Err(TutorError::NoAudioData));

        let tutor = Tutor::new(Arc::new(client)).with_voice("Puck");
        let err = tutor.lookup_word("candid").await.unwrap_err();
        assert!(matches!(err, TutorError::NoAudioData));
    }

    #[tokio::test]
    async fn test_lookup_word_fails_on_schema_violation() {
        let mut client = MockModelClient::new();
        client
            .expect_generate_structured()
            .returning(|_, _| Ok(json!({"word": "candid", "definition": "Frank."})));
        client
            .expect_generate_audio()
            .returning(|_, _| Ok(encode_pcm16_base64(&[0.0; 4])));

        let err = Tutor::new(Arc::new(client))
            .lookup_word("candid")
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_the_model() {
        // No expectations: any model call would panic.
        let tutor = Tutor::new(Arc::new(MockModelClient::new()));

        let err = tutor.lookup_word(" ").await.unwrap_err();
        assert!(matches!(err, TutorError::Validation(ref m) if m == "Please enter a word."));

        let err = tutor.check_grammar("\t\n").await.unwrap_err();
        assert!(
            matches!(err, TutorError::Validation(ref m) if m == "Please enter some text to check.")
        );

        let err = tutor.generate_story("", Level::Beginner).await.unwrap_err();
        assert!(matches!(err, TutorError::Validation(ref m) if m == "Please enter a story prompt."));
    }

    #[tokio::test]
    async fn test_check_grammar_uses_grammar_client() {
        let mut grammar = MockModelClient::new();
        grammar
            .expect_generate_structured()
            .withf(|prompt, _| prompt.ends_with("Text: \"I has a cat.\""))
            .times(1)
            .returning(|_, _| {
                Ok(json!({
                    "originalText": "I has a cat.",
                    "correctedText": "I have a cat.",
                    "errors": [{"error": "has", "explanation": "Use 'have' with 'I'."}]
                }))
            });

        let tutor =
            Tutor::new(Arc::new(MockModelClient::new())).with_grammar_client(Arc::new(grammar));
        let correction = tutor.check_grammar("I has a cat.").await.unwrap();

        assert_eq!(correction.corrected_text, "I have a cat.");
        assert!(!correction.is_clean());
    }

    #[tokio::test]
    async fn test_check_grammar_clean_text() {
        let mut client = MockModelClient::new();
        client.expect_generate_structured().returning(|_, _| {
            Ok(json!({
                "originalText": "I have a cat.",
                "correctedText": "I have a cat.",
                "errors": []
            }))
        });

        let correction = Tutor::new(Arc::new(client))
            .check_grammar("I have a cat.")
            .await
            .unwrap();
        assert!(correction.is_clean());
    }

    #[tokio::test]
    async fn test_generate_story_keeps_text_as_is() {
        let mut client = MockModelClient::new();
        client
            .expect_generate_text()
            .withf(|prompt| prompt.contains("at the Beginner level"))
            .times(1)
            .returning(|_| Ok("  Once upon a time.\n\nThe end.\n".to_string()));

        let story = Tutor::new(Arc::new(client))
            .generate_story("a lost puppy", Level::Beginner)
            .await
            .unwrap();
        assert_eq!(story.level, Level::Beginner);
        assert_eq!(story.text, "  Once upon a time.\n\nThe end.\n");
    }

    #[tokio::test]
    async fn test_start_conversation_uses_persona() {
        let mut client = MockModelClient::new();
        client
            .expect_open_session()
            .withf(|persona| persona.contains("English tutor named Alex"))
            .times(1)
            .returning(|_| {
                let mut session = MockChatSession::new();
                session
                    .expect_send()
                    .returning(|_| Ok("Nice to meet you!".to_string()));
                Box::new(session) as Box<dyn ChatSession>
            });

        let conversation = Tutor::new(Arc::new(client)).start_conversation();
        let reply = conversation.send("Hi").await.unwrap();
        assert!(matches!(reply, Submission::Completed(ref m) if m.sender == Sender::Bot));
        assert_eq!(conversation.messages().len(), 3);
    }
}
