//! `ModelClient` implementation for the Gemini Generative Language REST API.

use crate::{
    error::{Result, TutorError},
    llm_client::{ChatSession, ModelClient},
    schema::Shape,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";

// --- Local Gemini REST types ---
mod gemini_types {
    use crate::schema::Shape;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerateContentRequest<'a> {
        pub contents: Vec<Content>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub system_instruction: Option<Content>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub generation_config: Option<GenerationConfig<'a>>,
    }

    #[derive(Serialize, Deserialize, Debug, Clone)]
    pub(super) struct Content {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub role: Option<String>,
        #[serde(default)]
        pub parts: Vec<Part>,
    }

    impl Content {
        pub fn text(role: Option<&str>, text: &str) -> Self {
            Self {
                role: role.map(str::to_string),
                parts: vec![Part {
                    text: Some(text.to_string()),
                    inline_data: None,
                }],
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Part {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub inline_data: Option<Blob>,
    }

    #[derive(Serialize, Deserialize, Debug, Clone)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Blob {
        #[serde(default)]
        pub mime_type: String,
        pub data: String,
    }

    #[derive(Serialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerationConfig<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub response_mime_type: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub response_schema: Option<&'a Shape>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub response_modalities: Option<Vec<ResponseModality>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub speech_config: Option<SpeechConfig>,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "UPPERCASE")]
    pub(super) enum ResponseModality {
        Audio,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct SpeechConfig {
        pub voice_config: VoiceConfig,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct VoiceConfig {
        pub prebuilt_voice_config: PrebuiltVoiceConfig,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct PrebuiltVoiceConfig {
        pub voice_name: String,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerateContentResponse {
        #[serde(default)]
        pub candidates: Vec<Candidate>,
        pub prompt_feedback: Option<PromptFeedback>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Candidate {
        pub content: Option<Content>,
        pub finish_reason: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct PromptFeedback {
        pub block_reason: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ErrorEnvelope {
        pub error: ErrorBody,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ErrorBody {
        pub message: String,
    }
}

use gemini_types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    PrebuiltVoiceConfig, ResponseModality, SpeechConfig, VoiceConfig,
};

/// A Gemini client bound to one text model and one speech model.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<Arc<str>>,
    base_url: Arc<str>,
    model: String,
    speech_model: String,
}

impl GeminiClient {
    /// Creates a client for `model`.
    ///
    /// A missing API key is not an error here; the first call fails instead.
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.map(Arc::from),
            base_url: Arc::from(DEFAULT_BASE_URL),
            model: model.into(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Arc::from(base_url.trim_end_matches('/'));
        self
    }

    pub fn with_speech_model(mut self, speech_model: impl Into<String>) -> Self {
        self.speech_model = speech_model.into();
        self
    }

    /// A copy of this client that targets a different text model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TutorError::Transport("no API key configured".to_string()))?;

        debug!(%model, turns = request.contents.len(), "Sending generateContent request");
        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<gemini_types::ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            warn!(%model, %status, "Model service returned an error");
            return Err(TutorError::Transport(format!("{status}: {message}")));
        }

        Ok(response.json().await?)
    }
}

fn user_turn(text: &str) -> Content {
    Content::text(Some("user"), text)
}

fn structured_request<'a>(prompt: &str, shape: &'a Shape) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![user_turn(prompt)],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json"),
            response_schema: Some(shape),
            ..Default::default()
        }),
    }
}

fn audio_request(prompt: &str, voice: &str) -> GenerateContentRequest<'static> {
    GenerateContentRequest {
        contents: vec![user_turn(prompt)],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec![ResponseModality::Audio]),
            speech_config: Some(SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: voice.to_string(),
                    },
                },
            }),
            ..Default::default()
        }),
    }
}

/// Concatenates the text parts of the first candidate.
fn response_text(response: GenerateContentResponse) -> Result<String> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        TutorError::Transport(format!("model returned no response ({reason})"))
    })?;

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "empty".to_string());
        return Err(TutorError::Transport(format!(
            "model returned no text ({reason})"
        )));
    }
    Ok(text)
}

/// Finds the first inline audio payload in any candidate.
fn response_audio(response: GenerateContentResponse) -> Result<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.inline_data)
        .map(|blob| blob.data)
        .find(|data| !data.is_empty())
        .ok_or(TutorError::NoAudioData)
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate_structured(&self, prompt: &str, shape: &Shape) -> Result<Value> {
        let response = self
            .generate(&self.model, &structured_request(prompt, shape))
            .await?;
        let text = response_text(response)?;
        serde_json::from_str(text.trim()).map_err(|e| TutorError::SchemaViolation(e.to_string()))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![user_turn(prompt)],
            system_instruction: None,
            generation_config: None,
        };
        response_text(self.generate(&self.model, &request).await?)
    }

    async fn generate_audio(&self, prompt: &str, voice: &str) -> Result<String> {
        let response = self
            .generate(&self.speech_model, &audio_request(prompt, voice))
            .await?;
        response_audio(response)
    }

    fn open_session(&self, system_instruction: &str) -> Box<dyn ChatSession> {
        Box::new(GeminiSession {
            client: self.clone(),
            system_instruction: Content::text(None, system_instruction),
            history: Vec::new(),
        })
    }
}

/// A conversation whose turn history travels with every request.
struct GeminiSession {
    client: GeminiClient,
    system_instruction: Content,
    history: Vec<Content>,
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send(&mut self, text: &str) -> Result<String> {
        let mut contents = self.history.clone();
        contents.push(user_turn(text));
        let request = GenerateContentRequest {
            contents,
            system_instruction: Some(self.system_instruction.clone()),
            generation_config: None,
        };

        let reply = response_text(self.client.generate(&self.client.model, &request).await?)?;

        // Only completed exchanges become part of the history.
        self.history.push(user_turn(text));
        self.history.push(Content::text(Some("model"), &reply));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::vocabulary_shape;
    use serde_json::json;

    fn parse(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_structured_request_body() {
        let shape = vocabulary_shape();
        let body = serde_json::to_value(structured_request("Define \"cat\"", &shape)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Define \"cat\"");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert!(body.get("systemInstruction").is_none());
        assert!(body["generationConfig"].get("speechConfig").is_none());
    }

    #[test]
    fn test_audio_request_body() {
        let body = serde_json::to_value(audio_request("Say: cat", "Kore")).unwrap();
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            json!(["AUDIO"])
        );
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert!(body["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Once upon "}, {"text": "a time."}]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(response_text(response).unwrap(), "Once upon a time.");
    }

    #[test]
    fn test_response_text_reports_block_reason() {
        let response = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        let err = response_text(response).unwrap_err();
        assert!(matches!(err, TutorError::Transport(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn test_response_audio_finds_first_inline_payload() {
        let response = parse(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "here you go"},
                    {"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AEA="}}
                ]}
            }]
        }));
        assert_eq!(response_audio(response).unwrap(), "AEA=");
    }

    #[test]
    fn test_response_audio_without_payload() {
        let response = parse(json!({
            "candidates": [{"content": {"parts": [{"text": "I can't say that."}]}}]
        }));
        assert!(matches!(
            response_audio(response),
            Err(TutorError::NoAudioData)
        ));

        assert!(matches!(
            response_audio(parse(json!({}))),
            Err(TutorError::NoAudioData)
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_on_first_call() {
        let client = GeminiClient::new(None, DEFAULT_TEXT_MODEL);
        let err = client.generate_text("hello").await.unwrap_err();
        assert!(matches!(err, TutorError::Transport(ref m) if m == "no API key configured"));
    }

    #[test]
    fn test_client_configuration() {
        let client = GeminiClient::new(Some("key".to_string()), DEFAULT_TEXT_MODEL)
            .with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(
            client.endpoint(client.model()),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );

        let pro = client.with_model("gemini-2.5-pro");
        assert_eq!(pro.model(), "gemini-2.5-pro");
        assert_eq!(client.model(), DEFAULT_TEXT_MODEL);
    }
}
