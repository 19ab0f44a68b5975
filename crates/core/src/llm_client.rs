use crate::{
    audio,
    error::{Result, TutorError},
    schema::{Shape, ShapeType},
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// A generic client for a hosted generative model.
///
/// Every method is a single request/response call. Nothing is retried and no
/// timeout is applied here; callers own both decisions.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One-shot call whose output must conform to `shape`.
    ///
    /// Returns the parsed JSON payload. Output that is not valid JSON fails
    /// with `SchemaViolation`; use [`generate_record`] to also check the shape
    /// and decode a typed record.
    async fn generate_structured(&self, prompt: &str, shape: &Shape) -> Result<Value>;

    /// One-shot free-text completion. The text is returned as-is.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// One-shot call constrained to an audio response.
    ///
    /// Returns the first inline audio payload (base64 PCM), or `NoAudioData`.
    async fn generate_audio(&self, prompt: &str, voice: &str) -> Result<String>;

    /// Opens a conversation pinned to `system_instruction` for its lifetime.
    fn open_session(&self, system_instruction: &str) -> Box<dyn ChatSession>;
}

/// An opaque handle to one conversation thread.
///
/// The turn history belongs to the handle and is never exposed. `send` takes
/// `&mut self`, so one handle can only ever have one turn in flight.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatSession: Send {
    /// Sends a user turn and returns the model's reply.
    async fn send(&mut self, text: &str) -> Result<String>;
}

/// Requests a structured response, validates it against `shape`, and decodes it.
///
/// Never returns a partially-typed record: anything that does not match the
/// contract is a `SchemaViolation`.
pub async fn generate_record<T: DeserializeOwned>(
    client: &dyn ModelClient,
    prompt: &str,
    shape: &Shape,
) -> Result<T> {
    let value = client.generate_structured(prompt, shape).await?;
    shape.validate(&value)?;
    serde_json::from_value(value).map_err(|e| TutorError::SchemaViolation(e.to_string()))
}

/// A deterministic, in-process `ModelClient` for development and integration testing.
///
/// Structured calls answer with a registered payload for the requested shape,
/// or a payload synthesized from the shape itself. Nothing touches the network.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModelClient {
    structured: Vec<(Shape, Value)>,
    text: Option<String>,
    audio: Option<String>,
    replies: Vec<String>,
    without_audio: bool,
    failure: Option<String>,
    latency: Option<Duration>,
}

impl ScriptedModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers structured calls for `shape` with `payload`, unchecked.
    pub fn with_structured(mut self, shape: Shape, payload: Value) -> Self {
        self.structured.push((shape, payload));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Answers audio calls with `samples` encoded as the speech model would.
    pub fn with_audio(mut self, samples: &[f32]) -> Self {
        self.audio = Some(audio::encode_pcm16_base64(samples));
        self
    }

    /// Makes every audio call fail with `NoAudioData`.
    pub fn without_audio(mut self) -> Self {
        self.without_audio = true;
        self
    }

    /// Replies sessions cycle through, in order.
    pub fn with_replies<I, S>(mut self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies = replies.into_iter().map(Into::into).collect();
        self
    }

    /// Makes every call fail with a transport error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Delays every response, so callers can observe in-flight state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn respond(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(message) => Err(TutorError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn generate_structured(&self, prompt: &str, shape: &Shape) -> Result<Value> {
        self.respond().await?;
        let registered = self
            .structured
            .iter()
            .find(|(candidate, _)| candidate == shape)
            .map(|(_, payload)| payload.clone());
        Ok(registered.unwrap_or_else(|| synthesize(shape, prompt)))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.respond().await?;
        Ok(self.text.clone().unwrap_or_else(|| prompt.to_string()))
    }

    async fn generate_audio(&self, _prompt: &str, _voice: &str) -> Result<String> {
        self.respond().await?;
        if self.without_audio {
            return Err(TutorError::NoAudioData);
        }
        Ok(self
            .audio
            .clone()
            .unwrap_or_else(|| audio::encode_pcm16_base64(&[0.0; 2400])))
    }

    fn open_session(&self, _system_instruction: &str) -> Box<dyn ChatSession> {
        Box::new(ScriptedSession {
            client: self.clone(),
            turn: 0,
        })
    }
}

struct ScriptedSession {
    client: ScriptedModelClient,
    turn: usize,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send(&mut self, text: &str) -> Result<String> {
        self.client.respond().await?;
        let replies = &self.client.replies;
        let reply = if replies.is_empty() {
            format!("You said: {text}")
        } else {
            replies[self.turn % replies.len()].clone()
        };
        self.turn += 1;
        Ok(reply)
    }
}

/// Builds the smallest payload that satisfies `shape`, filling strings with `seed`.
fn synthesize(shape: &Shape, seed: &str) -> Value {
    match shape.kind {
        ShapeType::String => Value::String(seed.to_string()),
        ShapeType::Array => Value::Array(
            shape
                .items
                .as_deref()
                .map(|items| vec![synthesize(items, seed)])
                .unwrap_or_default(),
        ),
        ShapeType::Object => Value::Object(
            shape
                .properties
                .iter()
                .map(|(name, property)| (name.clone(), synthesize(property, seed)))
                .collect::<Map<String, Value>>(),
        ),
    }
}
