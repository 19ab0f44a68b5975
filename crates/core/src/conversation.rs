//! A practice conversation: an append-only transcript backed by one remote
//! session handle.

use crate::{
    error::{Result, TutorError},
    llm_client::{ChatSession, ModelClient},
    models::{ChatMessage, Feature},
    view::Submission,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

pub const GREETING: &str =
    "Hello! I'm Alex, your AI English tutor. What would you like to talk about today?";

/// One conversation thread.
///
/// The session handle is owned exclusively and dropped with the conversation;
/// there is no explicit close. The transcript is only the display log, the
/// authoritative turn history stays inside the handle.
pub struct Conversation {
    session: tokio::sync::Mutex<Box<dyn ChatSession>>,
    transcript: Mutex<Vec<ChatMessage>>,
}

impl Conversation {
    /// Opens a session pinned to `persona` and seeds the transcript with the greeting.
    pub fn open(client: &dyn ModelClient, persona: &str) -> Self {
        Self::new(client.open_session(persona))
    }

    pub fn new(session: Box<dyn ChatSession>) -> Self {
        Self {
            session: tokio::sync::Mutex::new(session),
            transcript: Mutex::new(vec![ChatMessage::bot(GREETING)]),
        }
    }

    /// A snapshot of the transcript in append order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.transcript().clone()
    }

    /// True while a turn is in flight.
    pub fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }

    /// Sends one user turn and appends the reply.
    ///
    /// Blank input is rejected before anything is sent. A send attempted while
    /// another is outstanding is ignored. A failed reply is replaced by a
    /// synthetic bot message and the conversation stays usable.
    pub async fn send(&self, text: &str) -> Result<Submission<ChatMessage>> {
        if text.trim().is_empty() {
            return Err(TutorError::Validation(
                Feature::Conversation.empty_input_message().to_string(),
            ));
        }
        let Ok(mut session) = self.session.try_lock() else {
            debug!("Message ignored while a reply is outstanding");
            return Ok(Submission::Ignored);
        };

        self.transcript().push(ChatMessage::user(text));
        let reply = match session.send(text).await {
            Ok(reply) => ChatMessage::bot(reply),
            Err(err) => {
                error!(error = %err, "Failed to send message");
                ChatMessage::bot(Feature::Conversation.failure_message())
            }
        };
        self.transcript().push(reply.clone());
        Ok(Submission::Completed(reply))
    }

    fn transcript(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{MockChatSession, MockModelClient};
    use crate::models::Sender;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn texts(conversation: &Conversation) -> Vec<(Sender, String)> {
        conversation
            .messages()
            .into_iter()
            .map(|m| (m.sender, m.text))
            .collect()
    }

    #[tokio::test]
    async fn test_open_pins_persona_and_greets() {
        let mut client = MockModelClient::new();
        client
            .expect_open_session()
            .withf(|persona| persona == "You are Alex.")
            .times(1)
            .returning(|_| Box::new(MockChatSession::new()) as Box<dyn ChatSession>);

        let conversation = Conversation::open(&client, "You are Alex.");
        assert_eq!(conversation.messages(), vec![ChatMessage::bot(GREETING)]);
        assert!(!conversation.is_busy());
    }

    #[tokio::test]
    async fn test_turns_render_in_submission_order() {
        let mut session = MockChatSession::new();
        let mut seq = mockall::Sequence::new();
        session
            .expect_send()
            .withf(|text| text == "Hi")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("Hi there! How are you?".to_string()));
        session
            .expect_send()
            .withf(|text| text == "How do I use 'affect' vs 'effect'?")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("'Affect' is usually a verb.".to_string()));

        let conversation = Conversation::new(Box::new(session));
        conversation.send("Hi").await.unwrap();
        conversation
            .send("How do I use 'affect' vs 'effect'?")
            .await
            .unwrap();

        assert_eq!(
            texts(&conversation),
            vec![
                (Sender::Bot, GREETING.to_string()),
                (Sender::User, "Hi".to_string()),
                (Sender::Bot, "Hi there! How are you?".to_string()),
                (Sender::User, "How do I use 'affect' vs 'effect'?".to_string()),
                (Sender::Bot, "'Affect' is usually a verb.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_send_inserts_error_reply_and_stays_usable() {
        let mut session = MockChatSession::new();
        let mut seq = mockall::Sequence::new();
        session
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(TutorError::Transport("timeout".to_string())));
        session
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("Welcome back!".to_string()));

        let conversation = Conversation::new(Box::new(session));
        let first = conversation.send("Hello?").await.unwrap();
        assert!(matches!(
            first,
            Submission::Completed(ref m) if m.text == "Sorry, I encountered an error. Please try again."
        ));

        conversation.send("Hello again").await.unwrap();
        let messages = conversation.messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[4], ChatMessage::bot("Welcome back!"));
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected_without_sending() {
        // No expectations: any call to the session would panic.
        let conversation = Conversation::new(Box::new(MockChatSession::new()));
        let err = conversation.send("   \n").await.unwrap_err();
        assert!(matches!(err, TutorError::Validation(ref m) if m == "Please enter a message."));
        assert_eq!(conversation.messages().len(), 1);
    }

    struct GatedSession {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl ChatSession for GatedSession {
        async fn send(&mut self, text: &str) -> Result<String> {
            self.gate.notified().await;
            Ok(format!("reply to {text}"))
        }
    }

    #[tokio::test]
    async fn test_send_while_outstanding_is_ignored() {
        let gate = Arc::new(Notify::new());
        let conversation = Arc::new(Conversation::new(Box::new(GatedSession {
            gate: gate.clone(),
        })));

        let in_flight = {
            let conversation = conversation.clone();
            tokio::spawn(async move { conversation.send("first").await })
        };
        while !conversation.is_busy() {
            tokio::task::yield_now().await;
        }

        let second = conversation.send("second").await.unwrap();
        assert!(matches!(second, Submission::Ignored));

        gate.notify_one();
        let first = in_flight.await.unwrap().unwrap();
        assert!(matches!(first, Submission::Completed(ref m) if m.text == "reply to first"));

        let messages = conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], ChatMessage::user("first"));
        assert_eq!(messages[2], ChatMessage::bot("reply to first"));
    }
}
