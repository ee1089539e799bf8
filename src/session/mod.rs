//! Conversation history for one chat.
//!
//! A [`ChatSession`] owns the ordered list of user/model turns that is sent
//! back to the backend with every request. It is the only place history is
//! mutated, and every mutation goes through `&mut self`, so a regeneration
//! always completes (or fails) before another change can be made.
//!
//! ## Invariants
//!
//! - The history never ends with two consecutive model turns.
//! - A model turn is only appended directly after a user turn.
//! - Failed requests leave no model turn behind; errors are shown to the user
//!   but never stored in history.
//!
//! ## Usage
//!
//! ```ignore
//! let mut chat = ChatSession::new();
//! chat.append_user("Kapan pendaftaran dibuka?");
//! let request = chat.pending_request().unwrap();
//! let answer = client.chat(&request).await?;
//! chat.append_model(answer)?;
//!
//! // Not happy with it? Ask again for the same question.
//! chat.regenerate(&client).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{ChatRequest, ClientError};

/// Error type for history operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Nothing to regenerate: the last turn is not a model answer")]
    NothingToRegenerate,

    #[error("A model answer must follow a user question")]
    AnswerWithoutQuestion,

    #[error("Request failed: {0}")]
    Backend(#[from] ClientError),
}

/// Identity of a chat session. Changes on every reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The short form is enough to tell sessions apart in logs.
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Something that can answer a chat request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn ask(&self, request: &ChatRequest) -> Result<String, ClientError>;
}

/// Ordered conversation history.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    id: SessionId,
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_role(&self) -> Option<Role> {
        self.turns.last().map(|t| t.role)
    }

    /// Record a user question.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn::user(text));
    }

    /// Record the answer to the trailing user question.
    pub fn append_model(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if self.last_role() != Some(Role::User) {
            return Err(SessionError::AnswerWithoutQuestion);
        }
        self.turns.push(ChatTurn::model(text));
        Ok(())
    }

    /// Request for the trailing, still unanswered user question.
    ///
    /// The history includes that question, matching what the backend expects.
    pub fn pending_request(&self) -> Option<ChatRequest> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::User => {
                Some(ChatRequest::new(turn.text.clone(), &self.turns))
            }
            _ => None,
        }
    }

    /// The most recent answered question and its answer.
    pub fn last_exchange(&self) -> Option<(&str, &str)> {
        match self.turns.as_slice() {
            [.., question, answer] if question.role == Role::User && answer.role == Role::Model => {
                Some((question.text.as_str(), answer.text.as_str()))
            }
            _ => None,
        }
    }

    /// Drop the last model answer and return the request that re-asks its
    /// question.
    ///
    /// Used directly when the new answer arrives over the thought stream;
    /// [`ChatSession::regenerate`] wraps it for the request/response path.
    pub fn prepare_regenerate(&mut self) -> Result<ChatRequest, SessionError> {
        if self.last_role() != Some(Role::Model) {
            return Err(SessionError::NothingToRegenerate);
        }
        self.turns.pop();
        debug!(session = %self.id, turns = self.turns.len(), "Removed last answer for regeneration");
        self.pending_request()
            .ok_or(SessionError::AnswerWithoutQuestion)
    }

    /// Replace the last model answer with a fresh one.
    ///
    /// On failure the history keeps the question without an answer.
    pub async fn regenerate(&mut self, backend: &dyn ChatBackend) -> Result<&str, SessionError> {
        let request = self.prepare_regenerate()?;
        let answer = backend.ask(&request).await?;
        self.append_model(answer)?;
        info!(session = %self.id, "Regenerated answer");
        Ok(self.turns.last().map(|t| t.text.as_str()).unwrap_or_default())
    }

    /// Start over with an empty history under a new identity.
    ///
    /// Only local history is cleared; memory stored on the backend is not
    /// affected.
    pub fn reset(&mut self) {
        let old = self.id;
        self.turns.clear();
        self.id = SessionId::new();
        debug!(old = %old, new = %self.id, "Session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Backend returning canned answers and remembering the requests.
    struct ScriptedBackend {
        answers: Mutex<Vec<Result<String, ClientError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(answers: Vec<Result<String, ClientError>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn ask(&self, request: &ChatRequest) -> Result<String, ClientError> {
            self.seen.lock().unwrap().push(request.clone());
            self.answers.lock().unwrap().remove(0)
        }
    }

    fn answered(question: &str, answer: &str) -> ChatSession {
        let mut chat = ChatSession::new();
        chat.append_user(question);
        chat.append_model(answer).unwrap();
        chat
    }

    // =========================================================================
    // Append Tests
    // =========================================================================

    #[test]
    fn test_new_session_is_empty() {
        let chat = ChatSession::new();
        assert!(chat.is_empty());
        assert!(chat.pending_request().is_none());
        assert!(chat.last_exchange().is_none());
    }

    #[test]
    fn test_append_model_requires_question() {
        let mut chat = ChatSession::new();
        assert!(matches!(
            chat.append_model("orphan"),
            Err(SessionError::AnswerWithoutQuestion)
        ));

        let mut chat = answered("A", "B");
        assert!(chat.append_model("B again").is_err());
        assert_eq!(chat.turns().len(), 2);
    }

    #[test]
    fn test_pending_request_includes_question_in_history() {
        let mut chat = answered("A", "B");
        chat.append_user("C");
        let request = chat.pending_request().unwrap();
        assert_eq!(request.query, "C");
        assert_eq!(request.history.len(), 3);
        assert_eq!(request.history[2].parts[0].text, "C");
    }

    #[test]
    fn test_last_exchange() {
        let chat = answered("Q", "A");
        assert_eq!(chat.last_exchange(), Some(("Q", "A")));
    }

    // =========================================================================
    // Regenerate Tests
    // =========================================================================

    #[tokio::test]
    async fn test_regenerate_replaces_last_answer() {
        let mut chat = answered("A", "B");
        let backend = ScriptedBackend::new(vec![Ok("B2".to_string())]);

        let answer = chat.regenerate(&backend).await.unwrap().to_string();
        assert_eq!(answer, "B2");
        assert_eq!(chat.turns(), &[ChatTurn::user("A"), ChatTurn::model("B2")]);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].query, "A");
        assert_eq!(seen[0].history.len(), 1, "removed answer must not be sent");
    }

    #[tokio::test]
    async fn test_regenerate_failure_leaves_question_unanswered() {
        let mut chat = answered("A", "B");
        let backend = ScriptedBackend::new(vec![Err(ClientError::Remote("down".into()))]);

        let err = chat.regenerate(&backend).await.unwrap_err();
        assert!(matches!(err, SessionError::Backend(_)));
        assert_eq!(chat.turns(), &[ChatTurn::user("A")]);

        // The question can still be answered normally afterwards.
        chat.append_model("B3").unwrap();
        assert_eq!(chat.turns().len(), 2);
    }

    #[tokio::test]
    async fn test_regenerate_without_answer_is_rejected() {
        let mut chat = ChatSession::new();
        chat.append_user("A");
        let backend = ScriptedBackend::new(vec![]);

        assert!(matches!(
            chat.regenerate(&backend).await,
            Err(SessionError::NothingToRegenerate)
        ));
        assert_eq!(chat.turns().len(), 1);
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    // =========================================================================
    // Reset Tests
    // =========================================================================

    #[test]
    fn test_reset_clears_history_and_changes_id() {
        let mut chat = answered("A", "B");
        let before = chat.id();
        chat.reset();
        assert!(chat.is_empty());
        assert_ne!(chat.id(), before);
    }

    #[test]
    fn test_session_id_display_is_short() {
        assert_eq!(SessionId::new().to_string().len(), 8);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
