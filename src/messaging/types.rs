//! Message types published on the bus.

use serde::{Deserialize, Serialize};

use crate::config::RenderMode;
use crate::format::{format_answer, strip_citations, Citation};
use crate::session::SessionId;
use crate::stream::RenderedThought;

/// Message levels for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl MessageLevel {
    /// Level of a plain-text process log line.
    pub fn classify(line: &str) -> Self {
        let lower = line.to_lowercase();
        if lower.contains("error") {
            Self::Error
        } else if lower.contains("success") {
            Self::Success
        } else {
            Self::Info
        }
    }
}

/// A text message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub level: MessageLevel,
    pub text: String,
}

/// One entry of the reasoning log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtMessage {
    pub session: SessionId,
    pub entry: RenderedThought,
}

/// A model answer ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerMessage {
    pub session: SessionId,
    /// Markdown with citation tokens removed.
    pub content: String,
    /// Formatted HTML, when HTML output was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub citations: Vec<Citation>,
}

impl AnswerMessage {
    /// Build from the raw answer text.
    pub fn from_raw(session: SessionId, raw: &str, render: RenderMode) -> Self {
        match render {
            RenderMode::Terminal => {
                let (content, citations) = strip_citations(raw);
                Self {
                    session,
                    content,
                    html: None,
                    citations,
                }
            }
            RenderMode::Html => {
                let formatted = format_answer(raw);
                let (content, _) = strip_citations(raw);
                Self {
                    session,
                    content,
                    html: Some(formatted.html),
                    citations: formatted.citations,
                }
            }
        }
    }
}

/// A line from a maintenance job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMessage {
    pub process: String,
    pub level: MessageLevel,
    pub text: String,
}

/// Any message type (for serialization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Text(TextMessage),
    Thought(ThoughtMessage),
    Answer(AnswerMessage),
    Process(ProcessMessage),
    Divider,
}

impl Message {
    /// Create an info message.
    pub fn info(text: impl Into<String>) -> Self {
        Self::text(MessageLevel::Info, text)
    }

    /// Create a success message.
    pub fn success(text: impl Into<String>) -> Self {
        Self::text(MessageLevel::Success, text)
    }

    /// Create a warning message.
    pub fn warning(text: impl Into<String>) -> Self {
        Self::text(MessageLevel::Warning, text)
    }

    /// Create an error message.
    pub fn error(text: impl Into<String>) -> Self {
        Self::text(MessageLevel::Error, text)
    }

    fn text(level: MessageLevel, text: impl Into<String>) -> Self {
        Self::Text(TextMessage {
            level,
            text: text.into(),
        })
    }

    pub fn thought(session: SessionId, entry: RenderedThought) -> Self {
        Self::Thought(ThoughtMessage { session, entry })
    }

    pub fn answer(session: SessionId, raw: &str, render: RenderMode) -> Self {
        Self::Answer(AnswerMessage::from_raw(session, raw, render))
    }

    /// A process log line, classified by its wording.
    pub fn process(process: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::Process(ProcessMessage {
            process: process.into(),
            level: MessageLevel::classify(&text),
            text,
        })
    }

    /// Session the message belongs to, if it is session-scoped.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            Self::Thought(m) => Some(m.session),
            Self::Answer(m) => Some(m.session),
            Self::Text(_) | Self::Process(_) | Self::Divider => None,
        }
    }

    /// Whether the message should be shown while `active` is the session.
    pub fn is_current(&self, active: SessionId) -> bool {
        self.session().map_or(true, |s| s == active)
    }
}
