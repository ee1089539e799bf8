//! Thought dispatcher: turns framed events into the visible reasoning log.
//!
//! One dispatcher serves exactly one answer turn. It is tagged with the
//! [`SessionId`] that was active when the request went out; events arriving
//! after that session was reset are discarded instead of touching the new
//! session.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DocRef, EventData, StepKind, ThoughtEvent};
use crate::session::{ChatSession, SessionId};

/// Lifecycle of one streamed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    Streaming,
    Terminal,
    Aborted,
}

/// How a step is shown in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderRule {
    /// Single plain line.
    Plain,
    /// Stage header with a label.
    Stage(&'static str),
    /// Indented, dimmed detail line.
    Detail,
    /// A knowledge source returned matches; the data is quoted.
    Found,
    /// One block per retrieved document.
    Documents,
    /// Synthesized context block.
    Context,
    /// Warning or error.
    Alert,
    /// The final answer.
    Answer,
    /// A step this client has no dedicated rule for.
    Generic,
}

impl StepKind {
    /// Rendering rule for this step.
    pub fn render_rule(&self) -> RenderRule {
        match self {
            Self::Start => RenderRule::Plain,
            Self::MemorySearch => RenderRule::Stage("Memory"),
            Self::ManualSearch => RenderRule::Stage("Manual"),
            Self::ScrapeSearch => RenderRule::Stage("Scrape"),
            Self::Retrieval => RenderRule::Stage("Retrieval"),
            Self::Refining => RenderRule::Stage("Refine"),
            Self::FinalPrompt => RenderRule::Stage("Compose"),
            Self::MemoryNotFound | Self::ManualNotFound | Self::ScrapeNotFound => {
                RenderRule::Detail
            }
            Self::MemoryFound | Self::ManualFound | Self::ScrapeFound => RenderRule::Found,
            Self::RetrievedDocs => RenderRule::Documents,
            Self::RefinedContext => RenderRule::Context,
            Self::Warning | Self::Error => RenderRule::Alert,
            Self::FinalAnswer => RenderRule::Answer,
            Self::Other(_) => RenderRule::Generic,
        }
    }
}

/// Visual style of one log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Plain,
    Stage,
    Detail,
    Found,
    Quote,
    Document,
    Context,
    Alert,
    Answer,
}

/// A single rendered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub style: LineStyle,
    pub text: String,
}

impl LogLine {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// The rendered form of one thought event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedThought {
    pub step: StepKind,
    pub lines: Vec<LogLine>,
}

impl RenderedThought {
    /// Render an event according to its step's rule.
    pub fn render(event: &ThoughtEvent) -> Self {
        let text = event.data.display_text();
        let lines = match event.step.render_rule() {
            RenderRule::Plain => vec![LogLine::new(LineStyle::Plain, format!("> {}", text))],
            RenderRule::Stage(label) => {
                vec![LogLine::new(LineStyle::Stage, format!("> [{}] {}", label, text))]
            }
            RenderRule::Detail => vec![LogLine::new(LineStyle::Detail, format!("> {}", text))],
            RenderRule::Found => vec![
                LogLine::new(LineStyle::Found, "Match found. Using it as priority context."),
                LogLine::new(LineStyle::Quote, format!("\"{}\"", text)),
            ],
            RenderRule::Documents => match &event.data {
                EventData::Docs(docs) => render_documents(docs),
                EventData::Text(text) => vec![LogLine::new(LineStyle::Document, text.clone())],
            },
            RenderRule::Context => vec![LogLine::new(LineStyle::Context, text)],
            RenderRule::Alert => vec![LogLine::new(LineStyle::Alert, format!("> {}", text))],
            RenderRule::Answer => vec![
                LogLine::new(LineStyle::Stage, "Final answer:"),
                LogLine::new(LineStyle::Answer, text),
            ],
            RenderRule::Generic => vec![LogLine::new(
                LineStyle::Plain,
                format!("> [{}] {}", event.step, text),
            )],
        };

        Self {
            step: event.step.clone(),
            lines,
        }
    }

    fn error(message: &str) -> Self {
        Self::render(&ThoughtEvent::text(StepKind::Error, message))
    }
}

fn render_documents(docs: &[DocRef]) -> Vec<LogLine> {
    docs.iter()
        .flat_map(|doc| {
            [
                LogLine::new(LineStyle::Document, format!("Document found: {}", doc.source)),
                LogLine::new(LineStyle::Quote, format!("\"{}\"", doc.content)),
            ]
        })
        .collect()
}

/// Consumes thought events for one answer turn.
#[derive(Debug)]
pub struct ThoughtDispatcher {
    session: SessionId,
    state: DispatchState,
    log: Vec<RenderedThought>,
    final_answer: Option<String>,
}

impl ThoughtDispatcher {
    /// Create a dispatcher bound to the session that issued the request.
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            state: DispatchState::Idle,
            log: Vec::new(),
            final_answer: None,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Visible log, in arrival order.
    pub fn log(&self) -> &[RenderedThought] {
        &self.log
    }

    /// Raw text of the terminal event, if one arrived.
    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    pub fn into_log(self) -> Vec<RenderedThought> {
        self.log
    }

    /// Dispatch one event.
    ///
    /// Returns the rendered entry, or `None` when the event belongs to a
    /// session that is no longer active.
    pub fn dispatch(
        &mut self,
        event: ThoughtEvent,
        chat: &mut ChatSession,
    ) -> Option<&RenderedThought> {
        if chat.id() != self.session {
            debug!(
                stream_session = %self.session,
                active_session = %chat.id(),
                step = %event.step,
                "Discarding event from superseded session"
            );
            return None;
        }

        if self.state == DispatchState::Idle {
            self.state = DispatchState::Streaming;
        }

        if event.is_terminal() && self.state == DispatchState::Streaming {
            let answer = event.data.display_text();
            if let Err(e) = chat.append_model(answer.clone()) {
                warn!(error = %e, "Final answer could not be recorded in history");
            }
            self.final_answer = Some(answer);
            self.state = DispatchState::Terminal;
        } else if event.is_terminal() {
            debug!(state = ?self.state, "Ignoring repeated terminal event for history");
        }

        self.log.push(RenderedThought::render(&event));
        self.log.last()
    }

    /// Record a transport failure. The turn ends without a model answer.
    pub fn abort(&mut self, reason: &str) -> &RenderedThought {
        warn!(session = %self.session, reason, "Thought stream aborted");
        self.state = DispatchState::Aborted;
        self.log.push(RenderedThought::error(reason));
        // Just pushed.
        &self.log[self.log.len() - 1]
    }

    /// Close the turn at end of stream.
    ///
    /// A stream that ends before `final_answer` aborts the turn and returns
    /// the error entry that was logged.
    pub fn finish(&mut self) -> Option<&RenderedThought> {
        match self.state {
            DispatchState::Terminal | DispatchState::Aborted => None,
            DispatchState::Idle | DispatchState::Streaming => {
                Some(self.abort("Stream ended without a final answer"))
            }
        }
    }
}
