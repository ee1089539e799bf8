//! Thought event types as they arrive on the wire.
//!
//! Each NDJSON record is `{"step": "...", "data": ...}` where `data` is either
//! a string or a list of retrieved document snippets.

use serde::{Deserialize, Serialize};

/// Kind of reasoning step reported by the backend.
///
/// The set is open: steps this client does not know about are kept as
/// [`StepKind::Other`] so they are still logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    Start,
    MemorySearch,
    MemoryFound,
    MemoryNotFound,
    ManualSearch,
    ManualFound,
    ManualNotFound,
    ScrapeSearch,
    ScrapeFound,
    ScrapeNotFound,
    Retrieval,
    RetrievedDocs,
    Refining,
    RefinedContext,
    FinalPrompt,
    Warning,
    Error,
    FinalAnswer,
    Other(String),
}

impl StepKind {
    /// Wire name of the step.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::MemorySearch => "memory_search",
            Self::MemoryFound => "memory_found",
            Self::MemoryNotFound => "memory_not_found",
            Self::ManualSearch => "manual_search",
            Self::ManualFound => "manual_found",
            Self::ManualNotFound => "manual_not_found",
            Self::ScrapeSearch => "scrape_search",
            Self::ScrapeFound => "scrape_found",
            Self::ScrapeNotFound => "scrape_not_found",
            Self::Retrieval => "retrieval",
            Self::RetrievedDocs => "retrieved_docs",
            Self::Refining => "refining",
            Self::RefinedContext => "refined_context",
            Self::FinalPrompt => "final_prompt",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::FinalAnswer => "final_answer",
            Self::Other(name) => name,
        }
    }

    /// Whether this step ends a streaming turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalAnswer)
    }
}

impl From<String> for StepKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "start" => Self::Start,
            "memory_search" => Self::MemorySearch,
            "memory_found" => Self::MemoryFound,
            "memory_not_found" => Self::MemoryNotFound,
            "manual_search" => Self::ManualSearch,
            "manual_found" => Self::ManualFound,
            "manual_not_found" => Self::ManualNotFound,
            "scrape_search" => Self::ScrapeSearch,
            "scrape_found" => Self::ScrapeFound,
            "scrape_not_found" => Self::ScrapeNotFound,
            "retrieval" => Self::Retrieval,
            "retrieved_docs" => Self::RetrievedDocs,
            "refining" => Self::Refining,
            "refined_context" => Self::RefinedContext,
            "final_prompt" => Self::FinalPrompt,
            "warning" => Self::Warning,
            "error" => Self::Error,
            "final_answer" => Self::FinalAnswer,
            _ => Self::Other(name),
        }
    }
}

impl From<StepKind> for String {
    fn from(step: StepKind) -> Self {
        match step {
            StepKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieved evidence snippet attached to a `retrieved_docs` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub content: String,
}

/// Payload of a thought event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Text(String),
    Docs(Vec<DocRef>),
}

impl Default for EventData {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl EventData {
    /// Text form of the payload. Document lists collapse to their sources.
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Docs(docs) => docs
                .iter()
                .map(|doc| doc.source.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// One unit of the streamed reasoning trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtEvent {
    pub step: StepKind,
    #[serde(default)]
    pub data: EventData,
}

impl ThoughtEvent {
    pub fn new(step: StepKind, data: EventData) -> Self {
        Self { step, data }
    }

    pub fn text(step: StepKind, text: impl Into<String>) -> Self {
        Self::new(step, EventData::Text(text.into()))
    }

    /// Parse a single framed record.
    pub fn parse(record: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(record)
    }

    pub fn is_terminal(&self) -> bool {
        self.step.is_terminal()
    }
}
