//! Request and response bodies of the backend HTTP API.

use serde::{Deserialize, Serialize};

use crate::session::{ChatTurn, Role};

/// One text part of a history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePart {
    pub text: String,
}

/// A history entry in the `{role, parts: [{text}]}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTurn {
    pub role: Role,
    pub parts: Vec<WirePart>,
}

impl From<&ChatTurn> for WireTurn {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            parts: vec![WirePart {
                text: turn.text.clone(),
            }],
        }
    }
}

/// Body of `/api/chat` and `/api/admin_chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub history: Vec<WireTurn>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>, history: &[ChatTurn]) -> Self {
        Self {
            query: query.into(),
            history: history.iter().map(WireTurn::from).collect(),
        }
    }
}

/// Non-streaming chat response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Generic `{status, message}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl StatusResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SaveMemoryRequest<'a> {
    pub question: &'a str,
    pub answer: &'a str,
}

/// Long-running maintenance jobs that stream plain-text logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    Scrape,
    Reindex,
}

impl ProcessKind {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Scrape => "/api/scrape",
            Self::Reindex => "/api/reindex",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Scrape => "Scraping",
            Self::Reindex => "Indexing",
        }
    }
}

/// Origin of a stored knowledge item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataKind {
    #[serde(rename = "Scrap")]
    Scraped,
    Manual,
    Memory,
    #[serde(other)]
    Unknown,
}

/// Read-only view of an item in the knowledge store.
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeItem {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(rename = "type", default = "unknown_kind")]
    pub kind: DataKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

fn unknown_kind() -> DataKind {
    DataKind::Unknown
}

impl KnowledgeItem {
    /// Identifier as shown to the user; backends use both ints and strings.
    pub fn display_id(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "?".to_string(),
            other => other.to_string(),
        }
    }
}

/// Which knowledge items a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFilter {
    #[default]
    All,
    Scraped,
    Manual,
    Memory,
}

impl DataFilter {
    pub fn matches(&self, kind: DataKind) -> bool {
        match self {
            Self::All => true,
            Self::Scraped => kind == DataKind::Scraped,
            Self::Manual => kind == DataKind::Manual,
            Self::Memory => kind == DataKind::Memory,
        }
    }

    pub fn apply<'a>(&self, items: &'a [KnowledgeItem]) -> Vec<&'a KnowledgeItem> {
        items.iter().filter(|item| self.matches(item.kind)).collect()
    }
}

impl std::str::FromStr for DataFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "scraped" | "scrap" | "scrape" => Ok(Self::Scraped),
            "manual" => Ok(Self::Manual),
            "memory" => Ok(Self::Memory),
            other => Err(format!("Unknown filter: {}", other)),
        }
    }
}

impl std::fmt::Display for DataFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Scraped => "scraped",
            Self::Manual => "manual",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}
