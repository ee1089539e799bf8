//! Damay Library
//!
//! Terminal client for a school assistant backend that streams its reasoning
//! as newline-delimited JSON.
//!
//! ## Main Components
//!
//! - [`stream`] - NDJSON framing and the thought dispatcher
//! - [`format`] - answer formatting (citations, code blocks, markup to HTML)
//! - [`session`] - conversation history and regeneration
//! - [`client`] - HTTP client for the backend API
//! - [`messaging`] - message bus and terminal renderer
//! - [`config`] - settings and XDG paths
//! - [`cli`] - REPL, commands and runner
//!
//! ## Quick Start
//!
//! ```ignore
//! use damay::{ApiClient, ChatSession, ClientSettings, ThoughtDispatcher};
//! use futures::StreamExt;
//!
//! let client = ApiClient::new(&ClientSettings::default())?;
//! let mut chat = ChatSession::new();
//! chat.append_user("Kapan pendaftaran dibuka?");
//!
//! let mut dispatcher = ThoughtDispatcher::new(chat.id());
//! let request = chat.pending_request().unwrap();
//! let mut events = Box::pin(client.stream_thoughts(&request).await?);
//! while let Some(event) = events.next().await {
//!     dispatcher.dispatch(event?, &mut chat);
//! }
//! dispatcher.finish();
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod format;
pub mod messaging;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use client::{ApiClient, ChatRequest, ClientError, DataFilter, KnowledgeItem, ProcessKind};
pub use config::{ChatMode, ClientSettings, RenderMode, XdgDirs};
pub use format::{extract_citations, format_answer, strip_citations, Citation, FormattedAnswer};
pub use messaging::{Message, MessageBus, MessageSender, Spinner, SpinnerHandle, TerminalRenderer};
pub use session::{ChatBackend, ChatSession, ChatTurn, Role, SessionError, SessionId};
pub use stream::{EventFramer, RenderedThought, StepKind, ThoughtDispatcher, ThoughtEvent};
