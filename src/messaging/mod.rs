//! Display messaging.
//!
//! The chat loop never prints directly. It publishes [`Message`]s on a
//! [`MessageBus`], and a [`TerminalRenderer`] drains them:
//!
//! ```text
//!   ThoughtDispatcher ─┐
//!   answers ───────────┼─▶ MessageSender ──▶ MessageBus ──▶ TerminalRenderer
//!   process logs ──────┘                      (broadcast)    (drops stale sessions)
//! ```
//!
//! Reasoning entries and answers carry the [`SessionId`](crate::session::SessionId)
//! they were produced for. After `/new` the renderer is drained against the
//! new session, so anything still queued for the old one is discarded.

mod bus;
mod renderer;
mod spinner;
mod types;

pub use bus::{BusError, MessageBus, MessageReceiver, MessageSender};
pub use renderer::{RenderStyle, TerminalRenderer};
pub use spinner::{Spinner, SpinnerConfig, SpinnerHandle};
pub use types::*;
