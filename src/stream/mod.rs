//! Streamed reasoning trace consumption.
//!
//! ```text
//!   bytes ──▶ EventFramer ──▶ records ──▶ ThoughtEvent ──▶ ThoughtDispatcher
//!                                  │ (parse failure: warn + drop)    │
//!                                                                    ▼
//!                                                     visible log + ChatSession
//! ```

mod dispatcher;
mod event;
mod framer;

pub use dispatcher::{
    DispatchState, LineStyle, LogLine, RenderRule, RenderedThought, ThoughtDispatcher,
};
pub use event::{DocRef, EventData, StepKind, ThoughtEvent};
pub use framer::{frame_lines, parse_events, EventFramer};
