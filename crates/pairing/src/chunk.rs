//! Typed chunks of a streamed intervention.
//!
//! A stream is finite and non-restartable: `metadata` first, zero or
//! more `content` fragments in production order, then exactly one
//! terminal `done` or `error`.

use serde::Serialize;

use pf_domain::session::{InterventionKind, Level};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterventionChunk {
    /// Chosen level and type; emitted once before any content.
    Metadata { level: Level, kind: InterventionKind },
    /// A text fragment.
    Content { text: String },
    /// Terminates the stream with a failure reason (an error code from
    /// the shared error taxonomy, e.g. `cancelled`, `provider-timeout`).
    Error { reason: String, message: String },
    /// Terminates the stream successfully.
    Done,
}

impl InterventionChunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InterventionChunk::Done | InterventionChunk::Error { .. })
    }

    /// SSE event name for the HTTP surface.
    pub fn event_name(&self) -> &'static str {
        match self {
            InterventionChunk::Metadata { .. } => "metadata",
            InterventionChunk::Content { .. } => "content",
            InterventionChunk::Error { .. } => "error",
            InterventionChunk::Done => "done",
        }
    }
}
