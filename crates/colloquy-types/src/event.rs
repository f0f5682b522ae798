//! Outbound turn events.
//!
//! One turn produces an ordered event sequence on its reply channel:
//! `Typing(true)`, then either `Chunk` events (streaming) or one
//! `FullContent` (single-shot), then `Typing(false)`, then a terminal
//! `Complete` or `Error`. Serialized as tagged JSON for the transport
//! collaborator.

use serde::{Deserialize, Serialize};

use crate::adapter::Usage;
use crate::error::TurnErrorCode;

/// An event emitted during one conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Typing indicator state changed.
    Typing { active: bool },

    /// An incremental fragment of a streamed reply.
    Chunk { text: String },

    /// The complete reply of a non-streaming turn.
    FullContent { text: String },

    /// The turn finished; usage totals when the provider reported them.
    Complete {
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },

    /// Observability notification of a recovered failure. A turn that
    /// emits this still delivers fallback content and `Complete`.
    Error {
        message: String,
        code: TurnErrorCode,
    },
}

impl TurnEvent {
    /// Whether this event terminates the sequence for a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Complete { .. })
    }
}
