//! Streaming session controller and its state machine.

pub mod controller;
pub mod state;

pub use controller::{SessionController, TurnHandle};
pub use state::{SessionState, StreamingSession};
