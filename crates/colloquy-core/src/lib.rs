//! Conversation orchestration and streaming response pipeline.
//!
//! This crate defines the "ports" (the [`adapter::ModelAdapter`] trait) that
//! the infrastructure layer implements, and owns the stateful pieces of the
//! broker: per-user context memory, the streaming session state machine, the
//! offline fallback responder, and the stale-context sweeper. It depends
//! only on `colloquy-types` -- never on `colloquy-infra` or any HTTP crate.

pub mod adapter;
pub mod broker;
pub mod context;
pub mod fallback;
pub mod session;
pub mod sweeper;
