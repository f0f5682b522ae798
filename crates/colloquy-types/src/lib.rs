//! Shared domain types for Colloquy.
//!
//! This crate contains the types exchanged between the conversation broker
//! and its collaborators: messages, contexts, adapter value objects, turn
//! events, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod adapter;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
