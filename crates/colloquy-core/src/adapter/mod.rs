//! Model adapter abstractions.
//!
//! This module defines the capability interface every model backend must
//! satisfy:
//! - `ModelAdapter`: RPITIT trait for concrete adapter implementations
//! - `BoxModelAdapter`: object-safe wrapper for dynamic dispatch
//! - `pseudo`: word-chunked pseudo-streaming for backends without native
//!   streaming support

pub mod box_adapter;
pub mod contract;
pub mod pseudo;

pub use box_adapter::BoxModelAdapter;
pub use contract::ModelAdapter;
