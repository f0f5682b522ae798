//! ModelAdapter trait definition.
//!
//! This is the core abstraction every model backend implements. Uses RPITIT
//! for `generate`, and `Pin<Box<dyn Stream>>` for `stream` (streams need to
//! be object-safe for the BoxModelAdapter wrapper).

use std::pin::Pin;

use futures_util::Stream;

use colloquy_types::adapter::{AdapterCapabilities, AdapterChunk, AdapterError, AdapterResponse};
use colloquy_types::message::Message;

/// A stream of generation chunks from an adapter.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<AdapterChunk, AdapterError>> + Send + 'static>>;

/// Trait for model backends (Bedrock Claude, Llama, Titan, ...).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition) for
/// `generate`. The `stream` method returns a boxed stream because streams
/// need to be object-safe for `BoxModelAdapter`.
///
/// Implementations live in colloquy-infra (e.g., `BedrockAdapter`).
pub trait ModelAdapter: Send + Sync {
    /// Human-readable adapter name (e.g., "bedrock").
    fn name(&self) -> &str;

    /// Configured model identifier, for span attribution.
    fn model_id(&self) -> &str;

    /// What this adapter supports (native streaming, output budget).
    fn capabilities(&self) -> &AdapterCapabilities;

    /// Send a single-shot generation request and receive the full response.
    fn generate(
        &self,
        messages: &[Message],
    ) -> impl std::future::Future<Output = Result<AdapterResponse, AdapterError>> + Send;

    /// Start a streaming generation. Returns a stream of chunks ending with
    /// a terminal `is_complete` chunk.
    ///
    /// Backends without native streaming satisfy this by pseudo-streaming a
    /// single full generation; callers cannot tell the difference except
    /// for true incrementality.
    fn stream(&self, messages: Vec<Message>) -> ChunkStream;
}
