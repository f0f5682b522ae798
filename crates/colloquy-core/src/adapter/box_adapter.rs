//! BoxModelAdapter -- object-safe dynamic dispatch wrapper for ModelAdapter.
//!
//! Follows the blanket-impl pattern:
//! 1. Define an object-safe `ModelAdapterDyn` trait with boxed futures
//! 2. Blanket-impl `ModelAdapterDyn` for all `T: ModelAdapter`
//! 3. `BoxModelAdapter` wraps `Box<dyn ModelAdapterDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use colloquy_types::adapter::{AdapterCapabilities, AdapterError, AdapterResponse};
use colloquy_types::message::Message;

use super::contract::{ChunkStream, ModelAdapter};

/// Object-safe version of [`ModelAdapter`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch (`dyn ModelAdapterDyn`).
/// A blanket implementation is provided for all types implementing
/// `ModelAdapter`.
pub trait ModelAdapterDyn: Send + Sync {
    fn name(&self) -> &str;

    fn model_id(&self) -> &str;

    fn capabilities(&self) -> &AdapterCapabilities;

    fn generate_boxed<'a>(
        &'a self,
        messages: &'a [Message],
    ) -> Pin<Box<dyn Future<Output = Result<AdapterResponse, AdapterError>> + Send + 'a>>;

    fn stream_boxed(&self, messages: Vec<Message>) -> ChunkStream;
}

/// Blanket implementation: any `ModelAdapter` automatically implements
/// `ModelAdapterDyn`.
impl<T: ModelAdapter> ModelAdapterDyn for T {
    fn name(&self) -> &str {
        ModelAdapter::name(self)
    }

    fn model_id(&self) -> &str {
        ModelAdapter::model_id(self)
    }

    fn capabilities(&self) -> &AdapterCapabilities {
        ModelAdapter::capabilities(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        messages: &'a [Message],
    ) -> Pin<Box<dyn Future<Output = Result<AdapterResponse, AdapterError>> + Send + 'a>> {
        Box::pin(self.generate(messages))
    }

    fn stream_boxed(&self, messages: Vec<Message>) -> ChunkStream {
        self.stream(messages)
    }
}

/// Type-erased model adapter for runtime backend selection.
///
/// Since `ModelAdapter` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxModelAdapter` provides equivalent methods that delegate to
/// the inner `ModelAdapterDyn` trait object.
pub struct BoxModelAdapter {
    inner: Box<dyn ModelAdapterDyn + Send + Sync>,
}

impl BoxModelAdapter {
    /// Wrap a concrete `ModelAdapter` in a type-erased box.
    pub fn new<T: ModelAdapter + 'static>(adapter: T) -> Self {
        Self {
            inner: Box::new(adapter),
        }
    }

    /// Human-readable adapter name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Configured model identifier.
    pub fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    /// What this adapter supports.
    pub fn capabilities(&self) -> &AdapterCapabilities {
        self.inner.capabilities()
    }

    /// Send a single-shot generation request.
    pub async fn generate(&self, messages: &[Message]) -> Result<AdapterResponse, AdapterError> {
        self.inner.generate_boxed(messages).await
    }

    /// Start a streaming generation.
    pub fn stream(&self, messages: Vec<Message>) -> ChunkStream {
        self.inner.stream_boxed(messages)
    }
}
