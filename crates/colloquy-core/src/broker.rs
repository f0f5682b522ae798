//! Conversation broker facade.
//!
//! The surface the transport collaborator talks to: turn submission with
//! input validation, context pass-throughs, and sweeper lifecycle. Owns the
//! context store, the session controller, and the lifecycle sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use colloquy_types::config::BrokerConfig;
use colloquy_types::error::BrokerError;
use colloquy_types::message::ContextInfo;

use crate::adapter::BoxModelAdapter;
use crate::context::ContextStore;
use crate::session::{SessionController, TurnHandle};
use crate::sweeper::LifecycleSweeper;

const SECONDS_PER_HOUR: u64 = 3600;

/// Brokers conversational turns between connected users and the model
/// backend.
pub struct ConversationBroker {
    store: Arc<ContextStore>,
    controller: SessionController,
    sweeper: LifecycleSweeper,
    max_content_chars: usize,
}

impl ConversationBroker {
    /// Assemble a broker from configuration and an optional model adapter.
    ///
    /// `adapter: None` disables the model backend; turns are answered by
    /// the offline fallback responder.
    pub fn new(config: BrokerConfig, adapter: Option<BoxModelAdapter>) -> Self {
        let store = Arc::new(ContextStore::new(
            config.window_size,
            config.system_prompt.clone(),
        ));
        let controller = SessionController::new(Arc::clone(&store), adapter, &config);
        let sweeper = LifecycleSweeper::new(
            Arc::clone(&store),
            Duration::from_secs(u64::from(config.sweep_interval_hours) * SECONDS_PER_HOUR),
            config.context_max_age_hours,
        );

        info!(
            window_size = config.window_size,
            sweep_interval_hours = config.sweep_interval_hours,
            context_max_age_hours = config.context_max_age_hours,
            "conversation broker initialized"
        );

        Self {
            store,
            controller,
            sweeper,
            max_content_chars: config.max_content_chars,
        }
    }

    /// Submit one conversational turn.
    ///
    /// Rejects malformed input before anything enters the session state
    /// machine; an accepted turn always ends with assistant content on the
    /// returned event channel.
    pub fn submit_turn(
        &self,
        user_id: &str,
        content: &str,
        streaming: bool,
    ) -> Result<TurnHandle, BrokerError> {
        self.validate(content)?;
        self.controller.submit_turn(user_id, content, streaming)
    }

    /// Delete a user's conversation memory. Idempotent.
    pub fn clear_context(&self, user_id: &str) {
        self.store.clear(user_id);
    }

    /// Message count and last activity for a user.
    pub fn context_info(&self, user_id: &str) -> ContextInfo {
        self.store.info(user_id)
    }

    /// Number of turns currently in flight.
    pub fn active_sessions(&self) -> usize {
        self.controller.active_sessions()
    }

    /// Start the background sweeper.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        self.sweeper.start()
    }

    /// Stop the background sweeper. Idempotent.
    pub fn stop_sweeper(&self) {
        self.sweeper.stop();
    }

    fn validate(&self, content: &str) -> Result<(), BrokerError> {
        if content.trim().is_empty() {
            return Err(BrokerError::Validation(
                "message content must not be empty".to_string(),
            ));
        }
        let chars = content.chars().count();
        if chars > self.max_content_chars {
            return Err(BrokerError::Validation(format!(
                "message content is {chars} characters, limit is {}",
                self.max_content_chars
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::event::TurnEvent;

    fn offline_broker() -> ConversationBroker {
        let config = BrokerConfig {
            pseudo_chunk_delay_ms: 0,
            ..BrokerConfig::default()
        };
        ConversationBroker::new(config, None)
    }

    async fn drain(mut handle: TurnHandle) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_empty_content_rejected_before_state_machine() {
        let broker = offline_broker();
        for content in ["", "   ", "\n\t"] {
            let result = broker.submit_turn("alice", content, false);
            assert!(matches!(result, Err(BrokerError::Validation(_))));
        }
        // Nothing entered the pipeline: no context was created.
        assert_eq!(broker.context_info("alice").message_count, 0);
        assert_eq!(broker.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_oversized_content_rejected() {
        let broker = offline_broker();
        let oversized = "x".repeat(5001);
        assert!(matches!(
            broker.submit_turn("alice", &oversized, false),
            Err(BrokerError::Validation(_))
        ));

        // Exactly at the limit is accepted.
        let at_limit = "x".repeat(5000);
        let handle = broker.submit_turn("alice", &at_limit, false).unwrap();
        drain(handle).await;
    }

    #[tokio::test]
    async fn test_turn_roundtrip_and_info() {
        let broker = offline_broker();
        let handle = broker.submit_turn("alice", "hello there", false).unwrap();
        let events = drain(handle).await;
        assert!(matches!(events.last(), Some(TurnEvent::Complete { .. })));

        // system prompt + user + assistant
        let info = broker.context_info("alice");
        assert_eq!(info.message_count, 3);
        assert!(info.last_activity.is_some());
    }

    #[tokio::test]
    async fn test_clear_context_then_info() {
        let broker = offline_broker();
        let handle = broker.submit_turn("alice", "hello", false).unwrap();
        drain(handle).await;

        broker.clear_context("alice");
        let info = broker.context_info("alice");
        assert_eq!(info.message_count, 0);
        assert!(info.last_activity.is_none());

        // Clearing an absent user is a no-op success.
        broker.clear_context("nobody");
    }

    #[tokio::test]
    async fn test_sweeper_lifecycle_through_broker() {
        let broker = offline_broker();
        let handle = broker.start_sweeper();
        broker.stop_sweeper();
        handle.await.unwrap();
    }
}
