//! Streaming session controller.
//!
//! Drives one generation request end to end: raises the typing indicator,
//! assembles the context, invokes the model adapter in streaming or
//! single-shot mode, relays chunks to the caller over an mpsc channel, and
//! persists the assistant turn on completion. On any adapter failure the
//! turn is recovered through the offline fallback responder so the caller
//! always receives assistant content, never a bare protocol error.
//!
//! At most one session per user id is in flight at a time; a second
//! submission while one is active is rejected with `ConcurrentSession`.
//! Cancellation (explicit token or the caller dropping the receiver) stops
//! adapter consumption promptly and discards accumulated partial content
//! without touching the context.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use colloquy_types::adapter::AdapterError;
use colloquy_types::config::BrokerConfig;
use colloquy_types::error::{BrokerError, TurnErrorCode};
use colloquy_types::event::TurnEvent;
use colloquy_types::message::Message;

use crate::adapter::BoxModelAdapter;
use crate::adapter::pseudo::segment_words;
use crate::context::ContextStore;
use crate::fallback::FallbackResponder;
use crate::session::state::{SessionState, StreamingSession};

/// Buffered events per turn before the producer backpressures.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Handle returned to the transport collaborator for one accepted turn.
///
/// Dropping `events` mid-turn cancels the turn; `cancel` allows explicit
/// cancellation while keeping the receiver alive.
pub struct TurnHandle {
    pub events: mpsc::Receiver<TurnEvent>,
    pub cancel: CancellationToken,
}

/// Orchestrates conversational turns against the context store and the
/// configured model adapter.
pub struct SessionController {
    store: Arc<ContextStore>,
    adapter: Option<Arc<BoxModelAdapter>>,
    fallback: FallbackResponder,
    /// Active session guard: one cancellation token per user with an
    /// in-flight turn.
    active: Arc<DashMap<String, CancellationToken>>,
    chunk_words: usize,
    chunk_delay: Duration,
}

impl SessionController {
    /// Create a controller. `adapter` may be `None` when the model backend
    /// is disabled by configuration; every turn then answers through the
    /// fallback responder.
    pub fn new(
        store: Arc<ContextStore>,
        adapter: Option<BoxModelAdapter>,
        config: &BrokerConfig,
    ) -> Self {
        Self {
            store,
            adapter: adapter.map(Arc::new),
            fallback: FallbackResponder::new(),
            active: Arc::new(DashMap::new()),
            chunk_words: config.pseudo_chunk_words,
            chunk_delay: Duration::from_millis(config.pseudo_chunk_delay_ms),
        }
    }

    /// Number of turns currently in flight.
    pub fn active_sessions(&self) -> usize {
        self.active.len()
    }

    /// Accept a turn and spawn its session task.
    ///
    /// Fails fast with `ConcurrentSession` when a turn for this user is
    /// already in flight; nothing is mutated in that case. Input validation
    /// happens upstream in the broker facade.
    pub fn submit_turn(
        &self,
        user_id: &str,
        content: &str,
        streaming: bool,
    ) -> Result<TurnHandle, BrokerError> {
        let cancel = CancellationToken::new();
        match self.active.entry(user_id.to_string()) {
            Entry::Occupied(_) => {
                debug!(user_id, "rejecting turn: session already active");
                return Err(BrokerError::ConcurrentSession {
                    user_id: user_id.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(cancel.clone());
            }
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let turn = Turn {
            store: Arc::clone(&self.store),
            adapter: self.adapter.clone(),
            fallback: self.fallback.clone(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            streaming,
            cancel: cancel.clone(),
            chunk_words: self.chunk_words,
            chunk_delay: self.chunk_delay,
        };

        let active = Arc::clone(&self.active);
        let user = user_id.to_string();
        tokio::spawn(async move {
            turn.run(&tx).await;
            // Release the guard before the sender drops so a caller that
            // drained to channel-close can immediately submit again.
            active.remove(&user);
            drop(tx);
        });

        Ok(TurnHandle { events: rx, cancel })
    }
}

/// How a generation attempt ended.
enum GenerationOutcome {
    Completed,
    Cancelled,
    Failed {
        error: AdapterError,
        chunks_delivered: bool,
    },
}

/// All state for one spawned turn task.
struct Turn {
    store: Arc<ContextStore>,
    adapter: Option<Arc<BoxModelAdapter>>,
    fallback: FallbackResponder,
    user_id: String,
    content: String,
    streaming: bool,
    cancel: CancellationToken,
    chunk_words: usize,
    chunk_delay: Duration,
}

impl Turn {
    async fn run(&self, tx: &mpsc::Sender<TurnEvent>) {
        let mut session = StreamingSession::new(&self.user_id);
        session.transition(SessionState::TypingStarted);
        if tx.send(TurnEvent::Typing { active: true }).await.is_err() {
            return;
        }

        // Assemble the context: preamble first, then the user turn; the
        // store applies windowing on append.
        self.store.get_or_create(&self.user_id);
        self.store.inject_system_prompt(&self.user_id);
        self.store
            .append(&self.user_id, Message::user(self.content.clone()));
        let messages = self.store.snapshot(&self.user_id);

        session.transition(SessionState::Generating);

        let Some(adapter) = self.adapter.clone() else {
            debug!(user_id = %self.user_id, "model adapter disabled, answering offline");
            self.answer_offline(&mut session, tx).await;
            return;
        };

        // Span covers the full generation, streaming included: polling the
        // instrumented future enters it for every chunk.
        let span = info_span!(
            "gen_ai.generate",
            gen_ai.system = adapter.name(),
            gen_ai.request.model = adapter.model_id(),
            gen_ai.request.stream = self.streaming,
        );
        let outcome = if self.streaming {
            session.transition(SessionState::Streaming);
            self.run_streaming(&adapter, messages, &mut session, tx)
                .instrument(span)
                .await
        } else {
            session.transition(SessionState::SingleShot);
            self.run_single_shot(&adapter, messages, &mut session, tx)
                .instrument(span)
                .await
        };

        match outcome {
            GenerationOutcome::Completed => self.finish(&mut session, tx).await,
            GenerationOutcome::Cancelled => {
                session.discard_content();
                session.transition(SessionState::Errored);
                debug!(user_id = %self.user_id, message_id = %session.message_id, "turn cancelled, partial content discarded");
            }
            GenerationOutcome::Failed {
                error,
                chunks_delivered,
            } => {
                session.discard_content();
                session.transition(SessionState::Errored);
                warn!(
                    user_id = %self.user_id,
                    error = %error,
                    chunks_delivered,
                    "generation failed, recovering with offline responder"
                );
                let code = if chunks_delivered {
                    TurnErrorCode::StreamingError
                } else {
                    error.turn_error_code()
                };
                self.recover_with_fallback(tx, error.to_string(), code).await;
            }
        }
    }

    /// Consume the adapter's chunk stream, relaying deltas to the caller.
    async fn run_streaming(
        &self,
        adapter: &BoxModelAdapter,
        messages: Vec<Message>,
        session: &mut StreamingSession,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> GenerationOutcome {
        // Dropping the stream on cancellation releases the adapter-side
        // connection; no further frames are consumed.
        let mut stream = adapter.stream(messages);
        let mut chunks_delivered = false;

        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => return GenerationOutcome::Cancelled,
                item = stream.next() => item,
            };

            match item {
                // Terminal frame: capture final usage and stop consuming.
                Some(Ok(chunk)) if chunk.is_complete => {
                    if chunk.usage.is_some() {
                        session.usage = chunk.usage;
                    }
                    return GenerationOutcome::Completed;
                }
                Some(Ok(chunk)) => {
                    if chunk.content.is_empty() {
                        continue;
                    }
                    session.push_content(&chunk.content);
                    if tx
                        .send(TurnEvent::Chunk {
                            text: chunk.content,
                        })
                        .await
                        .is_err()
                    {
                        return GenerationOutcome::Cancelled;
                    }
                    chunks_delivered = true;
                }
                Some(Err(error)) => {
                    return GenerationOutcome::Failed {
                        error,
                        chunks_delivered,
                    };
                }
                // Provider closed without a terminal frame; treat what we
                // have as the full reply.
                None => return GenerationOutcome::Completed,
            }
        }
    }

    /// Single-shot generation: one full response, one FullContent event.
    async fn run_single_shot(
        &self,
        adapter: &BoxModelAdapter,
        messages: Vec<Message>,
        session: &mut StreamingSession,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> GenerationOutcome {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return GenerationOutcome::Cancelled,
            result = adapter.generate(&messages) => result,
        };

        match result {
            Ok(response) => {
                session.push_content(&response.content);
                session.usage = Some(response.usage);
                if tx
                    .send(TurnEvent::FullContent {
                        text: response.content,
                    })
                    .await
                    .is_err()
                {
                    return GenerationOutcome::Cancelled;
                }
                GenerationOutcome::Completed
            }
            Err(error) => GenerationOutcome::Failed {
                error,
                chunks_delivered: false,
            },
        }
    }

    /// Persist the assistant turn and close out the event sequence.
    async fn finish(&self, session: &mut StreamingSession, tx: &mpsc::Sender<TurnEvent>) {
        session.transition(SessionState::Completing);
        self.store
            .append(&self.user_id, Message::assistant(session.accumulated.clone()));
        let _ = tx.send(TurnEvent::Typing { active: false }).await;
        let _ = tx.send(TurnEvent::Complete { usage: session.usage }).await;
        session.transition(SessionState::Done);
        debug!(
            user_id = %self.user_id,
            message_id = %session.message_id,
            chars = session.accumulated.len(),
            "turn completed"
        );
    }

    /// Normal-path fallback when the adapter is disabled by configuration:
    /// the offline reply is the assistant turn, delivered in the shape the
    /// caller asked for.
    async fn answer_offline(&self, session: &mut StreamingSession, tx: &mpsc::Sender<TurnEvent>) {
        let reply = self.fallback.respond(&self.content);
        if self.streaming {
            session.transition(SessionState::Streaming);
            if !self.send_pseudo_chunks(&reply, tx).await {
                session.transition(SessionState::Errored);
                return;
            }
        } else {
            session.transition(SessionState::SingleShot);
            if tx
                .send(TurnEvent::FullContent {
                    text: reply.clone(),
                })
                .await
                .is_err()
            {
                session.transition(SessionState::Errored);
                return;
            }
        }
        session.push_content(&reply);
        self.finish(session, tx).await;
    }

    /// Error-path recovery: typing lowered, observability error emitted,
    /// then the fallback reply delivered in the requested shape and
    /// persisted as the assistant turn.
    async fn recover_with_fallback(
        &self,
        tx: &mpsc::Sender<TurnEvent>,
        message: String,
        code: TurnErrorCode,
    ) {
        let _ = tx.send(TurnEvent::Typing { active: false }).await;
        let _ = tx.send(TurnEvent::Error { message, code }).await;

        let reply = self.fallback.respond(&self.content);
        let delivered = if self.streaming {
            self.send_pseudo_chunks(&reply, tx).await
        } else {
            tx.send(TurnEvent::FullContent {
                text: reply.clone(),
            })
            .await
            .is_ok()
        };

        if !delivered {
            // Caller went away mid-recovery; leave the context as-is.
            return;
        }

        self.store.append(&self.user_id, Message::assistant(reply));
        let _ = tx.send(TurnEvent::Complete { usage: None }).await;
    }

    /// Deliver text as paced chunk events. Returns false when the caller
    /// went away or the turn was cancelled.
    async fn send_pseudo_chunks(&self, text: &str, tx: &mpsc::Sender<TurnEvent>) -> bool {
        for (i, segment) in segment_words(text, self.chunk_words).into_iter().enumerate() {
            if i > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            if self.cancel.is_cancelled() {
                return false;
            }
            if tx.send(TurnEvent::Chunk { text: segment }).await.is_err() {
                return false;
            }
        }
        true
    }
}
