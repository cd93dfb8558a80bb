//! Streaming relay: runs one completion request on a worker thread and hands
//! its chunks to the render loop over a bounded channel, followed by exactly
//! one outcome on a single-slot channel.
//!
//! The worker never touches session state. It only sends, and every send is
//! non-blocking once the listener has gone away, so a cancelled or abandoned
//! relay always winds down on its own.

#[cfg(test)]
mod tests;

use crate::provider::{ChatMessage, CompletionClient};
use crate::{log_debug, log_debug_content};
use crossbeam_channel::{
    bounded, never, select, Receiver, RecvError, SendTimeoutError, Sender, TrySendError,
};
use std::ops::ControlFlow;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Chunks buffered between the worker and the render loop.
pub const CHUNK_CHANNEL_CAPACITY: usize = 64;
/// How often a blocked chunk send re-checks the cancel token.
const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Monotonic identifier so late events from an old relay can be recognised.
pub type RelayId = u64;

/// Cooperative cancellation flag shared between the session and the worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Terminal result of a relay. Delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// Message surfaced to the render loop from a relay's channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub relay_id: RelayId,
    pub kind: RelayEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEventKind {
    Chunk(String),
    Done(RelayOutcome),
}

/// Session-side handle to a running relay.
pub struct ActiveRelay {
    id: RelayId,
    chunks: Receiver<String>,
    done: Receiver<RelayOutcome>,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl ActiveRelay {
    /// Spawn the worker and return the handle that owns its receiving ends.
    pub fn start(
        id: RelayId,
        client: Arc<dyn CompletionClient>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        let (chunk_tx, chunk_rx) = bounded(CHUNK_CHANNEL_CAPACITY);
        let (done_tx, done_rx) = bounded(1);
        let cancel = CancelToken::new();
        let sender = RelaySender {
            id,
            chunks: chunk_tx,
            done: done_tx,
            cancel: cancel.clone(),
            forwarded: 0,
        };
        tracing::info!(relay_id = id, model = client.model(), "relay started");
        let handle = thread::spawn(move || run_relay(sender, client, messages));
        Self {
            id,
            chunks: chunk_rx,
            done: done_rx,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> RelayId {
        self.id
    }

    /// Trip the token. Returns immediately; the worker notices at its next check.
    pub fn cancel(&self) {
        tracing::info!(relay_id = self.id, "relay cancel requested");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cloneable receiving view for the render loop's `select!`.
    pub fn listener(&self) -> RelayListener {
        RelayListener {
            relay_id: self.id,
            chunks: self.chunks.clone(),
            done: self.done.clone(),
        }
    }

    /// Chunks that were enqueued but not yet handed to the session.
    pub fn drain_pending(&self) -> Vec<String> {
        self.chunks.try_iter().collect()
    }

    /// Join the worker once it has reported; it is already past its last send.
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log_debug("relay worker panicked during shutdown");
            }
        }
    }

    /// Cancel and drop without waiting. Dropping the receivers turns every
    /// remaining worker send into an immediate no-op.
    pub fn abandon(mut self) {
        self.cancel();
        self.handle.take();
    }
}

impl Drop for ActiveRelay {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Receiving ends of one relay, or of nothing when no stream is active.
#[derive(Clone)]
pub struct RelayListener {
    relay_id: RelayId,
    chunks: Receiver<String>,
    done: Receiver<RelayOutcome>,
}

impl RelayListener {
    /// Listener whose channels never fire; used while no relay is active.
    pub fn idle() -> Self {
        Self {
            relay_id: 0,
            chunks: never(),
            done: never(),
        }
    }

    pub fn relay_id(&self) -> RelayId {
        self.relay_id
    }

    pub fn chunks(&self) -> &Receiver<String> {
        &self.chunks
    }

    pub fn done(&self) -> &Receiver<RelayOutcome> {
        &self.done
    }

    /// Translate a chunk-channel receive into an event. A disconnected chunk
    /// channel means the worker has already queued its outcome (or died).
    pub fn chunk_event(&self, received: Result<String, RecvError>) -> RelayEvent {
        let kind = match received {
            Ok(text) => RelayEventKind::Chunk(text),
            Err(RecvError) => RelayEventKind::Done(self.done.try_recv().unwrap_or_else(|_| {
                RelayOutcome::Failed("stream worker disconnected unexpectedly".into())
            })),
        };
        RelayEvent {
            relay_id: self.relay_id,
            kind,
        }
    }

    pub fn done_event(&self, received: Result<RelayOutcome, RecvError>) -> RelayEvent {
        let outcome = received.unwrap_or_else(|RecvError| {
            RelayOutcome::Failed("stream worker disconnected unexpectedly".into())
        });
        RelayEvent {
            relay_id: self.relay_id,
            kind: RelayEventKind::Done(outcome),
        }
    }

    /// Block for the next relay event, up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RelayEvent> {
        select! {
            recv(self.chunks) -> msg => Some(self.chunk_event(msg)),
            recv(self.done) -> msg => Some(self.done_event(msg)),
            default(timeout) => None,
        }
    }
}

/// Worker-side sending half. `finish` consumes it, so a relay can never report
/// twice or send a chunk after its outcome.
struct RelaySender {
    id: RelayId,
    chunks: Sender<String>,
    done: Sender<RelayOutcome>,
    cancel: CancelToken,
    forwarded: usize,
}

impl RelaySender {
    /// Forward one chunk, waiting for room but giving up on cancel or disconnect.
    fn send_chunk(&mut self, chunk: String) -> ControlFlow<()> {
        let mut pending = chunk;
        loop {
            if self.cancel.is_cancelled() {
                return ControlFlow::Break(());
            }
            match self.chunks.send_timeout(pending, SEND_RETRY_INTERVAL) {
                Ok(()) => {
                    self.forwarded += 1;
                    return ControlFlow::Continue(());
                }
                Err(SendTimeoutError::Timeout(chunk)) => pending = chunk,
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.cancel.cancel();
                    return ControlFlow::Break(());
                }
            }
        }
    }

    fn finish(self, outcome: RelayOutcome) {
        tracing::info!(
            relay_id = self.id,
            chunks = self.forwarded,
            outcome = ?outcome,
            "relay finished"
        );
        match self.done.try_send(outcome) {
            Ok(()) => {}
            Err(TrySendError::Disconnected(_)) => {
                log_debug(&format!("relay {}: listener gone before outcome", self.id));
            }
            Err(TrySendError::Full(_)) => {
                log_debug(&format!("relay {}: outcome slot already taken", self.id));
            }
        }
        // `self.chunks` drops here, after the outcome is queued.
    }
}

fn run_relay(
    mut sender: RelaySender,
    client: Arc<dyn CompletionClient>,
    messages: Vec<ChatMessage>,
) {
    let cancel = sender.cancel.clone();
    let result = client.stream_chat(&messages, &cancel, &mut |chunk| {
        log_debug_content(&format!("relay {}: chunk {:?}", sender.id, chunk));
        sender.send_chunk(chunk)
    });
    let outcome = if cancel.is_cancelled() {
        RelayOutcome::Cancelled
    } else {
        match result {
            Ok(()) => RelayOutcome::Completed,
            Err(err) => {
                log_debug(&format!("relay {}: stream failed: {err:#}", sender.id));
                RelayOutcome::Failed(format!("{err:#}"))
            }
        }
    };
    sender.finish(outcome);
}
