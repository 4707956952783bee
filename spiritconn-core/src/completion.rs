//! Cross-thread completion channel
//!
//! Worker threads hand connection results back to the single-threaded owner
//! of UI/state mutation through this channel. Workers post and exit; the
//! owner drains on its own schedule. Uses `std::sync::mpsc` so workers never
//! depend on the owner's scheduler, plus an optional wake callback invoked
//! after every post so a blocked event loop can be nudged.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

use crate::models::HostId;

/// Callback invoked after a completion event is posted
pub type WakeCallback = Arc<dyn Fn() + Send + Sync>;

/// Outcome of a protocol handshake worker
pub enum ConnectOutcome<S> {
    /// Handshake succeeded; the session handle crosses to the owner here
    Connected(S),
    /// Handshake failed
    Failed {
        /// Human-readable failure description, already logged by the worker
        reason: String,
        /// Whether the failure should surface as a hard error
        hard_error: bool,
    },
}

impl<S> std::fmt::Debug for ConnectOutcome<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected(_) => f.write_str("Connected"),
            Self::Failed { reason, hard_error } => f
                .debug_struct("Failed")
                .field("reason", reason)
                .field("hard_error", hard_error)
                .finish(),
        }
    }
}

/// One completion notification from a worker thread
#[derive(Debug)]
pub struct CompletionEvent<S> {
    /// Record the worker was connecting
    pub host: HostId,
    /// Connection attempt generation the worker belongs to; events from a
    /// torn-down attempt are discarded by the owner
    pub generation: u64,
    /// What happened
    pub outcome: ConnectOutcome<S>,
}

/// Worker-side handle: post a completion and wake the owner
pub struct CompletionSender<S> {
    tx: Sender<CompletionEvent<S>>,
    wake: Option<WakeCallback>,
}

impl<S> Clone for CompletionSender<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            wake: self.wake.clone(),
        }
    }
}

impl<S> CompletionSender<S> {
    /// Posts a completion event. A send failure means the owner is gone
    /// (shutdown); workers have nothing useful to do about it.
    pub fn post(&self, event: CompletionEvent<S>) {
        let _ = self.tx.send(event);
        if let Some(wake) = &self.wake {
            wake();
        }
    }
}

/// Owner-side queue of worker completions
pub struct CompletionQueue<S> {
    tx: Sender<CompletionEvent<S>>,
    rx: Receiver<CompletionEvent<S>>,
    wake: Option<WakeCallback>,
}

impl<S> Default for CompletionQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> CompletionQueue<S> {
    /// Creates an empty queue
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx, wake: None }
    }

    /// Sets the wake callback invoked after every worker post
    pub fn set_wake_callback(&mut self, wake: WakeCallback) {
        self.wake = Some(wake);
    }

    /// Returns a sender for a worker thread
    #[must_use]
    pub fn sender(&self) -> CompletionSender<S> {
        CompletionSender {
            tx: self.tx.clone(),
            wake: self.wake.clone(),
        }
    }

    /// Takes the next pending completion, if any. Never blocks.
    #[must_use]
    pub fn try_recv(&self) -> Option<CompletionEvent<S>> {
        self.rx.try_recv().ok()
    }
}
