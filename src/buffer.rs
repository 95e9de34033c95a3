//! Per-sender message buffering with quiet-window flush.
//!
//! `BufferManager` maintains a map of per-sender Tokio tasks. The first message for a sender opens
//! a fixed quiet window; everything that arrives before the window expires joins the same batch,
//! which is handed to the [`BatchConsumer`] exactly once when the window closes. The window is
//! measured from the first message and does not extend on later arrivals, so a continuous burst
//! still flushes one window after its first message.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use crate::{message::MessageRecord, responder::BatchConsumer};

#[derive(Debug, Clone)]
/// Buffering limits applied uniformly to every sender.
pub struct BufferConfig {
    /// Quiet window measured from the first message of a burst.
    pub quiet_window: Duration,
    /// Per-sender queue depth. When full, submissions are rejected.
    pub max_queue_depth_per_key: usize,
    /// Idle eviction time for per-sender buffer tasks.
    pub idle_ttl: Duration,
}

enum Command {
    Message(MessageRecord),
    Clear,
}

struct KeyHandle {
    tx: mpsc::Sender<Command>,
    depth: Arc<AtomicUsize>,
}

#[derive(Debug)]
/// Errors that can occur while submitting a message for buffering.
pub enum SubmitError {
    /// The sender's queue is at capacity.
    QueueFull,
    /// The buffer task exited while submitting.
    BufferClosed,
}

#[derive(Clone)]
/// Manages per-sender buffer tasks.
pub struct BufferManager {
    consumer: Arc<dyn BatchConsumer>,
    cfg: BufferConfig,
    keys: Arc<DashMap<String, KeyHandle>>,
}

impl BufferManager {
    /// Create a new manager handing completed batches to `consumer`.
    pub fn new(consumer: Arc<dyn BatchConsumer>, cfg: BufferConfig) -> Self {
        Self {
            consumer,
            cfg,
            keys: Arc::new(DashMap::new()),
        }
    }

    /// Append a message to the sender's pending batch, opening a quiet window if none is open.
    ///
    /// This function is synchronous and uses `try_send` so callers learn about a full queue
    /// immediately.
    pub fn submit(&self, key: &str, message: MessageRecord) -> Result<(), SubmitError> {
        let mut message = message;

        // A task evicting itself closes its channel; retry once against a fresh entry.
        for _ in 0..2 {
            let (tx, depth) = match self.keys.entry(key.to_string()) {
                Entry::Occupied(o) => {
                    let handle = o.get();
                    (handle.tx.clone(), Arc::clone(&handle.depth))
                }
                Entry::Vacant(v) => {
                    let (tx, rx) = mpsc::channel(self.cfg.max_queue_depth_per_key);
                    let depth = Arc::new(AtomicUsize::new(0));
                    v.insert(KeyHandle {
                        tx: tx.clone(),
                        depth: Arc::clone(&depth),
                    });
                    tokio::spawn(buffer_task(
                        key.to_string(),
                        rx,
                        Arc::clone(&self.consumer),
                        self.cfg.quiet_window,
                        self.cfg.idle_ttl,
                        Arc::clone(&depth),
                        Arc::clone(&self.keys),
                    ));
                    (tx, depth)
                }
            };

            // Counted before the send so the flush-side subtraction can never observe a message
            // that was not yet counted.
            depth.fetch_add(1, Ordering::SeqCst);
            match tx.try_send(Command::Message(message.clone())) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    depth.fetch_sub(1, Ordering::SeqCst);
                    return Err(SubmitError::QueueFull);
                }
                Err(mpsc::error::TrySendError::Closed(unsent)) => {
                    depth.fetch_sub(1, Ordering::SeqCst);
                    self.keys.remove_if(key, |_, handle| handle.tx.is_closed());
                    if let Command::Message(m) = unsent {
                        message = m;
                    }
                    continue;
                }
            }
        }

        Err(SubmitError::BufferClosed)
    }

    /// Current unflushed message count for a sender (0 if unknown). Monitoring only.
    pub fn queue_depth(&self, key: &str) -> usize {
        self.keys
            .get(key)
            .map(|handle| handle.depth.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Cancel any open window for `key` and discard its unflushed messages.
    ///
    /// Ordered with concurrent submissions: messages accepted before the clear are discarded,
    /// messages accepted after it open a fresh window. A batch already handed to the consumer is
    /// not recalled.
    pub async fn clear_key(&self, key: &str) {
        let tx = match self.keys.get(key) {
            Some(handle) => handle.tx.clone(),
            None => return,
        };
        // Closed means the task is already gone and nothing is pending.
        let _ = tx.send(Command::Clear).await;
    }
}

async fn buffer_task(
    key: String,
    mut rx: mpsc::Receiver<Command>,
    consumer: Arc<dyn BatchConsumer>,
    quiet_window: Duration,
    idle_ttl: Duration,
    depth: Arc<AtomicUsize>,
    keys: Arc<DashMap<String, KeyHandle>>,
) {
    loop {
        let first = match timeout(idle_ttl, rx.recv()).await {
            Ok(Some(Command::Message(m))) => m,
            Ok(Some(Command::Clear)) => continue,
            Ok(None) => break,
            Err(_) => {
                // Idle: stop accepting new submissions, then settle anything that raced in before
                // the channel closed. Those messages flush immediately rather than opening a
                // window this task can no longer serve.
                rx.close();
                let mut tail = Vec::new();
                while let Ok(cmd) = rx.try_recv() {
                    match cmd {
                        Command::Message(m) => tail.push(m),
                        Command::Clear => {
                            depth.fetch_sub(tail.len(), Ordering::SeqCst);
                            tail.clear();
                        }
                    }
                }
                if !tail.is_empty() {
                    depth.fetch_sub(tail.len(), Ordering::SeqCst);
                    flush_batch(&key, tail, &consumer);
                }
                break;
            }
        };

        tracing::debug!(key = %key, window_ms = quiet_window.as_millis() as u64, "quiet window opened");

        let mut batch = vec![first];
        let mut cleared = false;

        // The deadline is absolute: arrivals during the window join the batch without extending it.
        let flush_at = Instant::now() + quiet_window;
        loop {
            let now = Instant::now();
            if now >= flush_at {
                break;
            }
            match timeout(flush_at - now, rx.recv()).await {
                Ok(Some(Command::Message(m))) => batch.push(m),
                Ok(Some(Command::Clear)) => {
                    cleared = true;
                    break;
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }

        depth.fetch_sub(batch.len(), Ordering::SeqCst);
        if cleared {
            tracing::debug!(key = %key, discarded = batch.len(), "buffer cleared");
            continue;
        }
        flush_batch(&key, batch, &consumer);
    }

    // Only this task's entry: a submit that raced the eviction may already have replaced it.
    keys.remove_if(&key, |_, handle| handle.tx.is_closed());
}

/// Hand a completed batch to the consumer without blocking the sender's next window.
///
/// A failed batch is logged and dropped; there is no retry path.
fn flush_batch(key: &str, batch: Vec<MessageRecord>, consumer: &Arc<dyn BatchConsumer>) {
    if batch.is_empty() {
        return;
    }

    let key = key.to_string();
    let consumer = Arc::clone(consumer);
    let batch_size = batch.len();
    tokio::spawn(async move {
        tracing::debug!(key = %key, batch_size, "flushing batch");
        if let Err(err) = consumer.process_batch(&key, batch).await {
            tracing::error!(
                key = %key,
                batch_size,
                error = %format!("{err:#}"),
                "failed to process batch"
            );
        }
    });
}
