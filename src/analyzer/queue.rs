//! FIFO request queue with a single provider worker.
//!
//! Every chunk becomes a [`QueuedRequest`] carrying its own reply channel.
//! One spawned task drains the channel strictly in order, waits on the rate
//! limiter before each provider call, and never has more than one call in
//! flight. A failed call only fails that request's reply.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::rate_limit::{RateLimitResult, RateLimiter};
use crate::clock::Clock;
use crate::provider::{ProviderError, TextCompletionProvider};

type Reply = Result<String, ProviderError>;

struct QueuedRequest {
    prompt: String,
    context: String,
    reply: oneshot::Sender<Reply>,
}

/// Completion of one submitted request.
pub struct Ticket {
    receiver: oneshot::Receiver<Reply>,
}

impl Ticket {
    pub async fn wait(self) -> Reply {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(ProviderError::Failed("analysis queue closed".into())))
    }
}

pub struct RequestQueue {
    sender: mpsc::UnboundedSender<QueuedRequest>,
    limiter: Arc<Mutex<RateLimiter>>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl RequestQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn spawn(
        provider: Arc<dyn TextCompletionProvider>,
        limiter: RateLimiter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let limiter = Arc::new(Mutex::new(limiter));
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = tokio::spawn(drain(
            receiver,
            provider,
            Arc::clone(&limiter),
            clock,
            Arc::clone(&pending),
        ));

        Self {
            sender,
            limiter,
            pending,
            worker,
        }
    }

    /// Enqueue a prompt. `context` only labels log lines.
    pub fn submit(&self, prompt: String, context: impl Into<String>) -> Ticket {
        let (reply, receiver) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        let request = QueuedRequest {
            prompt,
            context: context.into(),
            reply,
        };

        if let Err(mpsc::error::SendError(request)) = self.sender.send(request) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            let _ = request
                .reply
                .send(Err(ProviderError::Failed("analysis queue closed".into())));
        }
        Ticket { receiver }
    }

    /// Requests submitted but not yet answered.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn reconfigure(&self, limit: u32, window: Duration) {
        if let Ok(mut limiter) = self.limiter.lock() {
            limiter.reconfigure(limit, window);
        }
    }

    pub fn reset_limiter(&self) {
        if let Ok(mut limiter) = self.limiter.lock() {
            limiter.reset();
        }
    }

    /// Stop the worker. Requests still queued are answered with an error when
    /// their tickets are awaited and no longer count as pending.
    pub fn shutdown(&self) {
        self.worker.abort();
        self.pending.store(0, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.worker.is_finished()
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn drain(
    mut receiver: mpsc::UnboundedReceiver<QueuedRequest>,
    provider: Arc<dyn TextCompletionProvider>,
    limiter: Arc<Mutex<RateLimiter>>,
    clock: Arc<dyn Clock>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(request) = receiver.recv().await {
        loop {
            let decision = match limiter.lock() {
                Ok(mut limiter) => limiter.check(clock.now_ms()),
                Err(_) => RateLimitResult::Allowed,
            };
            match decision {
                RateLimitResult::Allowed => break,
                RateLimitResult::Limited { retry_after } => {
                    debug!(
                        "{}: rate limited, waiting {}ms",
                        request.context,
                        retry_after.as_millis()
                    );
                    tokio::time::sleep(retry_after).await;
                }
            }
        }

        let result = provider.complete(&request.prompt).await;
        if let Err(e) = &result {
            warn!("{}: {} failed: {e}", request.context, provider.name());
        }
        pending.fetch_sub(1, Ordering::SeqCst);

        if request.reply.send(result).is_err() {
            debug!("{}: caller went away before the reply", request.context);
        }
    }
}
