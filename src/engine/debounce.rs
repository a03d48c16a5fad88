//! Per-id debouncing.
//!
//! Each call registers a fresh child of the root token under its id,
//! cancelling whatever was registered before. Only a call whose delay
//! elapses without being cancelled fires. Cancelling the root cancels
//! every pending call at once.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Quiet period elapsed; this call should run.
    Fire,
    /// A later call with the same id replaced this one.
    Superseded,
    /// The root token was cancelled.
    Cancelled,
}

pub struct Debouncer {
    root: CancellationToken,
    pending: Mutex<HashMap<String, (u64, CancellationToken)>>,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            pending: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (u64, CancellationToken)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait out `delay` for `id`, unless a newer call for the same id or the
    /// root token cancels it first.
    pub async fn wait(&self, id: &str, delay: Duration) -> DebounceOutcome {
        if self.root.is_cancelled() {
            return DebounceOutcome::Cancelled;
        }

        let token = self.root.child_token();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some((_, previous)) = self.lock().insert(id.to_string(), (generation, token.clone())) {
            previous.cancel();
        }

        let fired = tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        };

        {
            let mut pending = self.lock();
            if pending.get(id).is_some_and(|(g, _)| *g == generation) {
                pending.remove(id);
            }
        }

        if fired {
            DebounceOutcome::Fire
        } else if self.root.is_cancelled() {
            DebounceOutcome::Cancelled
        } else {
            DebounceOutcome::Superseded
        }
    }

    /// Cancel every pending call without cancelling the root.
    pub fn cancel_pending(&self) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, (_, token)) in &drained {
            token.cancel();
        }
        drained.len()
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}
