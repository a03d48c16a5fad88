/// Time source abstraction.
///
/// Cache expiry, LRU ranking and the rate limiter all read time through
/// [`Clock`] so tests can drive them with [`ManualClock`].
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Millis;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Millis) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(start),
        })
    }

    pub fn advance(&self, by: Millis) {
        self.now.fetch_add(by, Ordering::SeqCst);
    }

    pub fn set(&self, to: Millis) {
        self.now.store(to, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Follows tokio's clock from a fixed epoch reading, so paused-time tests
/// move it along with `tokio::time::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch_ms: Millis,
    started: tokio::time::Instant,
}

impl TokioClock {
    /// Must be created inside a tokio runtime.
    #[must_use]
    pub fn new(epoch_ms: Millis) -> Arc<Self> {
        Arc::new(Self {
            epoch_ms,
            started: tokio::time::Instant::now(),
        })
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> Millis {
        let elapsed = self.started.elapsed().as_millis();
        self.epoch_ms + Millis::try_from(elapsed).unwrap_or(Millis::MAX - self.epoch_ms)
    }
}
