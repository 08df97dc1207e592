//! Suspension points of the poll loop
//!
//! The loop never calls `tokio::time::sleep` directly so tests can observe
//! the requested waits without any real time passing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`. Returns `false` when a shutdown request cut
    /// the wait short or arrived before it ended.
    async fn sleep(&self, duration: Duration) -> bool;
}

/// Real sleeper. With a shutdown flag attached it sleeps in one-second
/// slices and returns as soon as the flag is raised.
#[derive(Default)]
pub struct TokioSleeper {
    shutdown: Option<Arc<AtomicBool>>,
}

impl TokioSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown(shutdown: Arc<AtomicBool>) -> Self {
        Self {
            shutdown: Some(shutdown),
        }
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) -> bool {
        let Some(shutdown) = &self.shutdown else {
            tokio::time::sleep(duration).await;
            return true;
        };

        let slice = Duration::from_secs(1);
        let mut remaining = duration;
        while !remaining.is_zero() {
            if shutdown.load(Ordering::Relaxed) {
                return false;
            }
            let step = remaining.min(slice);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
        !shutdown.load(Ordering::Relaxed)
    }
}

/// Records every requested sleep and returns immediately
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
    /// Raised after this many sleeps, to stop a running loop
    stop_after: Option<(usize, Arc<AtomicBool>)>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise `shutdown` once `count` sleeps have been recorded
    pub fn stopping_after(count: usize, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            sleeps: Mutex::new(Vec::new()),
            stop_after: Some((count, shutdown)),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) -> bool {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };

        match &self.stop_after {
            Some((limit, shutdown)) => {
                if count >= *limit {
                    shutdown.store(true, Ordering::Relaxed);
                }
                !shutdown.load(Ordering::Relaxed)
            }
            None => true,
        }
    }
}
