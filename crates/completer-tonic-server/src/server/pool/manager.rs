//! Bounded pool of concurrently emitting streams.
//!
//! Each `Complete` call runs in its own Tokio task, but only
//! `max_concurrent_streams` of them may emit events at once; the rest wait
//! for a free [`StreamSlot`]. The pool also tracks every admitted stream so a
//! graceful shutdown can wait for them to drain before cancelling the rest
//! through a shared [`CancellationToken`].

use completer_tonic_core::Error;
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

pub struct StreamPool {
    permits: Arc<Semaphore>,
    inflight: Arc<AtomicUsize>,
    accepting: AtomicBool,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

/// Held by a stream for as long as it may emit events.
///
/// Dropping the slot frees the concurrency permit and removes the stream
/// from the in-flight count.
#[derive(Debug)]
pub struct StreamSlot {
    _permit: OwnedSemaphorePermit,
    _guard: InflightGuard,
}

#[derive(Debug)]
struct InflightGuard(Arc<AtomicUsize>);

impl InflightGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl StreamPool {
    pub fn new(max_concurrent_streams: usize, shutdown_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent_streams)),
            inflight: Arc::new(AtomicUsize::new(0)),
            accepting: AtomicBool::new(true),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Token cancelled once in-flight streams must stop.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Streams admitted and not yet finished, including those still waiting
    /// for a slot.
    pub fn streams_inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Slots currently free.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a free slot.
    ///
    /// The stream counts as in-flight from the moment this is called, so a
    /// drain also waits for streams queued behind busy slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the pool stopped accepting
    /// streams before or while waiting.
    pub async fn acquire(&self) -> Result<StreamSlot, Error> {
        if !self.is_accepting() {
            return Err(Error::ServiceShutdown);
        }

        let guard = InflightGuard::new(Arc::clone(&self.inflight));

        let permit = tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => return Err(Error::ServiceShutdown),
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| Error::ServiceShutdown)?
            }
        };

        Ok(StreamSlot {
            _permit: permit,
            _guard: guard,
        })
    }

    /// Gracefully shuts the pool down.
    ///
    /// - Stops admitting new streams.
    /// - Waits up to `shutdown_timeout` for in-flight streams to finish.
    /// - Cancels the shared [`CancellationToken`] so the remaining streams
    ///   end with `UNAVAILABLE`, and closes the slot semaphore.
    pub async fn shutdown(&self) -> Result<(), Error> {
        // === Phase 0: Stop accepting new requests ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new streams");
        self.accepting.store(false, Ordering::Release);

        // === Phase 1: Wait for in-flight streams to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.streams_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight streams drained successfully");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} streams still active)",
                    self.streams_inflight()
                );
            }
        }

        // === Phase 2: Cancel any remaining work ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining streams via shutdown token");
        self.shutdown_token.cancel();
        self.permits.close();

        #[cfg(feature = "tracing")]
        tracing::info!("Stream pool shutdown complete");

        Ok(())
    }
}
