use crate::server::{
    pool::manager::StreamPool,
    streaming::{
        coordinator::{StreamState, feed_completion},
        request::StreamRequest,
    },
    telemetry::{
        decrement_streams_inflight, increment_stream_errors, increment_streams_cancelled,
        increment_streams_inflight, record_stream_duration,
    },
};
use completer_tonic_core::Error;
use std::sync::Arc;

/// Task serving one `Complete` call.
///
/// Waits for a free slot in the [`StreamPool`], then runs
/// [`feed_completion`] until the stream completes, the caller disconnects or
/// the service shuts down. The slot is released when this returns.
///
/// A caller that hangs up while still queued for a slot leaves the queue
/// right away.
///
/// # Outcomes
///
/// - `Ok(StreamState::Completed)` - every event was delivered.
/// - `Ok(StreamState::Cancelled(n))` - the caller went away after `n`
///   deltas; no error is reported to anyone since there is nobody left to
///   tell.
/// - `Err(_)` - the stream failed and the caller was sent a status.
pub async fn stream_worker(
    pool: Arc<StreamPool>,
    request: StreamRequest,
) -> Result<StreamState, Error> {
    let StreamRequest {
        script,
        labels,
        pacer,
        resp_tx,
        received_at,
    } = request;

    let acquired = tokio::select! {
        biased;
        () = resp_tx.closed() => {
            increment_streams_cancelled();
            #[cfg(feature = "tracing")]
            tracing::debug!("caller went away while queued for a slot");
            return Ok(StreamState::NotStarted.cancel());
        }
        slot = pool.acquire() => slot,
    };

    let _slot = match acquired {
        Ok(slot) => slot,
        Err(e) => {
            increment_stream_errors();
            if let Err(_e) = resp_tx.try_send(Err(e.clone().into())) {
                #[cfg(feature = "tracing")]
                tracing::debug!("Failed to forward slot error: {_e}");
            }
            return Err(e);
        }
    };

    increment_streams_inflight();
    #[cfg(feature = "tracing")]
    tracing::debug!(
        waited_ms = received_at.elapsed().as_millis() as u64,
        slots_free = pool.available_slots(),
        "stream acquired a slot"
    );

    let result = feed_completion(
        &script,
        &labels,
        pacer.as_ref(),
        &resp_tx,
        pool.shutdown_token(),
    )
    .await;

    decrement_streams_inflight();

    match result {
        Ok(StreamState::Completed) => {
            record_stream_duration(received_at.elapsed().as_millis() as f64);
            #[cfg(feature = "tracing")]
            tracing::debug!(events = script.event_count(), "stream completed");
            Ok(StreamState::Completed)
        }
        Ok(state) => {
            debug_assert!(state.is_terminal());
            increment_streams_cancelled();
            #[cfg(feature = "tracing")]
            tracing::debug!(
                deltas = state.deltas_sent(script.word_count()),
                "stream cancelled by caller"
            );
            Ok(state)
        }
        Err(e) => {
            increment_stream_errors();
            #[cfg(feature = "tracing")]
            tracing::warn!("stream failed: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::streaming::{
        pacer::{FixedDelay, Immediate, Pacer},
        processor::ModelLabels,
        script::ResponseScript,
    };
    use completer_tonic_core::proto::Completion;
    use core::time::Duration;
    use std::time::Instant;
    use tokio::sync::mpsc;
    use tonic::Status;

    fn request(
        pacer: Arc<dyn Pacer>,
    ) -> (
        StreamRequest,
        mpsc::Receiver<core::result::Result<Completion, Status>>,
    ) {
        let (resp_tx, resp_rx) = mpsc::channel(16);
        let request = StreamRequest {
            script: Arc::new(ResponseScript::new("one two three").unwrap()),
            labels: Arc::new(ModelLabels {
                delta: "test".into(),
                message: "human".into(),
            }),
            pacer,
            resp_tx,
            received_at: Instant::now(),
        };
        (request, resp_rx)
    }

    #[tokio::test]
    async fn completes_and_releases_its_slot() {
        let pool = Arc::new(StreamPool::new(1, Duration::from_secs(1)));
        let (req, mut rx) = request(Arc::new(Immediate));

        let state = stream_worker(Arc::clone(&pool), req).await.unwrap();
        assert_eq!(state, StreamState::Completed);
        assert_eq!(pool.streams_inflight(), 0);
        assert_eq!(pool.available_slots(), 1);

        let mut count = 0;
        while let Some(event) = rx.recv().await {
            event.unwrap();
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_cancellation_without_error() {
        let pool = Arc::new(StreamPool::new(1, Duration::from_secs(1)));
        let (req, rx) = request(Arc::new(FixedDelay(Duration::from_secs(5))));
        drop(rx);

        let state = stream_worker(Arc::clone(&pool), req).await.unwrap();
        assert_eq!(state, StreamState::Cancelled(0));
        assert_eq!(pool.available_slots(), 1);
        assert_eq!(pool.streams_inflight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_caller_hanging_up_leaves_the_queue() {
        let pool = Arc::new(StreamPool::new(1, Duration::from_secs(1)));
        let _busy = pool.acquire().await.unwrap();

        let (req, rx) = request(Arc::new(FixedDelay(Duration::from_secs(30))));
        let worker = tokio::spawn(stream_worker(Arc::clone(&pool), req));
        tokio::task::yield_now().await;
        assert_eq!(pool.streams_inflight(), 2);

        drop(rx);
        let state = tokio::time::timeout(Duration::from_secs(20), worker)
            .await
            .expect("queued worker did not notice the caller leaving")
            .unwrap()
            .unwrap();

        assert_eq!(state, StreamState::Cancelled(0));
        assert_eq!(pool.streams_inflight(), 1);
        assert_eq!(pool.available_slots(), 0);
    }

    #[tokio::test]
    async fn tells_the_caller_when_shutting_down() {
        let pool = Arc::new(StreamPool::new(1, Duration::ZERO));
        pool.shutdown().await.unwrap();
        let (req, mut rx) = request(Arc::new(Immediate));

        let err = stream_worker(pool, req).await.unwrap_err();
        assert!(matches!(err, Error::ServiceShutdown));

        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }
}
