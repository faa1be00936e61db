use super::{
    pacer::Pacer,
    processor::{ModelLabels, delta_event, message_event},
    script::ResponseScript,
};
use completer_tonic_core::{Error, proto::Completion};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Progress of a single stream.
///
/// `Emitting(i)` means `i` deltas have been sent so far; `Cancelled(i)`
/// records how far the stream got before the caller went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotStarted,
    Emitting(usize),
    Completed,
    Cancelled(usize),
}

impl StreamState {
    /// Transition taken when the stream starts or a delta has been sent.
    #[must_use]
    pub const fn advance(self) -> Self {
        match self {
            Self::NotStarted => Self::Emitting(0),
            Self::Emitting(sent) => Self::Emitting(sent + 1),
            terminal => terminal,
        }
    }

    /// Transition taken when the caller disconnects.
    #[must_use]
    pub const fn cancel(self) -> Self {
        match self {
            Self::NotStarted => Self::Cancelled(0),
            Self::Emitting(sent) => Self::Cancelled(sent),
            terminal => terminal,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled(_))
    }

    /// Number of delta events sent before reaching this state.
    pub const fn deltas_sent(self, total_words: usize) -> usize {
        match self {
            Self::NotStarted => 0,
            Self::Emitting(sent) | Self::Cancelled(sent) => sent,
            Self::Completed => total_words,
        }
    }
}

/// Outcome of handing one event to the caller.
enum Delivery {
    Sent,
    CallerGone,
    ShuttingDown,
}

/// Sends `event`, giving up if the service shuts down while the caller's
/// buffer is full.
async fn deliver(
    resp_tx: &mpsc::Sender<Result<Completion, Status>>,
    event: Completion,
    shutdown: &CancellationToken,
) -> Delivery {
    tokio::select! {
        biased;
        sent = resp_tx.send(Ok(event)) => match sent {
            Ok(()) => Delivery::Sent,
            // The receiver being dropped is the only way this channel closes.
            Err(_) => Delivery::CallerGone,
        },
        () = shutdown.cancelled() => Delivery::ShuttingDown,
    }
}

/// Tells the caller the service is going away, without waiting for buffer
/// space it may never free.
fn notify_shutdown(resp_tx: &mpsc::Sender<Result<Completion, Status>>) -> Error {
    if let Err(_e) = resp_tx.try_send(Err(Error::ServiceShutdown.into())) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Failed to forward shutdown status: {_e}");
    }
    Error::ServiceShutdown
}

/// Streams the script to the caller, one word at a time.
///
/// For every word: wait for the pacer's delay, then send a delta event. After
/// the last word, send the terminal event with the full text.
///
/// The pause is abandoned as soon as the caller goes away (the receiving half
/// of `resp_tx` is dropped) or the service starts shutting down. Sends into a
/// full buffer are abandoned on shutdown as well.
///
/// Returns `Completed` once the terminal event is delivered, or
/// `Cancelled(n)` if the caller disconnected after `n` deltas. Nothing is
/// sent after a disconnect.
///
/// # Errors
///
/// [`Error::ServiceShutdown`] if `shutdown` fired mid-stream. An
/// `UNAVAILABLE` status is sent to the caller on a best-effort basis.
pub async fn feed_completion(
    script: &ResponseScript,
    labels: &ModelLabels,
    pacer: &dyn Pacer,
    resp_tx: &mpsc::Sender<Result<Completion, Status>>,
    shutdown: &CancellationToken,
) -> completer_tonic_core::Result<StreamState> {
    let mut state = StreamState::NotStarted.advance();

    for word in script.words() {
        let delay = pacer.next_delay();

        tokio::select! {
            biased;
            () = resp_tx.closed() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(?state, "caller went away while pausing");
                return Ok(state.cancel());
            }
            () = shutdown.cancelled() => return Err(notify_shutdown(resp_tx)),
            () = tokio::time::sleep(delay) => {}
        }

        match deliver(resp_tx, delta_event(word, labels), shutdown).await {
            Delivery::Sent => state = state.advance(),
            Delivery::CallerGone => return Ok(state.cancel()),
            Delivery::ShuttingDown => return Err(notify_shutdown(resp_tx)),
        }
    }

    debug_assert_eq!(state, StreamState::Emitting(script.word_count()));

    match deliver(resp_tx, message_event(script, labels), shutdown).await {
        Delivery::Sent => Ok(StreamState::Completed),
        Delivery::CallerGone => Ok(state.cancel()),
        Delivery::ShuttingDown => Err(notify_shutdown(resp_tx)),
    }
}
