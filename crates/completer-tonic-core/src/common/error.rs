//! Error types for the completion service and its client.
//!
//! [`Error`] captures every reportable failure in the system. It implements
//! `From<Error>` for `tonic::Status` so a failure raised while producing a
//! stream always reaches the caller as a transport-level status rather than a
//! malformed event.
//!
//! ## Error Cases
//! - `ChannelError`: An internal communication failure between tasks.
//! - `Internal`: Producing the next event failed.
//! - `RequestCancelled`: The caller cancelled or disconnected mid-stream.
//! - `InvalidRequest`: The request was malformed.
//! - `ServiceShutdown`: A request arrived (or was running) during shutdown.
//! - `InvalidUrl`, `Transport`, `IncompleteStream`, `Status`: client side.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the completion service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// Computing the next event failed.
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// The completer URL is empty or does not use the `grpc://` scheme.
    #[error("Invalid url: {url:?}")]
    InvalidUrl { url: String },

    /// The client channel could not be created.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// The stream ended before a terminal message arrived.
    #[error("Stream ended without a final message")]
    IncompleteStream,

    /// A status returned by the remote service.
    #[error("Remote status: {0}")]
    Status(#[from] Status),
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::Internal { reason } => Status::internal(reason),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::InvalidUrl { url } => Status::invalid_argument(format!("Invalid url: {url}")),
            Error::Transport { context } => Status::unavailable(context),
            Error::IncompleteStream => {
                Status::data_loss("Stream ended without a final message")
            }
            Error::Status(status) => status,
        }
    }
}
