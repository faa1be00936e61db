//! Host-side client for a remote `Completer` service.
//!
//! [`RemoteCompleter`] dials a completer addressed as `grpc://host:port`,
//! relays every delta event to a caller-supplied callback and resolves to the
//! terminal event once it arrives. The connection is plaintext HTTP/2 and is
//! established lazily on the first call.

use crate::{
    Error, Result,
    proto::{CompleteRequest, Completion, completer_client::CompleterClient},
};
use tonic::transport::{Channel, Endpoint};

/// URL scheme accepted by [`RemoteCompleter::new`].
pub const GRPC_SCHEME: &str = "grpc://";

#[derive(Debug, Clone)]
pub struct RemoteCompleter {
    url: String,
    client: CompleterClient<Channel>,
}

impl RemoteCompleter {
    /// Creates a client for the completer at `url`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` is empty or not `grpc://`.
    /// - [`Error::Transport`] if the remaining authority is not a valid URI.
    pub fn new(url: &str) -> Result<Self> {
        let authority = parse_url(url)?;

        let endpoint = Endpoint::from_shared(format!("http://{authority}")).map_err(|e| {
            Error::Transport {
                context: format!("invalid endpoint {authority}: {e}"),
            }
        })?;

        Ok(Self {
            url: url.to_string(),
            client: CompleterClient::new(endpoint.connect_lazy()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Runs one completion.
    ///
    /// `on_delta` sees every partial event in order; returning an error from
    /// it aborts the call with that error. Resolves to the first event that
    /// carries a full `message`.
    ///
    /// # Errors
    ///
    /// - [`Error::Status`] when the service fails the call or the stream.
    /// - [`Error::IncompleteStream`] when the stream ends without a terminal
    ///   message.
    pub async fn complete<F>(&mut self, request: CompleteRequest, mut on_delta: F) -> Result<Completion>
    where
        F: FnMut(&Completion) -> Result<()>,
    {
        let mut stream = self.client.complete(request).await?.into_inner();

        while let Some(completion) = stream.message().await? {
            if completion.message.is_some() {
                return Ok(completion);
            }

            if completion.delta.is_some() {
                on_delta(&completion)?;
            }
        }

        Err(Error::IncompleteStream)
    }
}

fn parse_url(url: &str) -> Result<&str> {
    match url.strip_prefix(GRPC_SCHEME) {
        Some(authority) if !authority.is_empty() => Ok(authority),
        _ => Err(Error::InvalidUrl {
            url: url.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_grpc_urls() {
        assert_eq!(parse_url("grpc://localhost:50051").unwrap(), "localhost:50051");
        assert_eq!(parse_url("grpc://[::1]:50051").unwrap(), "[::1]:50051");
    }

    #[test]
    fn rejects_other_schemes() {
        for url in ["", "grpc://", "http://localhost:50051", "localhost:50051"] {
            assert!(
                matches!(parse_url(url), Err(Error::InvalidUrl { .. })),
                "{url:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn builds_lazy_client() {
        let completer = RemoteCompleter::new("grpc://127.0.0.1:50051").unwrap();
        assert_eq!(completer.url(), "grpc://127.0.0.1:50051");
    }

    #[tokio::test]
    async fn unreachable_service_surfaces_status() {
        // Port 1 is reserved and nothing listens on it.
        let mut completer = RemoteCompleter::new("grpc://127.0.0.1:1").unwrap();
        let err = completer
            .complete(CompleteRequest::default(), |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Status(_)), "unexpected error: {err:?}");
    }
}
