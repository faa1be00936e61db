//! gRPC service implementation for streamed completions.
//!
//! This module defines [`CompleterService`], the concrete implementation of
//! the `provider.Completer` gRPC service. Every `Complete` call is answered
//! with the configured sentence, one word per delta event, followed by a
//! terminal event carrying the full text.
//!
//! ## Responsibilities
//!
//! - Own the shared, read-only stream inputs (script, labels, pacer).
//! - Spawn one [`stream_worker`] task per call; its events reach tonic
//!   through a bounded `mpsc` channel.
//! - Refuse new calls once shutdown has started.

use crate::server::{
    config::ServerConfig,
    pool::{manager::StreamPool, worker::stream_worker},
    streaming::{
        pacer::{Pacer, pacer_for},
        processor::ModelLabels,
        request::StreamRequest,
        script::ResponseScript,
    },
    telemetry::{
        increment_deltas_emitted, increment_requests, increment_stream_errors,
        record_words_per_stream,
    },
};
use completer_tonic_core::{
    Error,
    proto::{CompleteRequest, Completion, completer_server::Completer},
};
use core::pin::Pin;
use futures::TryStreamExt;
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status};

/// Streaming completion provider.
///
/// Requests are not inspected: any request yields the same stream. Streams
/// share no mutable state, so concurrent calls are fully independent apart
/// from the [`StreamPool`] bound on how many emit at once.
#[derive(Clone)]
pub struct CompleterService {
    config: ServerConfig,
    script: Arc<ResponseScript>,
    labels: Arc<ModelLabels>,
    pacer: Arc<dyn Pacer>,
    pool: Arc<StreamPool>,
}

impl CompleterService {
    /// Creates the service with the delay bounds configured in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured text has no words.
    pub fn new(config: ServerConfig) -> Result<Self, Error> {
        let pacer = pacer_for(config.min_delay, config.max_delay);
        Self::with_pacer(config, pacer)
    }

    /// Creates the service with a caller-supplied delay distribution.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured text has no words.
    pub fn with_pacer(config: ServerConfig, pacer: Arc<dyn Pacer>) -> Result<Self, Error> {
        let script = ResponseScript::new(config.text.clone())?;
        let labels = ModelLabels {
            delta: config.delta_model.clone(),
            message: config.message_model.clone(),
        };
        let pool = StreamPool::new(config.max_concurrent_streams, config.shutdown_timeout);

        Ok(Self {
            config,
            script: Arc::new(script),
            labels: Arc::new(labels),
            pacer,
            pool: Arc::new(pool),
        })
    }

    pub fn pool(&self) -> &StreamPool {
        &self.pool
    }

    /// Initiates a graceful shutdown of the stream pool.
    ///
    /// New calls are refused immediately; in-flight streams get up to the
    /// configured timeout to finish before they are cancelled.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.pool.shutdown().await
    }
}

#[tonic::async_trait]
impl Completer for CompleterService {
    type CompleteStream = Pin<Box<dyn Stream<Item = Result<Completion, Status>> + Send>>;

    /// Streams the configured sentence back to the caller.
    ///
    /// If `tracing` is enabled, each call gets its own span.
    ///
    /// If `metrics` is enabled, emits telemetry for:
    /// - request rate
    /// - words per stream and deltas emitted
    /// - concurrent stream count
    /// - stream duration
    /// - stream errors
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(messages = req.get_ref().messages.len())))]
    async fn complete(
        &self,
        req: Request<CompleteRequest>,
    ) -> Result<Response<Self::CompleteStream>, Status> {
        let received_at = Instant::now();

        if !self.pool.is_accepting() {
            increment_stream_errors();
            return Err(Error::ServiceShutdown.into());
        }

        increment_requests();
        record_words_per_stream(self.script.word_count() as f64);

        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<Completion, Status>>(self.config.stream_buffer_size);

        let request = StreamRequest {
            script: Arc::clone(&self.script),
            labels: Arc::clone(&self.labels),
            pacer: Arc::clone(&self.pacer),
            resp_tx,
            received_at,
        };

        let fut = stream_worker(Arc::clone(&self.pool), request);
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("streaming"))
        };

        tokio::spawn(fut);

        let stream = ReceiverStream::new(resp_rx).inspect_ok(|completion| {
            if completion.delta.is_some() {
                increment_deltas_emitted(1);
            }
        });

        Ok(Response::new(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{
        config::DEFAULT_TEXT,
        streaming::pacer::{FixedDelay, Immediate},
    };
    use completer_tonic_core::{
        CompletionAccumulator,
        client::RemoteCompleter,
        proto::{Content, Message, completer_server::CompleterServer},
        types::ROLE_ASSISTANT,
    };
    use core::time::Duration;
    use futures::future::join_all;
    use std::{collections::HashSet, net::SocketAddr};
    use tokio::net::TcpListener;
    use tokio_stream::{StreamExt, wrappers::TcpListenerStream};
    use tonic::transport::Server;

    fn immediate_service(config: ServerConfig) -> CompleterService {
        CompleterService::with_pacer(config, Arc::new(Immediate)).unwrap()
    }

    async fn serve(service: CompleterService) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            Server::builder()
                .add_service(CompleterServer::new(service))
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .unwrap();
        });

        addr
    }

    fn request() -> CompleteRequest {
        CompleteRequest {
            messages: vec![Message {
                role: "user".into(),
                content: vec![Content::from_text("Tell me something")],
            }],
            temperature: Some(0.2),
            ..Default::default()
        }
    }

    /// Runs one call and returns (deltas, terminal).
    async fn run(addr: SocketAddr) -> (Vec<Completion>, Completion) {
        let mut completer = RemoteCompleter::new(&format!("grpc://{addr}")).unwrap();
        let mut deltas = Vec::new();
        let terminal = completer
            .complete(request(), |delta| {
                deltas.push(delta.clone());
                Ok(())
            })
            .await
            .unwrap();
        (deltas, terminal)
    }

    #[tokio::test]
    async fn end_to_end_stream_matches_reference_sentence() {
        let addr = serve(immediate_service(ServerConfig::default())).await;
        let (deltas, terminal) = run(addr).await;

        assert_eq!(deltas.len() + 1, 9);
        let texts: Vec<String> = deltas.iter().map(Completion::text).collect();
        assert_eq!(
            texts,
            [
                "Please ",
                "provide ",
                "me ",
                "more ",
                "information ",
                "about ",
                "the ",
                "topic. "
            ]
        );

        for delta in &deltas {
            assert_eq!(delta.model, "test");
            assert!(delta.message.is_none());
            assert_eq!(delta.delta.as_ref().unwrap().role, ROLE_ASSISTANT);
        }

        assert_eq!(terminal.model, "human");
        assert!(terminal.delta.is_none());
        assert_eq!(terminal.text(), DEFAULT_TEXT);
        assert_eq!(terminal.reason.as_deref(), Some("stop"));

        let mut ids: HashSet<&str> = deltas.iter().map(|d| d.id.as_str()).collect();
        ids.insert(terminal.id.as_str());
        assert_eq!(ids.len(), 9);
    }

    #[tokio::test]
    async fn accumulated_deltas_agree_with_terminal_text() {
        let addr = serve(immediate_service(ServerConfig::default())).await;
        let (deltas, terminal) = run(addr).await;

        let mut acc = CompletionAccumulator::new();
        acc.extend(&deltas);
        assert_eq!(acc.text().trim_end(), terminal.text());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_streams_are_independent() {
        const STREAMS: usize = 16;

        let config = ServerConfig {
            max_concurrent_streams: 4,
            ..ServerConfig::default()
        };
        let pacer = Arc::new(FixedDelay(Duration::from_millis(5)));
        let addr = serve(CompleterService::with_pacer(config, pacer).unwrap()).await;

        let results = join_all((0..STREAMS).map(|_| tokio::spawn(run(addr)))).await;

        let mut all_ids = HashSet::new();
        for result in results {
            let (deltas, terminal) = result.unwrap();
            let texts: String = deltas.iter().map(Completion::text).collect();
            assert_eq!(texts, "Please provide me more information about the topic. ");
            assert_eq!(terminal.text(), DEFAULT_TEXT);

            for id in deltas.iter().map(|d| d.id.clone()).chain([terminal.id]) {
                assert!(all_ids.insert(id), "event id reused across streams");
            }
        }
        assert_eq!(all_ids.len(), STREAMS * 9);
    }

    #[tokio::test]
    async fn custom_script_and_labels() {
        let config = ServerConfig {
            text: "alpha beta".into(),
            delta_model: "partial".into(),
            message_model: "final".into(),
            ..ServerConfig::default()
        };
        let addr = serve(immediate_service(config)).await;
        let (deltas, terminal) = run(addr).await;

        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|d| d.model == "partial"));
        assert_eq!(terminal.model, "final");
        assert_eq!(terminal.text(), "alpha beta");
    }

    #[tokio::test]
    async fn raw_stream_ends_after_terminal_event() {
        let service = immediate_service(ServerConfig::default());
        let response = service.complete(Request::new(request())).await.unwrap();
        let events: Vec<_> = response.into_inner().collect().await;

        assert_eq!(events.len(), 9);
        let events: Vec<Completion> = events.into_iter().map(Result::unwrap).collect();
        assert!(events[..8].iter().all(Completion::is_delta));
        assert!(events[8].is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_response_releases_the_stream() {
        let service = CompleterService::with_pacer(
            ServerConfig::default(),
            Arc::new(FixedDelay(Duration::from_secs(30))),
        )
        .unwrap();

        let response = service.complete(Request::new(request())).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(service.pool().streams_inflight(), 1);

        drop(response);
        for _ in 0..10 {
            if service.pool().streams_inflight() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(service.pool().streams_inflight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_up_while_queued_frees_the_stream() {
        let config = ServerConfig {
            max_concurrent_streams: 1,
            ..ServerConfig::default()
        };
        let pacer = Arc::new(FixedDelay(Duration::from_secs(30)));
        let service = CompleterService::with_pacer(config, pacer).unwrap();

        let _running = service.complete(Request::new(request())).await.unwrap();
        let queued = service.complete(Request::new(request())).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(service.pool().streams_inflight(), 2);

        drop(queued);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(service.pool().streams_inflight(), 1);
    }

    #[tokio::test]
    async fn refuses_calls_after_shutdown() {
        let service = immediate_service(ServerConfig {
            shutdown_timeout: Duration::ZERO,
            ..ServerConfig::default()
        });
        service.shutdown().await.unwrap();

        let status = service
            .complete(Request::new(CompleteRequest::default()))
            .await
            .err()
            .unwrap();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }

    #[test]
    fn rejects_config_without_words() {
        let config = ServerConfig {
            text: "   ".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            CompleterService::new(config),
            Err(Error::InvalidRequest { .. })
        ));
    }
}
