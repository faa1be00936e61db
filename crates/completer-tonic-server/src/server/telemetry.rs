//! # Telemetry Features
//!
//! Console logging is always on and goes through `tracing_subscriber::fmt`,
//! either as pretty multi-line output or as one JSON object per line (see
//! `--log-format`). On top of that, OpenTelemetry traces and metrics can be
//! exported to stdout or to any OTLP collector.
//!
//! ## Feature matrix
//!
//! - `tracing`: Enables OpenTelemetry distributed tracing (via spans).
//! - `metrics`: Enables OpenTelemetry metrics (counters, histograms).
//! - `otlp`: Enables the OTLP/gRPC exporter. The endpoint, headers and
//!   compression come from the standard `OTEL_EXPORTER_OTLP_*` variables.
//! - `stdout`: Enables the stdout exporter.
//!
//! ## Feature constraints
//!
//! - Exporters require at least one of: `tracing` or `metrics`.
//! - `otlp` and `stdout` can be enabled at the same time.
//!
//! ## Span behavior
//!
//! - Each `Complete` call gets a span, with a child span for its stream
//!   worker; both are exported to any enabled backend.
//! - Events (`tracing::info!`, etc.) inside a span become span events.
//! - Events outside of a span only reach the console log.
//!
//! ## Metrics
//!
//! | Name               | Kind                 | Meaning                          |
//! |--------------------|----------------------|----------------------------------|
//! | `requests`         | counter              | `Complete` calls accepted        |
//! | `streams_inflight` | up/down counter      | streams currently emitting       |
//! | `stream_errors`    | counter              | refused or failed streams        |
//! | `streams_cancelled`| counter              | callers that hung up early       |
//! | `stream_duration`  | histogram (ms)       | call received to terminal event  |
//! | `deltas_emitted`   | counter              | delta events handed to tonic     |
//! | `words_per_stream` | histogram            | words in the streamed script     |
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --features tracing,metrics,otlp
//! cargo run --features tracing,stdout
//! ```

#[cfg(all(feature = "otlp", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!("The 'otlp' feature requires at least one of 'tracing' or 'metrics' to be enabled.");

#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use crate::server::config::LogFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(all(feature = "otlp", any(feature = "metrics", feature = "tracing")))]
use opentelemetry_otlp::WithExportConfig;

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

const SERVICE_NAME: &str = "completer";

/// Exporter handles that must be flushed on shutdown.
pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down every enabled provider. Failures are printed
    /// to stderr since the log pipeline may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber and any enabled OpenTelemetry providers.
///
/// The filter defaults to `info` and can be overridden with `RUST_LOG`.
pub fn init_telemetry(log_format: LogFormat) -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Exactly one of these is `Some`.
    let pretty = (log_format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
            .with_file(true)
            .pretty()
    });
    let json = (log_format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
            .json()
            .with_current_span(true)
    });

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(pretty)
        .with(json);

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(&meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build metrics exporter")?;

        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(all(feature = "tracing", any(feature = "stdout", feature = "otlp")))]
fn batch_config() -> sdktrace::BatchConfig {
    sdktrace::BatchConfigBuilder::default()
        .with_scheduled_delay(std::time::Duration::from_secs(5))
        .with_max_queue_size(2048)
        .build()
}

#[cfg(feature = "tracing")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config())
            .build();
        builder.with_span_processor(batch)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build tracer exporter")?;

        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config())
            .build();

        builder.with_span_processor(batch)
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
static REQUESTS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAMS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAM_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAMS_CANCELLED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAM_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static DELTAS_EMITTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static WORDS_PER_STREAM: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = REQUESTS.set(
        meter
            .u64_counter("requests")
            .with_description("Total Complete calls accepted")
            .build(),
    );

    let _ = STREAMS_INFLIGHT.set(
        meter
            .i64_up_down_counter("streams_inflight")
            .with_description("Streams currently emitting events")
            .build(),
    );

    let _ = STREAM_ERRORS.set(
        meter
            .u64_counter("stream_errors")
            .with_description("Refused or failed streams")
            .build(),
    );

    let _ = STREAMS_CANCELLED.set(
        meter
            .u64_counter("streams_cancelled")
            .with_description("Streams whose caller disconnected before the end")
            .build(),
    );

    let _ = STREAM_DURATION_MS.set(
        meter
            .f64_histogram("stream_duration")
            .with_unit("ms")
            .with_description("Time from call received to terminal event")
            .build(),
    );

    let _ = DELTAS_EMITTED.set(
        meter
            .u64_counter("deltas_emitted")
            .with_description("Delta events handed to the transport")
            .build(),
    );

    let _ = WORDS_PER_STREAM.set(
        meter
            .f64_histogram("words_per_stream")
            .with_description("Words streamed per call")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_requests() {
    if let Some(counter) = REQUESTS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_requests() {}

#[cfg(feature = "metrics")]
pub fn increment_streams_inflight() {
    if let Some(counter) = STREAMS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_streams_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_streams_inflight() {
    if let Some(counter) = STREAMS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_streams_inflight() {}

#[cfg(feature = "metrics")]
pub fn increment_stream_errors() {
    if let Some(counter) = STREAM_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_stream_errors() {}

#[cfg(feature = "metrics")]
pub fn increment_streams_cancelled() {
    if let Some(counter) = STREAMS_CANCELLED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_streams_cancelled() {}

#[cfg(feature = "metrics")]
pub fn record_stream_duration(duration_ms: f64) {
    if let Some(histogram) = STREAM_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_stream_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn increment_deltas_emitted(count: u64) {
    if let Some(counter) = DELTAS_EMITTED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_deltas_emitted(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn record_words_per_stream(count: f64) {
    if let Some(histogram) = WORDS_PER_STREAM.get() {
        histogram.record(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_words_per_stream(_count: f64) {}
