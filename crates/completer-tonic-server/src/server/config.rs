use anyhow::bail;
use clap::{Parser, ValueEnum};
use completer_tonic_core::types::DEFAULT_PORT;
use core::time::Duration;

/// Sentence streamed back to every caller unless overridden.
pub const DEFAULT_TEXT: &str = "Please provide me more information about the topic.";

/// Model label attached to partial (delta) events.
pub const DEFAULT_DELTA_MODEL: &str = "test";

/// Model label attached to the terminal event.
pub const DEFAULT_MESSAGE_MODEL: &str = "human";

fn default_server_addr() -> String {
    format!("[::]:{DEFAULT_PORT}")
}

/// Output format of the console log layer.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Runtime configuration for the `completer-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first). The defaults reproduce the reference
/// behavior: the default sentence, streamed word by word with a random pause
/// of 300ms to 1s before each word.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "completer-tonic-server",
    version,
    about = "A gRPC completion provider that streams a canned response"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "[::]:50051" or "/tmp/completer.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = default_server_addr())]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Sentence streamed back to callers, one whitespace-delimited word per
    /// delta event.
    ///
    /// Environment variable: `COMPLETION_TEXT`
    #[arg(long, env = "COMPLETION_TEXT", default_value_t = String::from(DEFAULT_TEXT))]
    pub text: String,

    /// Model label attached to delta events.
    ///
    /// Environment variable: `DELTA_MODEL`
    #[arg(long, env = "DELTA_MODEL", default_value_t = String::from(DEFAULT_DELTA_MODEL))]
    pub delta_model: String,

    /// Model label attached to the terminal event.
    ///
    /// Environment variable: `MESSAGE_MODEL`
    #[arg(long, env = "MESSAGE_MODEL", default_value_t = String::from(DEFAULT_MESSAGE_MODEL))]
    pub message_model: String,

    /// Lower bound of the pause before each delta, in milliseconds.
    ///
    /// Environment variable: `MIN_DELAY_MS`
    #[arg(long, env = "MIN_DELAY_MS", default_value_t = 300)]
    pub min_delay_ms: u64,

    /// Upper bound (inclusive) of the pause before each delta, in
    /// milliseconds.
    ///
    /// Environment variable: `MAX_DELAY_MS`
    #[arg(long, env = "MAX_DELAY_MS", default_value_t = 1000)]
    pub max_delay_ms: u64,

    /// Maximum number of streams emitting at the same time. Further calls
    /// are accepted and wait for a free slot.
    ///
    /// Environment variable: `MAX_CONCURRENT_STREAMS`
    #[arg(long, env = "MAX_CONCURRENT_STREAMS", default_value_t = 10)]
    pub max_concurrent_streams: usize,

    /// Capacity of the event buffer between a stream worker and the gRPC
    /// response.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight streams to finish during shutdown
    /// before they are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,

    /// Console log format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub text: String,
    pub delta_model: String,
    pub message_model: String,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_concurrent_streams: usize,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.text.split_whitespace().next().is_none() {
            bail!("COMPLETION_TEXT must contain at least one word");
        }

        if args.delta_model.is_empty() || args.message_model.is_empty() {
            bail!("DELTA_MODEL and MESSAGE_MODEL must not be empty");
        }

        if args.min_delay_ms > args.max_delay_ms {
            bail!(
                "MIN_DELAY_MS ({}) exceeds MAX_DELAY_MS ({})",
                args.min_delay_ms,
                args.max_delay_ms
            );
        }

        if args.max_concurrent_streams == 0 {
            bail!("MAX_CONCURRENT_STREAMS must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            text: args.text,
            delta_model: args.delta_model,
            message_model: args.message_model,
            min_delay: Duration::from_millis(args.min_delay_ms),
            max_delay: Duration::from_millis(args.max_delay_ms),
            max_concurrent_streams: args.max_concurrent_streams,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            log_format: args.log_format,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            uds: false,
            text: DEFAULT_TEXT.to_string(),
            delta_model: DEFAULT_DELTA_MODEL.to_string(),
            message_model: DEFAULT_MESSAGE_MODEL.to_string(),
            min_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(1000),
            max_concurrent_streams: 10,
            stream_buffer_size: 8,
            shutdown_timeout: Duration::from_secs(5),
            log_format: LogFormat::Pretty,
        }
    }
}
