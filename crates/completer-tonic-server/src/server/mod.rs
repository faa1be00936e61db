//! Server-side components of the completer service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/env configuration and validation.
//! - [`pool`] - Bounded stream pool and per-stream worker tasks.
//! - [`service`] - The `Completer` gRPC service implementation.
//! - [`streaming`] - The canned response, pacing and event emission.
//! - [`telemetry`] - Logging, tracing and metrics initialization.

pub mod config;
pub mod pool;
pub mod service;
pub mod streaming;
pub mod telemetry;
