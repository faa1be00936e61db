//! gRPC service implementation.
//!
//! This module contains the client-facing entry point that accepts
//! `Complete` calls, hands each one to a background stream worker and returns
//! the response stream to tonic.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`CompleterService`).

pub mod handler;
