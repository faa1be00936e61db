//! Shared types and error definitions used by both the server and the client.
//!
//! ## Submodules
//!
//! - [`error`] - Centralized error type and its `tonic::Status` mapping.
//! - [`types`] - Constants and constructors for protocol messages.
//! - [`accumulator`] - Folds streamed events into a single completion.

pub mod accumulator;
pub mod error;
pub mod types;

pub use accumulator::CompletionAccumulator;
pub use error::{Error, Result};
