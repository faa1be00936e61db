//! Production of completion events for a single stream.
//!
//! - [`script`] - The canned sentence and its word split.
//! - [`pacer`] - Delay distribution between delta events.
//! - [`processor`] - Builds individual delta and terminal events.
//! - [`coordinator`] - Drives one stream from start to completion.
//! - [`request`] - The unit of work handed to a stream worker.

pub mod coordinator;
pub mod pacer;
pub mod processor;
pub mod request;
pub mod script;
