#![doc = include_str!("../README.md")]

pub mod client;
mod common;
pub use common::*;

/// gRPC service and message definitions generated from
/// `proto/provider.proto`.
///
/// ## Service
///
/// - `Completer.Complete` - server-streaming call that yields zero or more
///   [`Completion`](proto::Completion)s carrying a `delta`, followed by
///   exactly one carrying the full `message`.
///
/// ## Invariants
///
/// - Every event has a fresh `id`.
/// - `delta` and `message` are never both set on the same event.
pub mod proto {
    tonic::include_proto!("provider");

    /// Encoded file descriptor set used to register gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("provider_descriptor");
}
