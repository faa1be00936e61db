use super::{pacer::Pacer, processor::ModelLabels, script::ResponseScript};
use completer_tonic_core::proto::Completion;
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tonic::Status;

/// Everything a stream worker needs to serve one `Complete` call.
///
/// The script, labels and pacer are shared read-only between all streams;
/// only `resp_tx` belongs to this call. Dropping the receiving half of
/// `resp_tx` is how the caller's cancellation reaches the worker.
pub struct StreamRequest {
    pub script: Arc<ResponseScript>,
    pub labels: Arc<ModelLabels>,
    pub pacer: Arc<dyn Pacer>,
    pub resp_tx: mpsc::Sender<Result<Completion, Status>>,
    pub received_at: Instant,
}
