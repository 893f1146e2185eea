use thiserror::Error;

/// Failures that can occur in the process-group bootstrap or in a transport
/// primitive built on top of it.
///
/// These map onto the "transport error" and "resource error" branches of the
/// wider error taxonomy; the runtime crate wraps this type into its own
/// `RuntimeError`.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("failed to spawn rank thread: {0}")]
    Spawn(String),

    #[error("rank {rank} out of range for a group of size {nprocs}")]
    RankOutOfRange { rank: usize, nprocs: usize },

    #[error("worker thread panicked: {0}")]
    WorkerPanic(String),
}
