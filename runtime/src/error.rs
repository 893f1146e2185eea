use thiserror::Error;

/// The runtime's error taxonomy (§7): configuration, topology, routing,
/// transport, and resource errors. Every fallible constructor and `exec`
/// path returns one of these; nothing is retried locally. The binary-level
/// caller (a demo, or an embedding application) is the one place that turns
/// this into the fatal abort-with-128 behavior §6 specifies — the library
/// itself stays a `Result`-returning API so it can be exercised by tests.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("topology error: {0}")]
    Topology(String),

    #[error("routing error: {0}")]
    Routing(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("resource error: {0}")]
    Resource(String),
}

impl From<shuffle_communication::CommError> for RuntimeError {
    fn from(e: shuffle_communication::CommError) -> Self {
        RuntimeError::Transport(e.to_string())
    }
}

/// Exit code a caller should use when surfacing a `RuntimeError` as a fatal
/// process abort, per §6 "Exit codes".
pub const FATAL_EXIT_CODE: i32 = 128;
