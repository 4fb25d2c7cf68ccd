/// Internal Error Taxonomy
///
/// A single typed error enum unifies the failure modes that occur while
/// spawning tool executables, decoding their output, and reading the
/// tools directory. Internal functions return `Result<T, McpError>` and
/// propagate with `?`; the JSON-RPC dispatcher in `core::server` is the
/// only place that turns one of these into a client-facing error code.
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to spawn child process: {0}")]
    ChildSpawn(String),

    #[error("invalid UTF-8 in child output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A per-provider record describing why its `list` output was rejected.
///
/// This is not an `McpError` variant because listing errors are collected
/// rather than propagated: a single bad provider poisons `tools/list`
/// without aborting the rest of the registry build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingError {
    pub provider_path: String,
    pub reason: String,
}

impl fmt::Display for ListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider_path, self.reason)
    }
}
