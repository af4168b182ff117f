//! Error types for the `gh`-backed platform client

use thiserror::Error;

/// Result type for GitHub CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while shelling out to the `gh` CLI
#[derive(Error, Debug)]
pub enum Error {
    /// `gh` could not be spawned at all (missing binary, permissions, ...)
    #[error("failed to spawn {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    /// `gh` exited non-zero after exhausting retries
    #[error("gh {args} failed (exit {code:?}): {stderr}")]
    CommandFailed {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A call did not complete within its configured timeout
    #[error("gh {args} timed out after {timeout_secs}s")]
    Timeout { args: String, timeout_secs: u64 },

    /// `gh`'s JSON output did not match the expected shape
    #[error("failed to parse gh output for {args}: {source}")]
    Parse {
        args: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<Error> for principal_core::Error {
    fn from(err: Error) -> Self {
        principal_core::Error::Platform(err.to_string())
    }
}
