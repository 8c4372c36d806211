use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while gathering system state. "Not mounted" is not one of them.
#[derive(Debug, Error)]
pub enum Error {
    /// A file or directory we read from could not be read.
    #[error("cannot read {}: {source}", path.display())]
    SourceUnavailable {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input was read but did not have the expected shape.
    /// `line` is 1-based; 0 means the input is not line-oriented.
    #[error("malformed {what} (line {line}): {reason}")]
    Parse {
        what:   &'static str,
        line:   usize,
        reason: String,
    },

    /// An external tool is missing or exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ToolInvocationFailed {
        tool:   String,
        reason: String,
    },
}

impl Error {
    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::SourceUnavailable { path: path.into(), source }
    }

    pub fn parse(what: &'static str, line: usize, reason: impl Into<String>) -> Self {
        Error::Parse { what, line, reason: reason.into() }
    }

    pub fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ToolInvocationFailed { tool: tool.into(), reason: reason.into() }
    }
}
