//! Error type shared by parsing, scoring and snapshot code.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = LmError> = std::result::Result<T, E>;

/// Failures surfaced by the language model.
#[derive(Debug, Error)]
pub enum LmError {
    /// Malformed ARPA text or an unreadable snapshot.
    #[error("format error{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Format {
        message: String,
        /// 1-based line number in the ARPA source, when known.
        line: Option<usize>,
    },
    /// Caller passed an argument the operation cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Operation not available for this model order.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LmError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
            line: None,
        }
    }

    pub fn format_at(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
            line: Some(line),
        }
    }
}

impl From<bincode::Error> for LmError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                Self::format("truncated snapshot")
            }
            bincode::ErrorKind::Io(io) => Self::Io(io),
            other => Self::format(format!("corrupted snapshot: {other}")),
        }
    }
}
