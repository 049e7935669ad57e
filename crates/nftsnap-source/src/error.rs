use std::fmt;
use std::time::Duration;

/// A single remote read failed. Every variant except `Cancelled` is transient
/// from the caller's point of view and goes through [`crate::retry::retry_fixed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Connection / TLS / request-building failure.
    Transport(String),
    /// The call did not finish within the per-call timeout.
    Timeout { after: Duration },
    /// Non-2xx HTTP status.
    HttpStatus { status: u16, body: String },
    /// Response body could not be decoded into the expected shape.
    Decode(String),
    /// JSON-RPC level error that is not a contract revert.
    Rpc { code: i64, message: String },
    /// A stop was requested before the read could be (re)tried.
    Cancelled,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {msg}"),
            SourceError::Timeout { after } => {
                write!(f, "request timed out after {}ms", after.as_millis())
            }
            SourceError::HttpStatus { status, body } => {
                write!(f, "http error status={status} body={}", preview(body, 200))
            }
            SourceError::Decode(msg) => write!(f, "decode error: {msg}"),
            SourceError::Rpc { code, message } => write!(f, "rpc error code={code}: {message}"),
            SourceError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not expose the configured limit on the error.
            SourceError::Timeout {
                after: Duration::ZERO,
            }
        } else if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

fn preview(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        s.to_string()
    } else {
        let head: String = s.chars().take(n).collect();
        format!("{head}...")
    }
}
