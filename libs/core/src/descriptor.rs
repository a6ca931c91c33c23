use std::fmt;

use serde::{Deserialize, Serialize};

pub const UNKNOWN_OPERATION: &str = "UnknownOperation";
pub const INVOCATION_FAILURE: &str = "InvocationFailure";
pub const CALL_TIMEOUT: &str = "CallTimeout";
pub const CHANNEL_CLOSED: &str = "ChannelClosed";

/// Serializable projection of a failure
///
/// Failures can't cross a channel as Rust errors, so the callee reports them
/// as data in the first slot of a response's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: String,
    pub message: String,
    pub trace: Option<String>,
}

impl ErrorDescriptor {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// The callee has no operation registered under `operation`
    pub fn unknown_operation(operation: &str) -> Self {
        Self::new(
            UNKNOWN_OPERATION,
            format!("That function does not exist: {}", operation),
        )
    }

    pub fn invocation_failure(message: impl Into<String>) -> Self {
        Self::new(INVOCATION_FAILURE, message)
    }

    pub fn call_timeout(operation: &str, after_ms: u64) -> Self {
        Self::new(
            CALL_TIMEOUT,
            format!("Call to {} got no response within {} ms", operation, after_ms),
        )
    }

    pub fn channel_closed(operation: &str) -> Self {
        Self::new(
            CHANNEL_CLOSED,
            format!("Channel closed before {} was answered", operation),
        )
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorDescriptor {}
