//! Decode error taxonomy and classification.
//!
//! The pipeline decides between retrying and surfacing a terminal error by
//! classifying decode failures. Structured variants classify directly;
//! free-text backend messages fall back to substring matching, which is kept
//! for compatibility with workers that only report a message string.

/// Errors produced by a decode worker.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("document is password protected")]
    PasswordProtected,
    #[error("document is corrupted")]
    Corrupted,
    #[error("worker channel not ready: {0}")]
    ChannelNotReady(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// How a decode failure should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A worker-readiness race; retry with backoff up to the retry bound.
    Transient,

    /// The document requires a password; terminal, never retried.
    PasswordProtected,

    /// The document bytes cannot be parsed; terminal, never retried.
    Corrupted,

    /// Any other failure (worker unavailable, I/O, bad handle); terminal.
    Unavailable,
}

impl DecodeError {
    /// Classify this error for the retry/recovery machine.
    ///
    /// Structured variants map directly. `ChannelNotReady` is always
    /// transient regardless of its message. `Backend` messages go through
    /// [`classify_message`].
    pub fn class(&self) -> ErrorClass {
        match self {
            DecodeError::ChannelNotReady(_) => ErrorClass::Transient,
            DecodeError::PasswordProtected => ErrorClass::PasswordProtected,
            DecodeError::Corrupted | DecodeError::Parse(_) => ErrorClass::Corrupted,
            DecodeError::Io(_)
            | DecodeError::InvalidHandle(_)
            | DecodeError::PageOutOfRange { .. } => ErrorClass::Unavailable,
            DecodeError::Backend(message) => classify_message(message),
        }
    }
}

/// Classify a free-text failure message by substring.
///
/// The transient signatures match the known worker-channel race ("worker
/// reached before its message channel initialized"). This matching is not
/// exhaustive; an unrecognized message classifies as `Unavailable`.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();

    if lower.contains("messagehandler")
        || lower.contains("worker-channel")
        || lower.contains("sendwithpromise")
    {
        return ErrorClass::Transient;
    }
    if lower.contains("password") || lower.contains("encrypted") {
        return ErrorClass::PasswordProtected;
    }
    if lower.contains("corrupt") || lower.contains("invalid") {
        return ErrorClass::Corrupted;
    }

    ErrorClass::Unavailable
}
