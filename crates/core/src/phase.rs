//! Render phases and terminal error presentation.
//!
//! Each thumbnail unit moves through a small phase machine driven by the
//! pipeline's `tick`. Terminal failures carry a user-facing label chosen by
//! error classification; transient failures only reach this type once the
//! retry bound is exhausted.

use pagedeck_worker::{DecodeError, ErrorClass};
use std::fmt;

/// Why a thumbnail ended in the error placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderErrorKind {
    /// The document requires a password
    PasswordProtected,

    /// The document bytes could not be parsed
    Corrupted,

    /// The document could not be loaded at all
    Unavailable,

    /// Decoding kept failing past the retry bound
    RenderFailed,
}

/// Terminal render failure shown in place of the thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderError {
    kind: RenderErrorKind,
}

impl RenderError {
    pub fn kind(&self) -> RenderErrorKind {
        self.kind
    }

    /// The label shown in the thumbnail's error placeholder.
    pub fn label(&self) -> &'static str {
        match self.kind {
            RenderErrorKind::PasswordProtected => "password protected",
            RenderErrorKind::Corrupted => "file is corrupted",
            RenderErrorKind::Unavailable => "unable to load file",
            RenderErrorKind::RenderFailed => "failed to render page",
        }
    }

    /// The error reported when the retry bound is exhausted.
    pub fn render_failed() -> Self {
        Self { kind: RenderErrorKind::RenderFailed }
    }

    /// Terminal error for a classified page-decode failure.
    ///
    /// `Transient` only arrives here once retries ran out, so it maps to the
    /// generic render failure.
    pub fn from_class(class: ErrorClass) -> Self {
        let kind = match class {
            ErrorClass::PasswordProtected => RenderErrorKind::PasswordProtected,
            ErrorClass::Corrupted => RenderErrorKind::Corrupted,
            ErrorClass::Unavailable => RenderErrorKind::Unavailable,
            ErrorClass::Transient => RenderErrorKind::RenderFailed,
        };
        Self { kind }
    }

    /// Terminal error for a failed document load.
    ///
    /// Document loads are never retried, so even a transient-looking failure
    /// is terminal and reports the document as unavailable.
    pub fn from_load_error(error: &DecodeError) -> Self {
        let kind = match error.class() {
            ErrorClass::PasswordProtected => RenderErrorKind::PasswordProtected,
            ErrorClass::Corrupted => RenderErrorKind::Corrupted,
            ErrorClass::Transient | ErrorClass::Unavailable => RenderErrorKind::Unavailable,
        };
        Self { kind }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Render phase of one thumbnail unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// Nothing in flight; the next tick of a visible unit starts a render
    Idle,

    /// Waiting for the source document to load
    Loading,

    /// Document loaded; waiting out the stabilization delay
    DocumentReady,

    /// Page decode requested, or a retry of it is pending
    PageReady,

    /// A bitmap is displayed
    Rendered,

    /// Terminal failure; the error placeholder is shown
    Errored(RenderError),
}

impl RenderPhase {
    /// Whether the unit has reached a resting state for its current key.
    pub fn is_settled(&self) -> bool {
        matches!(self, RenderPhase::Rendered | RenderPhase::Errored(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_labels() {
        assert_eq!(
            RenderError::from_class(ErrorClass::PasswordProtected).label(),
            "password protected"
        );
        assert_eq!(RenderError::from_class(ErrorClass::Corrupted).label(), "file is corrupted");
        assert_eq!(RenderError::from_class(ErrorClass::Unavailable).label(), "unable to load file");
        assert_eq!(RenderError::render_failed().label(), "failed to render page");
    }

    #[test]
    fn test_exhausted_transient_is_render_failed() {
        assert_eq!(
            RenderError::from_class(ErrorClass::Transient).kind(),
            RenderErrorKind::RenderFailed
        );
    }

    #[test]
    fn test_load_errors_are_never_transient() {
        let error = DecodeError::ChannelNotReady("messageHandler is null".to_owned());
        assert_eq!(RenderError::from_load_error(&error).kind(), RenderErrorKind::Unavailable);

        assert_eq!(
            RenderError::from_load_error(&DecodeError::PasswordProtected).kind(),
            RenderErrorKind::PasswordProtected
        );
        assert_eq!(
            RenderError::from_load_error(&DecodeError::Corrupted).kind(),
            RenderErrorKind::Corrupted
        );
    }

    #[test]
    fn test_settled_phases() {
        assert!(!RenderPhase::Idle.is_settled());
        assert!(!RenderPhase::PageReady.is_settled());
        assert!(RenderPhase::Rendered.is_settled());
        assert!(RenderPhase::Errored(RenderError::render_failed()).is_settled());
    }
}
