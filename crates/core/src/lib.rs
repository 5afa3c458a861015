//! Pagedeck Core Library
//!
//! The thumbnail render pipeline. Each visible page is represented by a
//! [`ThumbnailUnit`] that the [`ThumbnailPipeline`] drives through a small
//! phase machine: check the shared bitmap cache, load the source document,
//! decode the page, display the result. Transient worker failures are
//! retried with linear backoff up to a bound; content failures (password
//! protection, corruption) are terminal immediately.
//!
//! All timing is deadline-based: the host calls `tick` with the current
//! `Instant`, so tests drive time explicitly and nothing sleeps.

pub mod phase;
pub mod pipeline;
pub mod unit;

pub use phase::{RenderError, RenderErrorKind, RenderPhase};
pub use pipeline::{
    PipelineStats, PresentError, PresentOutcome, ThumbnailPipeline, BASE_RETRY_DELAY,
    DOCUMENT_SETTLE_DELAY, MAX_RETRIES,
};
pub use unit::ThumbnailUnit;
