//! Pagedeck Scheduler Library
//!
//! Demand gating for the shared decode worker: per-thumbnail visibility
//! tracking with a debounced teardown transition, progressive quality
//! promotion for settled thumbnails, and cancellation tokens for tearing
//! down in-flight work.
//!
//! All timing here is deadline-based: callers pass the current `Instant`
//! into `tick`, so delays are cancellable and tests drive time explicitly.

mod cancel;
mod quality;
mod visibility;

pub use cancel::CancellationToken;
pub use quality::{Quality, QualityScheduler, DEFAULT_SETTLE_DELAY};
pub use visibility::{Visibility, VisibilityGate, DEFAULT_UNMOUNT_GRACE};
