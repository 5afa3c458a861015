//! Pagedeck Decode Worker Library
//!
//! Boundary contract for the shared page-decode worker: bitmap and rotation
//! types, the `DecodeWorker` trait, structured decode errors with message
//! classification, and a `lopdf`-backed reference worker.

pub mod bitmap;
pub mod error;
pub mod worker;

pub use bitmap::{Bitmap, Rotation};
pub use error::{classify_message, DecodeError, ErrorClass};
pub use worker::{DecodeWorker, DocumentHandle, LopdfWorker};
