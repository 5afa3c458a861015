//! Cache key derivation for render requests.
//!
//! A cache key is a deterministic string over (source, page, width,
//! resolution scale, rotation). Keys are for exact-match lookup only; two
//! requests share a key exactly when all five fields are equal, so a
//! low-quality and a high-quality render of the same page never collide.

use pagedeck_worker::Rotation;
use std::fmt;
use uuid::Uuid;

/// Identity of a loaded source file (PDF or image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Uuid);

impl SourceId {
    /// Mint a fresh source identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything that identifies one rendered bitmap.
///
/// `resolution_scale` is the effective scale after quality adjustment; the
/// progressive scheduler renders at 0.75× first and 1.0× after the unit
/// settles, and those are distinct keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub source_id: SourceId,
    pub page_index: u32,
    pub target_width: u32,
    pub resolution_scale: f32,
    pub rotation: Rotation,
}

impl RenderRequest {
    /// Derive the cache key for this request.
    pub fn cache_key(&self) -> CacheKey {
        // Scale is fixed to thousandths so the key string is deterministic
        // and never depends on float formatting.
        let scale_millis = (self.resolution_scale * 1000.0).round() as u32;
        CacheKey(format!(
            "{}:{}:{}w:{}m:{}r",
            self.source_id,
            self.page_index,
            self.target_width,
            scale_millis,
            self.rotation.degrees()
        ))
    }

    /// The same request at a different resolution scale.
    pub fn at_scale(mut self, resolution_scale: f32) -> Self {
        self.resolution_scale = resolution_scale;
        self
    }
}

/// Opaque cache key for a rendered bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
