//! Per-thumbnail render state.
//!
//! A `ThumbnailUnit` holds everything one page's thumbnail needs: the render
//! request it was created for, its visibility gate, its quality scheduler,
//! the current render phase and the displayed bitmap. The unit itself is
//! passive; the pipeline's `tick` mutates it.

use crate::phase::RenderPhase;
use pagedeck_cache::{CacheKey, RenderRequest};
use pagedeck_scheduler::{
    CancellationToken, Quality, QualityScheduler, Visibility, VisibilityGate,
};
use pagedeck_worker::Bitmap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One page's thumbnail.
#[derive(Debug)]
pub struct ThumbnailUnit {
    pub(crate) base_request: RenderRequest,
    pub(crate) gate: VisibilityGate,
    pub(crate) quality: QualityScheduler,
    pub(crate) phase: RenderPhase,
    pub(crate) retry_count: u32,

    /// Deadline for the next phase step (stabilization delay or retry
    /// backoff). `None` means the step is not time-gated.
    pub(crate) decode_due: Option<Instant>,

    /// The key this unit has registered as in flight, if any.
    pub(crate) pending_key: Option<CacheKey>,

    pub(crate) token: CancellationToken,
    pub(crate) displayed: Option<Arc<Bitmap>>,
    pub(crate) torn_down: bool,
}

impl ThumbnailUnit {
    /// Create a unit with the default unmount grace and settle delay.
    ///
    /// `request.resolution_scale` is the full-quality scale; the quality
    /// scheduler reduces it for the first render.
    pub fn new(request: RenderRequest) -> Self {
        Self::with_timing(
            request,
            pagedeck_scheduler::DEFAULT_UNMOUNT_GRACE,
            pagedeck_scheduler::DEFAULT_SETTLE_DELAY,
        )
    }

    /// Create a unit with explicit gate and promotion timing.
    pub fn with_timing(
        request: RenderRequest,
        unmount_grace: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            base_request: request,
            gate: VisibilityGate::with_grace(unmount_grace),
            quality: QualityScheduler::with_settle_delay(settle_delay),
            phase: RenderPhase::Idle,
            retry_count: 0,
            decode_due: None,
            pending_key: None,
            token: CancellationToken::new(),
            displayed: None,
            torn_down: false,
        }
    }

    /// Feed an intersection observation from the host's viewport tracker.
    ///
    /// Returns the visibility transition, if any. Observations after
    /// teardown are ignored.
    pub fn observe_visibility(&mut self, intersecting: bool, now: Instant) -> Option<Visibility> {
        if self.torn_down {
            return None;
        }
        let transition = self.gate.observe(intersecting, now);
        let since = self.gate.visible_since().unwrap_or(now);
        self.quality.observe_visibility(self.gate.visibility(), since);
        transition
    }

    /// The request as configured, at full resolution scale.
    pub fn request(&self) -> RenderRequest {
        self.base_request
    }

    /// The request the next render actually uses, quality-adjusted.
    pub fn effective_request(&self) -> RenderRequest {
        let scale = self.base_request.resolution_scale * self.quality.quality().scale_factor();
        self.base_request.at_scale(scale)
    }

    /// The cache key of the quality-adjusted request.
    pub fn render_key(&self) -> CacheKey {
        self.effective_request().cache_key()
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn visibility(&self) -> Visibility {
        self.gate.visibility()
    }

    pub fn quality(&self) -> Quality {
        self.quality.quality()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The bitmap currently displayed, if any.
    pub fn displayed(&self) -> Option<Arc<Bitmap>> {
        self.displayed.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagedeck_cache::SourceId;
    use pagedeck_worker::Rotation;

    fn request() -> RenderRequest {
        RenderRequest {
            source_id: SourceId::new(),
            page_index: 2,
            target_width: 200,
            resolution_scale: 1.0,
            rotation: Rotation::Deg0,
        }
    }

    #[test]
    fn test_fresh_unit_is_idle_low_hidden() {
        let unit = ThumbnailUnit::new(request());
        assert_eq!(unit.phase(), RenderPhase::Idle);
        assert_eq!(unit.quality(), Quality::Low);
        assert_eq!(unit.visibility(), Visibility::Hidden);
        assert!(unit.displayed().is_none());
    }

    #[test]
    fn test_effective_request_applies_quality_scale() {
        let unit = ThumbnailUnit::new(request());
        let effective = unit.effective_request();
        assert_eq!(effective.resolution_scale, 0.75);
        assert_ne!(unit.render_key(), unit.request().cache_key());
    }

    #[test]
    fn test_observe_after_teardown_is_ignored() {
        let mut unit = ThumbnailUnit::new(request());
        unit.torn_down = true;
        assert_eq!(unit.observe_visibility(true, Instant::now()), None);
        assert_eq!(unit.visibility(), Visibility::Hidden);
    }
}
