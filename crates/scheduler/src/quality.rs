//! Progressive quality promotion.
//!
//! Every page renders first at a reduced resolution scale for fast perceived
//! load. Once a unit has stayed continuously visible past the settle delay
//! it is promoted to full resolution. The promoted render has a different
//! cache key, so it is a second render rather than a mutation of the first.
//! Leaving view before the settle delay cancels the pending promotion, which
//! bounds peak worker load during fast scrolling.

use crate::visibility::Visibility;
use std::time::{Duration, Instant};

/// How long a unit must stay visible before being promoted to full quality.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Render quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    /// Fast first paint at reduced resolution
    Low,

    /// Full-resolution render for a settled thumbnail
    High,
}

impl Quality {
    /// Multiplier applied to the base resolution scale.
    pub fn scale_factor(self) -> f32 {
        match self {
            Quality::Low => 0.75,
            Quality::High => 1.0,
        }
    }
}

/// Decides when a thumbnail unit is promoted from Low to High quality.
#[derive(Debug, Clone)]
pub struct QualityScheduler {
    settle_delay: Duration,
    quality: Quality,
    visible_since: Option<Instant>,
}

impl QualityScheduler {
    /// Create a scheduler with the default settle delay.
    pub fn new() -> Self {
        Self::with_settle_delay(DEFAULT_SETTLE_DELAY)
    }

    /// Create a scheduler with a custom settle delay.
    pub fn with_settle_delay(settle_delay: Duration) -> Self {
        Self { settle_delay, quality: Quality::Low, visible_since: None }
    }

    /// Track the unit's visibility.
    ///
    /// Any departure from `Visible` clears the pending promotion; the
    /// settle clock restarts from the next time the unit becomes visible.
    pub fn observe_visibility(&mut self, visibility: Visibility, now: Instant) {
        match visibility {
            Visibility::Visible => {
                if self.visible_since.is_none() {
                    self.visible_since = Some(now);
                }
            }
            Visibility::Hidden | Visibility::Unmounted => {
                self.visible_since = None;
            }
        }
    }

    /// Advance the settle clock.
    ///
    /// Returns `Some(Quality::High)` exactly once, when a still-visible unit
    /// has settled. Callers treat that as a new render request.
    pub fn tick(&mut self, now: Instant) -> Option<Quality> {
        if self.quality == Quality::High {
            return None;
        }
        let visible_since = self.visible_since?;
        if now.duration_since(visible_since) >= self.settle_delay {
            log::trace!("settled after {:?}, promoting to high quality", self.settle_delay);
            self.quality = Quality::High;
            return Some(Quality::High);
        }
        None
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Return to Low quality with no pending promotion.
    ///
    /// Called when the unit's render key changes.
    pub fn reset(&mut self) {
        self.quality = Quality::Low;
        self.visible_since = None;
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }
}

impl Default for QualityScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_millis(200);

    #[test]
    fn test_scale_factors() {
        assert_eq!(Quality::Low.scale_factor(), 0.75);
        assert_eq!(Quality::High.scale_factor(), 1.0);
    }

    #[test]
    fn test_promotes_after_settle_delay() {
        let mut scheduler = QualityScheduler::with_settle_delay(SETTLE);
        let t0 = Instant::now();

        scheduler.observe_visibility(Visibility::Visible, t0);
        assert_eq!(scheduler.tick(t0 + Duration::from_millis(100)), None);
        assert_eq!(scheduler.quality(), Quality::Low);

        assert_eq!(scheduler.tick(t0 + SETTLE), Some(Quality::High));
        assert_eq!(scheduler.quality(), Quality::High);

        // Promotion fires exactly once.
        assert_eq!(scheduler.tick(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_hiding_before_settle_cancels_promotion() {
        let mut scheduler = QualityScheduler::with_settle_delay(SETTLE);
        let t0 = Instant::now();

        scheduler.observe_visibility(Visibility::Visible, t0);
        scheduler.observe_visibility(Visibility::Hidden, t0 + Duration::from_millis(50));

        assert_eq!(scheduler.tick(t0 + Duration::from_secs(5)), None);
        assert_eq!(scheduler.quality(), Quality::Low);
    }

    #[test]
    fn test_settle_clock_restarts_on_reentry() {
        let mut scheduler = QualityScheduler::with_settle_delay(SETTLE);
        let t0 = Instant::now();

        scheduler.observe_visibility(Visibility::Visible, t0);
        scheduler.observe_visibility(Visibility::Hidden, t0 + Duration::from_millis(150));

        let t1 = t0 + Duration::from_millis(500);
        scheduler.observe_visibility(Visibility::Visible, t1);

        // Earlier visibility does not count toward the new settle window.
        assert_eq!(scheduler.tick(t1 + Duration::from_millis(100)), None);
        assert_eq!(scheduler.tick(t1 + SETTLE), Some(Quality::High));
    }

    #[test]
    fn test_continuous_visibility_keeps_original_clock() {
        let mut scheduler = QualityScheduler::with_settle_delay(SETTLE);
        let t0 = Instant::now();

        scheduler.observe_visibility(Visibility::Visible, t0);
        scheduler.observe_visibility(Visibility::Visible, t0 + Duration::from_millis(150));

        assert_eq!(scheduler.tick(t0 + SETTLE), Some(Quality::High));
    }

    #[test]
    fn test_unmount_cancels_promotion() {
        let mut scheduler = QualityScheduler::with_settle_delay(SETTLE);
        let t0 = Instant::now();

        scheduler.observe_visibility(Visibility::Visible, t0);
        scheduler.observe_visibility(Visibility::Unmounted, t0 + Duration::from_millis(50));

        assert_eq!(scheduler.tick(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_reset_returns_to_low() {
        let mut scheduler = QualityScheduler::with_settle_delay(SETTLE);
        let t0 = Instant::now();

        scheduler.observe_visibility(Visibility::Visible, t0);
        scheduler.tick(t0 + SETTLE);
        assert_eq!(scheduler.quality(), Quality::High);

        scheduler.reset();
        assert_eq!(scheduler.quality(), Quality::Low);
        assert_eq!(scheduler.tick(t0 + Duration::from_secs(10)), None);
    }
}
