//! Per-thumbnail visibility gate.
//!
//! Wraps the boolean intersection signal from the host's viewport tracker
//! into three states: `Hidden` (not intersecting), `Visible` (intersecting)
//! and `Unmounted` (out of view long enough to reclaim the unit's
//! resources). The `Visible -> Unmounted` path is debounced: the unit must
//! stay out of view past a grace period, so fast scrolling does not thrash
//! mount/unmount cycles. While `Unmounted`, the render pipeline must not be
//! invoked for the unit; its cached bitmap stays in the store under normal
//! LRU accounting and is reused if the unit scrolls back before eviction.

use std::time::{Duration, Instant};

/// Grace period a unit must remain out of view before it is unmounted.
pub const DEFAULT_UNMOUNT_GRACE: Duration = Duration::from_millis(300);

/// Visibility state of one thumbnail unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Not intersecting the viewport
    Hidden,

    /// Intersecting the viewport
    Visible,

    /// Out of view past the grace period; resources reclaimed
    Unmounted,
}

/// Debounced visibility tracker for one thumbnail unit.
#[derive(Debug, Clone)]
pub struct VisibilityGate {
    state: Visibility,
    visible_since: Option<Instant>,
    hidden_since: Option<Instant>,
    unmount_grace: Duration,
}

impl VisibilityGate {
    /// Create a gate with the default unmount grace period.
    ///
    /// A fresh unit starts `Hidden` and never unmounts before it has been
    /// observed at least once.
    pub fn new() -> Self {
        Self::with_grace(DEFAULT_UNMOUNT_GRACE)
    }

    /// Create a gate with a custom unmount grace period.
    pub fn with_grace(unmount_grace: Duration) -> Self {
        Self { state: Visibility::Hidden, visible_since: None, hidden_since: None, unmount_grace }
    }

    /// Feed an intersection observation from the viewport tracker.
    ///
    /// Returns the transition when the state changed. Re-entering view from
    /// `Hidden` or `Unmounted` always returns to `Visible` and cancels any
    /// pending unmount.
    pub fn observe(&mut self, intersecting: bool, now: Instant) -> Option<Visibility> {
        if intersecting {
            self.hidden_since = None;
            if self.state != Visibility::Visible {
                self.state = Visibility::Visible;
                self.visible_since = Some(now);
                return Some(Visibility::Visible);
            }
            None
        } else {
            self.visible_since = None;
            if self.state == Visibility::Visible {
                self.state = Visibility::Hidden;
                self.hidden_since = Some(now);
                return Some(Visibility::Hidden);
            }
            None
        }
    }

    /// Advance the debounce clock.
    ///
    /// Returns `Some(Unmounted)` once the unit has been out of view past
    /// the grace period.
    pub fn tick(&mut self, now: Instant) -> Option<Visibility> {
        if self.state == Visibility::Hidden {
            if let Some(hidden_since) = self.hidden_since {
                if now.duration_since(hidden_since) >= self.unmount_grace {
                    log::trace!("unmount grace elapsed");
                    self.state = Visibility::Unmounted;
                    self.hidden_since = None;
                    return Some(Visibility::Unmounted);
                }
            }
        }
        None
    }

    pub fn visibility(&self) -> Visibility {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state == Visibility::Visible
    }

    /// When the unit last became visible, if it currently is.
    pub fn visible_since(&self) -> Option<Instant> {
        self.visible_since
    }

    pub fn unmount_grace(&self) -> Duration {
        self.unmount_grace
    }
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_millis(300);

    #[test]
    fn test_starts_hidden_and_never_unmounts_unobserved() {
        let mut gate = VisibilityGate::with_grace(GRACE);
        let t0 = Instant::now();

        assert_eq!(gate.visibility(), Visibility::Hidden);
        assert_eq!(gate.tick(t0 + Duration::from_secs(60)), None);
        assert_eq!(gate.visibility(), Visibility::Hidden);
    }

    #[test]
    fn test_observe_transitions() {
        let mut gate = VisibilityGate::with_grace(GRACE);
        let t0 = Instant::now();

        assert_eq!(gate.observe(true, t0), Some(Visibility::Visible));
        assert!(gate.is_visible());
        assert_eq!(gate.visible_since(), Some(t0));

        // Repeat observations are not transitions.
        assert_eq!(gate.observe(true, t0 + GRACE), None);
        assert_eq!(gate.visible_since(), Some(t0));

        assert_eq!(gate.observe(false, t0 + GRACE), Some(Visibility::Hidden));
        assert!(!gate.is_visible());
    }

    #[test]
    fn test_unmount_is_debounced() {
        let mut gate = VisibilityGate::with_grace(GRACE);
        let t0 = Instant::now();

        gate.observe(true, t0);
        gate.observe(false, t0 + Duration::from_millis(10));

        // Within the grace period nothing happens.
        assert_eq!(gate.tick(t0 + Duration::from_millis(100)), None);
        assert_eq!(gate.visibility(), Visibility::Hidden);

        // Past the grace period the unit unmounts.
        assert_eq!(
            gate.tick(t0 + Duration::from_millis(10) + GRACE),
            Some(Visibility::Unmounted)
        );
        assert_eq!(gate.visibility(), Visibility::Unmounted);

        // The transition fires once.
        assert_eq!(gate.tick(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_reentry_cancels_pending_unmount() {
        let mut gate = VisibilityGate::with_grace(GRACE);
        let t0 = Instant::now();

        gate.observe(true, t0);
        gate.observe(false, t0 + Duration::from_millis(10));
        // Scrolled back before the grace period elapsed.
        assert_eq!(
            gate.observe(true, t0 + Duration::from_millis(50)),
            Some(Visibility::Visible)
        );

        assert_eq!(gate.tick(t0 + Duration::from_secs(5)), None);
        assert!(gate.is_visible());
    }

    #[test]
    fn test_remount_from_unmounted() {
        let mut gate = VisibilityGate::with_grace(GRACE);
        let t0 = Instant::now();

        gate.observe(true, t0);
        gate.observe(false, t0);
        gate.tick(t0 + GRACE);
        assert_eq!(gate.visibility(), Visibility::Unmounted);

        let t1 = t0 + Duration::from_secs(2);
        assert_eq!(gate.observe(true, t1), Some(Visibility::Visible));
        assert_eq!(gate.visible_since(), Some(t1));
    }

    #[test]
    fn test_visible_since_resets_per_entry() {
        let mut gate = VisibilityGate::with_grace(GRACE);
        let t0 = Instant::now();

        gate.observe(true, t0);
        gate.observe(false, t0 + Duration::from_millis(20));
        gate.observe(true, t0 + Duration::from_millis(40));

        assert_eq!(gate.visible_since(), Some(t0 + Duration::from_millis(40)));
    }
}
