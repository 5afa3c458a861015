//! The thumbnail render pipeline.
//!
//! One pipeline is shared by every thumbnail unit in the process. It owns
//! the bitmap cache, the decode worker and the set of loaded documents, and
//! drives each unit's phase machine from `tick`.
//!
//! A tick of a visible unit does at most one step of work:
//!
//! 1. cache lookup for the unit's render key, displaying a hit immediately
//! 2. on a miss, document load (deduplicated per source)
//! 3. after a short stabilization delay, the page decode
//! 4. classification of decode failures into bounded linear-backoff retries
//!    (worker-readiness races) and immediate terminal errors (password
//!    protection, corruption, anything else)
//!
//! At most one decode is in flight per cache key: a unit wanting a key that
//! another unit is already rendering stays idle until the cache write lands
//! and then hits the cache.

use crate::phase::{RenderError, RenderPhase};
use crate::unit::ThumbnailUnit;
use pagedeck_cache::{BitmapCache, CacheKey, RenderRequest, SourceId};
use pagedeck_scheduler::{Quality, Visibility};
use pagedeck_worker::{
    classify_message, Bitmap, DecodeError, DecodeWorker, DocumentHandle, ErrorClass,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Retries allowed after the initial decode attempt.
pub const MAX_RETRIES: u32 = 3;

/// Base retry backoff; attempt n waits `BASE_RETRY_DELAY * (n + 1)`.
pub const BASE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Pause between a document load completing and the first page decode.
pub const DOCUMENT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Counters over the pipeline's lifetime, for observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Page decodes handed to the worker, including retries
    pub decode_attempts: u64,

    /// Renders satisfied from the bitmap cache
    pub cache_hits: u64,

    /// Documents loaded through the worker
    pub documents_loaded: u64,

    /// Transient failures that scheduled a retry
    pub retries_scheduled: u64,

    /// Units that ended in the error placeholder
    pub terminal_errors: u64,
}

/// Failure reported by the host while presenting a rendered bitmap.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PresentError {
    pub message: String,
}

impl PresentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// What happened when a rendered bitmap was handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The host displayed the bitmap
    Presented,

    /// The unit has nothing to present
    NotRendered,

    /// Presentation failed transiently; a fresh render is scheduled
    RetryScheduled,

    /// Presentation failed terminally; the unit shows the error placeholder
    Suppressed,
}

#[derive(Default)]
struct PipelineState {
    sources: HashMap<SourceId, Vec<u8>>,
    docs: HashMap<SourceId, DocumentHandle>,

    /// Keys with a render in progress, from document load through decode
    /// completion or terminal failure.
    in_flight: HashSet<CacheKey>,

    stats: PipelineStats,
}

/// Shared render pipeline for every thumbnail unit.
///
/// Construction takes the cache and the worker explicitly; tests inject a
/// scripted worker and an isolated cache.
pub struct ThumbnailPipeline {
    cache: BitmapCache,
    worker: Arc<dyn DecodeWorker>,
    state: Mutex<PipelineState>,
}

impl ThumbnailPipeline {
    pub fn new(cache: BitmapCache, worker: Arc<dyn DecodeWorker>) -> Self {
        Self { cache, worker, state: Mutex::new(PipelineState::default()) }
    }

    /// The bitmap cache backing this pipeline.
    pub fn cache(&self) -> &BitmapCache {
        &self.cache
    }

    /// Snapshot of the pipeline counters.
    pub fn stats(&self) -> PipelineStats {
        self.state.lock().unwrap().stats
    }

    /// Register a source file's bytes and mint its identity.
    ///
    /// The document is not loaded until a unit first needs it.
    pub fn add_source(&self, bytes: Vec<u8>) -> SourceId {
        let source_id = SourceId::new();
        self.state.lock().unwrap().sources.insert(source_id, bytes);
        source_id
    }

    /// Drop a source and close its loaded document, if any.
    ///
    /// Cached bitmaps for the source stay in the cache under normal LRU
    /// accounting; their keys can no longer be re-rendered.
    pub fn remove_source(&self, source_id: SourceId) {
        let handle = {
            let mut state = self.state.lock().unwrap();
            state.sources.remove(&source_id);
            state.docs.remove(&source_id)
        };
        if let Some(handle) = handle {
            if let Err(err) = self.worker.close_document(handle) {
                log::warn!("failed to close document for {source_id}: {err}");
            }
        }
    }

    /// Number of pages in a source, loading its document if needed.
    pub fn page_count(&self, source_id: SourceId) -> Result<u32, DecodeError> {
        let handle = self.document_handle(source_id)?;
        self.worker.page_count(handle)
    }

    /// Advance one unit's phase machine.
    ///
    /// Safe to call at any cadence; deadlines are checked against `now`, so
    /// a late tick just fires the pending step late.
    pub fn tick(&self, unit: &mut ThumbnailUnit, now: Instant) {
        if unit.torn_down {
            return;
        }

        if unit.gate.tick(now) == Some(Visibility::Unmounted) {
            log::debug!("unmounting thumbnail {}", unit.base_request.cache_key());
            self.release_unit(unit);
            return;
        }
        if unit.gate.visibility() == Visibility::Unmounted {
            return;
        }

        let visible_since = unit.gate.visible_since().unwrap_or(now);
        unit.quality.observe_visibility(unit.gate.visibility(), visible_since);
        if unit.quality.tick(now) == Some(Quality::High) {
            // The promoted render has a new key. The low-quality bitmap
            // stays displayed until the high-quality one lands.
            self.unregister_pending(unit);
            unit.phase = RenderPhase::Idle;
            unit.retry_count = 0;
            unit.decode_due = None;
        }

        if !unit.gate.is_visible() {
            return;
        }

        match unit.phase {
            RenderPhase::Idle => {
                if unit.decode_due.map_or(true, |due| now >= due) {
                    unit.decode_due = None;
                    self.begin(unit);
                }
            }
            RenderPhase::Loading => self.load_document(unit, now),
            RenderPhase::DocumentReady | RenderPhase::PageReady => {
                if unit.decode_due.map_or(true, |due| now >= due) {
                    unit.decode_due = None;
                    self.decode(unit, now);
                }
            }
            RenderPhase::Rendered | RenderPhase::Errored(_) => {}
        }
    }

    /// Permanently tear a unit down.
    ///
    /// The unit's token is cancelled so a decode completing concurrently
    /// cannot touch it; the decode's cache write still lands. Ticks and
    /// observations after teardown are no-ops.
    pub fn teardown(&self, unit: &mut ThumbnailUnit) {
        unit.token.cancel();
        self.unregister_pending(unit);
        unit.decode_due = None;
        unit.displayed = None;
        unit.torn_down = true;
    }

    /// Replace the unit's request, resetting its render machine.
    ///
    /// Used when the page index, width or rotation of an existing unit
    /// changes. The retry budget and quality level start over.
    pub fn set_request(&self, unit: &mut ThumbnailUnit, request: RenderRequest) {
        if unit.torn_down {
            return;
        }
        self.unregister_pending(unit);
        unit.base_request = request;
        unit.phase = RenderPhase::Idle;
        unit.retry_count = 0;
        unit.decode_due = None;
        unit.displayed = None;
        unit.quality.reset();
    }

    /// Hand the unit's rendered bitmap to the host for display.
    ///
    /// A transient presentation failure (the same worker-channel signatures
    /// as decode failures) releases the bitmap and schedules a fresh render
    /// against the unit's retry budget. Any other failure, or a transient
    /// one past the bound, suppresses the thumbnail: the unit moves to the
    /// error placeholder instead of propagating the failure.
    pub fn present_with<F>(&self, unit: &mut ThumbnailUnit, now: Instant, present: F) -> PresentOutcome
    where
        F: FnOnce(&Bitmap) -> Result<(), PresentError>,
    {
        if unit.torn_down {
            return PresentOutcome::NotRendered;
        }
        let bitmap = match (&unit.phase, &unit.displayed) {
            (RenderPhase::Rendered, Some(bitmap)) => Arc::clone(bitmap),
            _ => return PresentOutcome::NotRendered,
        };

        match present(&bitmap) {
            Ok(()) => PresentOutcome::Presented,
            Err(err)
                if classify_message(&err.message) == ErrorClass::Transient
                    && unit.retry_count < MAX_RETRIES =>
            {
                unit.retry_count += 1;
                let delay = BASE_RETRY_DELAY * (unit.retry_count + 1);
                log::debug!(
                    "presentation failed for {} (attempt {}): {err}; re-rendering in {delay:?}",
                    unit.render_key(),
                    unit.retry_count
                );
                unit.displayed = None;
                unit.phase = RenderPhase::Idle;
                unit.decode_due = Some(now + delay);
                self.state.lock().unwrap().stats.retries_scheduled += 1;
                PresentOutcome::RetryScheduled
            }
            Err(err) => {
                log::warn!("presentation failed for {}: {err}", unit.render_key());
                self.fail_terminal(unit, RenderError::render_failed());
                PresentOutcome::Suppressed
            }
        }
    }

    /// Start a render: cache lookup first, then claim the key.
    fn begin(&self, unit: &mut ThumbnailUnit) {
        let key = unit.render_key();
        if let Some(bitmap) = self.cache.get(&key) {
            self.state.lock().unwrap().stats.cache_hits += 1;
            unit.displayed = Some(bitmap);
            unit.phase = RenderPhase::Rendered;
            return;
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.in_flight.contains(&key) {
                // Another unit is rendering this key; wait for its cache
                // write instead of decoding twice.
                log::trace!("awaiting in-flight render of {key}");
                return;
            }
            state.in_flight.insert(key.clone());
        }

        unit.pending_key = Some(key);
        unit.phase = RenderPhase::Loading;
    }

    fn load_document(&self, unit: &mut ThumbnailUnit, now: Instant) {
        match self.document_handle(unit.base_request.source_id) {
            Ok(_) => {
                // Let a freshly loaded document settle before the first
                // page decode hits it.
                unit.phase = RenderPhase::DocumentReady;
                unit.decode_due = Some(now + DOCUMENT_SETTLE_DELAY);
            }
            Err(err) => {
                log::warn!("document load failed for {}: {err}", unit.base_request.source_id);
                self.fail_terminal(unit, RenderError::from_load_error(&err));
            }
        }
    }

    fn decode(&self, unit: &mut ThumbnailUnit, now: Instant) {
        unit.phase = RenderPhase::PageReady;
        let request = unit.effective_request();
        let key = request.cache_key();

        let handle = match self.document_handle(request.source_id) {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("document unavailable for {key}: {err}");
                self.fail_terminal(unit, RenderError::from_load_error(&err));
                return;
            }
        };

        self.state.lock().unwrap().stats.decode_attempts += 1;
        let result = self.worker.decode_page(
            handle,
            request.page_index,
            request.target_width,
            request.rotation,
            request.resolution_scale,
        );

        match result {
            Ok(bitmap) => {
                self.unregister_pending(unit);
                self.cache.set(key.clone(), bitmap);
                if unit.token.is_cancelled() {
                    // Torn down while decoding. The cache write above still
                    // lands; the unit itself stays untouched.
                    return;
                }
                unit.displayed = self.cache.get(&key);
                unit.phase = RenderPhase::Rendered;
                unit.retry_count = 0;
            }
            Err(err) => match err.class() {
                ErrorClass::Transient if unit.retry_count < MAX_RETRIES => {
                    unit.retry_count += 1;
                    let delay = BASE_RETRY_DELAY * (unit.retry_count + 1);
                    log::debug!(
                        "transient decode failure for {key} (attempt {}): {err}; retrying in {delay:?}",
                        unit.retry_count
                    );
                    unit.decode_due = Some(now + delay);
                    self.state.lock().unwrap().stats.retries_scheduled += 1;
                }
                ErrorClass::Transient => {
                    log::warn!("decode failed after {} attempts for {key}: {err}", MAX_RETRIES + 1);
                    self.fail_terminal(unit, RenderError::render_failed());
                }
                class => {
                    log::warn!("decode failed for {key}: {err}");
                    self.fail_terminal(unit, RenderError::from_class(class));
                }
            },
        }
    }

    fn fail_terminal(&self, unit: &mut ThumbnailUnit, error: RenderError) {
        self.unregister_pending(unit);
        unit.decode_due = None;
        unit.displayed = None;
        unit.phase = RenderPhase::Errored(error);
        self.state.lock().unwrap().stats.terminal_errors += 1;
    }

    /// Unmount: release display resources, keep cached bitmaps.
    fn release_unit(&self, unit: &mut ThumbnailUnit) {
        self.unregister_pending(unit);
        unit.displayed = None;
        unit.decode_due = None;
        unit.phase = RenderPhase::Idle;
        unit.quality.reset();
    }

    fn unregister_pending(&self, unit: &mut ThumbnailUnit) {
        if let Some(key) = unit.pending_key.take() {
            self.state.lock().unwrap().in_flight.remove(&key);
        }
    }

    /// The loaded document for a source, loading it on first use.
    fn document_handle(&self, source_id: SourceId) -> Result<DocumentHandle, DecodeError> {
        let mut state = self.state.lock().unwrap();
        if let Some(handle) = state.docs.get(&source_id) {
            return Ok(*handle);
        }
        let bytes = state
            .sources
            .get(&source_id)
            .ok_or_else(|| DecodeError::Backend(format!("unknown source {source_id}")))?;
        let handle = self.worker.load_document(bytes)?;
        state.docs.insert(source_id, handle);
        state.stats.documents_loaded += 1;
        Ok(handle)
    }
}
