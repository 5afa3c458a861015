//! Memory-bounded bitmap store with LRU eviction.
//!
//! The store is the only shared mutable resource in the render pipeline.
//! Every operation runs to completion under one lock, so the byte accounting
//! can never be observed mid-update. Eviction is bounded by both an entry
//! count and a byte budget; the least recently touched entry goes first.

use crate::config::CacheConfig;
use crate::key::CacheKey;
use pagedeck_worker::Bitmap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// One cached bitmap.
struct CacheEntry {
    bitmap: Arc<Bitmap>,

    /// width * height * 4, computed once at insertion
    estimated_size_bytes: usize,

    created_at: Instant,
    last_accessed_at: Instant,
}

/// Snapshot of store occupancy, for observability only.
///
/// Reading stats has no side effects; in particular a lookup miss does not
/// change anything reported here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    /// Number of live entries
    pub size: usize,

    /// Configured entry ceiling
    pub max_size: usize,

    /// Bytes held by live bitmaps
    pub memory_bytes: usize,

    /// Configured byte ceiling
    pub max_memory_bytes: usize,

    /// memory_bytes as a percentage of max_memory_bytes
    pub usage_percent: f64,
}

struct StoreState {
    entries: HashMap<CacheKey, CacheEntry>,

    /// Recency order: least recently touched at the front. Touched means
    /// read or written, so the front is always the eviction victim.
    lru_queue: VecDeque<CacheKey>,

    current_bytes: usize,
    max_entries: usize,
    max_bytes: usize,
}

impl StoreState {
    fn touch(&mut self, key: &CacheKey) {
        self.lru_queue.retain(|k| k != key);
        self.lru_queue.push_back(key.clone());
    }

    fn evict_lru(&mut self) {
        if let Some(key) = self.lru_queue.pop_front() {
            if let Some(entry) = self.entries.remove(&key) {
                self.current_bytes = self.current_bytes.saturating_sub(entry.estimated_size_bytes);
                log::trace!("evicted {} ({} bytes)", key, entry.estimated_size_bytes);
            }
        }
    }
}

/// Shared bitmap cache with LRU eviction.
///
/// Cloning the handle shares the same underlying store; one instance is
/// created per process and injected into the render pipeline (tests build
/// isolated instances instead of reaching for a global).
///
/// `set` never fails: a bitmap larger than the whole byte budget is still
/// admitted after everything else is evicted. The cache is a best-effort
/// layer, never a hard limiter of rendering.
///
/// # Example
///
/// ```
/// use pagedeck_cache::BitmapCache;
/// use pagedeck_worker::Bitmap;
/// # use pagedeck_cache::{RenderRequest, SourceId};
/// # use pagedeck_worker::Rotation;
///
/// let cache = BitmapCache::new(50, 200 * 1024 * 1024);
/// # let request = RenderRequest {
/// #     source_id: SourceId::new(),
/// #     page_index: 0,
/// #     target_width: 200,
/// #     resolution_scale: 1.0,
/// #     rotation: Rotation::Deg0,
/// # };
/// let key = request.cache_key();
///
/// cache.set(key.clone(), Bitmap::filled(200, 260, [255, 255, 255, 255]));
/// assert!(cache.get(&key).is_some());
/// ```
#[derive(Clone)]
pub struct BitmapCache {
    state: Arc<Mutex<StoreState>>,
}

impl BitmapCache {
    /// Create a cache with explicit entry and byte ceilings.
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                entries: HashMap::new(),
                lru_queue: VecDeque::new(),
                current_bytes: 0,
                max_entries,
                max_bytes,
            })),
        }
    }

    /// Create a cache from a configuration.
    pub fn with_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.max_bytes)
    }

    /// Look up a bitmap and bump it to most recently used.
    ///
    /// A miss has no side effect.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Bitmap>> {
        let mut state = self.state.lock().unwrap();

        if !state.entries.contains_key(key) {
            return None;
        }
        state.touch(key);
        state.entries.get_mut(key).map(|entry| {
            entry.last_accessed_at = Instant::now();
            Arc::clone(&entry.bitmap)
        })
    }

    /// Insert a bitmap, evicting least-recently-used entries as needed.
    ///
    /// Re-inserting an existing key replaces the entry and refreshes its
    /// recency without double-counting the byte budget. Eviction runs one
    /// entry at a time while the store is at its entry ceiling or the new
    /// size would exceed the byte ceiling, stopping early only when the
    /// store is already empty (so a single oversized bitmap still lands).
    pub fn set(&self, key: CacheKey, bitmap: Bitmap) {
        let mut state = self.state.lock().unwrap();

        let new_size = bitmap.width as usize * bitmap.height as usize * 4;

        if let Some(old) = state.entries.remove(&key) {
            state.current_bytes = state.current_bytes.saturating_sub(old.estimated_size_bytes);
            state.lru_queue.retain(|k| k != &key);
        }

        while (state.entries.len() >= state.max_entries
            || state.current_bytes + new_size > state.max_bytes)
            && !state.entries.is_empty()
        {
            state.evict_lru();
        }

        let now = Instant::now();
        state.current_bytes += new_size;
        state.entries.insert(
            key.clone(),
            CacheEntry {
                bitmap: Arc::new(bitmap),
                estimated_size_bytes: new_size,
                created_at: now,
                last_accessed_at: now,
            },
        );
        state.touch(&key);
    }

    /// Remove an entry if present.
    ///
    /// Returns `true` if an entry was removed. The bitmap's memory is
    /// released once the last outstanding display reference drops.
    pub fn delete(&self, key: &CacheKey) -> bool {
        let mut state = self.state.lock().unwrap();

        if let Some(entry) = state.entries.remove(key) {
            state.current_bytes = state.current_bytes.saturating_sub(entry.estimated_size_bytes);
            state.lru_queue.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    /// Drop every entry and reset the byte accounting.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        let dropped = state.entries.len();
        state.entries.clear();
        state.lru_queue.clear();
        state.current_bytes = 0;
        if dropped > 0 {
            log::debug!("cleared {dropped} cached bitmaps");
        }
    }

    /// Check for a key without touching recency.
    pub fn has(&self, key: &CacheKey) -> bool {
        let state = self.state.lock().unwrap();
        state.entries.contains_key(key)
    }

    /// Occupancy snapshot. Read-only.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        let usage_percent = if state.max_bytes == 0 {
            0.0
        } else {
            state.current_bytes as f64 / state.max_bytes as f64 * 100.0
        };
        CacheStats {
            size: state.entries.len(),
            max_size: state.max_entries,
            memory_bytes: state.current_bytes,
            max_memory_bytes: state.max_bytes,
            usage_percent,
        }
    }

    /// Age of an entry since insertion, if present.
    pub fn entry_age(&self, key: &CacheKey) -> Option<std::time::Duration> {
        let state = self.state.lock().unwrap();
        state.entries.get(key).map(|entry| entry.created_at.elapsed())
    }

    /// Time since an entry was last read or written, if present.
    pub fn entry_idle(&self, key: &CacheKey) -> Option<std::time::Duration> {
        let state = self.state.lock().unwrap();
        state.entries.get(key).map(|entry| entry.last_accessed_at.elapsed())
    }
}

impl Default for BitmapCache {
    /// Create a cache with the default budgets (50 entries, 200 MiB).
    fn default() -> Self {
        Self::with_config(&CacheConfig::default())
    }
}
