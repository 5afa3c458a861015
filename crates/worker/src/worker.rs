//! Decode worker boundary and the `lopdf`-backed reference worker.
//!
//! One decode worker instance is shared across every thumbnail unit. The
//! worker serializes decodes internally, so callers queue behind it rather
//! than running page decodes in parallel.

use crate::bitmap::{Bitmap, Rotation};
use crate::error::DecodeError;
use image::{Rgba, RgbaImage};
use lopdf::Document;
use std::collections::HashMap;
use std::sync::Mutex;

/// Opaque handle to a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(pub(crate) u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Construct a handle from a raw value.
    ///
    /// Intended for tests and fakes; a handle fabricated this way is only
    /// meaningful to the worker that issued the raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// The shared page-decode worker.
///
/// Implementations turn document bytes into per-page bitmaps. Methods take
/// `&self` so a single instance can be shared as `Arc<dyn DecodeWorker>`;
/// implementations use interior mutability and serialize decodes.
///
/// Errors carry enough structure for the render pipeline to classify them
/// into retryable and terminal failures (see [`crate::error::ErrorClass`]).
pub trait DecodeWorker: Send + Sync {
    /// Load a document from raw bytes and return a handle to it.
    fn load_document(&self, bytes: &[u8]) -> Result<DocumentHandle, DecodeError>;

    /// Number of pages in a loaded document.
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, DecodeError>;

    /// Decode one page into a bitmap.
    ///
    /// `target_width` is the unscaled thumbnail width in pixels; `scale` is
    /// the effective resolution scale (quality-adjusted). Rotation swaps the
    /// output aspect for 90 and 270 degrees.
    fn decode_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target_width: u32,
        rotation: Rotation,
        scale: f32,
    ) -> Result<Bitmap, DecodeError>;

    /// Close a document and release its resources.
    fn close_document(&self, handle: DocumentHandle) -> Result<(), DecodeError>;
}

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageSize {
    width_pt: f32,
    height_pt: f32,
}

#[derive(Debug)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
struct WorkerState {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

/// Reference decode worker backed by `lopdf`.
///
/// Parses page geometry from the PDF and rasterizes a placeholder page
/// (white fill, grey border) at the requested width, scale and rotation.
/// A production deployment substitutes a real rasterizer behind the same
/// trait; the placeholder keeps the pipeline and CLI runnable end to end.
#[derive(Debug, Default)]
pub struct LopdfWorker {
    state: Mutex<WorkerState>,
}

impl LopdfWorker {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, DecodeError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(DecodeError::PasswordProtected);
        }

        let doc = Document::load_mem(bytes).map_err(|_| DecodeError::Corrupted)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id).map_err(|_| DecodeError::Corrupted)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                })
                .unwrap_or(PageSize { width_pt: 612.0, height_pt: 792.0 });

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(DecodeError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }
}

impl DecodeWorker for LopdfWorker {
    fn load_document(&self, bytes: &[u8]) -> Result<DocumentHandle, DecodeError> {
        let page_sizes = Self::parse_sizes(bytes)?;

        let mut state = self.state.lock().unwrap();
        state.next_handle += 1;
        let handle = DocumentHandle(state.next_handle);
        log::debug!("loaded document {} ({} pages)", handle.raw(), page_sizes.len());
        state.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, DecodeError> {
        let state = self.state.lock().unwrap();
        let record =
            state.docs.get(&handle).ok_or(DecodeError::InvalidHandle(handle.raw()))?;
        Ok(record.page_sizes.len() as u32)
    }

    fn decode_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target_width: u32,
        rotation: Rotation,
        scale: f32,
    ) -> Result<Bitmap, DecodeError> {
        // Holding the lock for the whole decode is what serializes demand
        // on the single shared worker.
        let state = self.state.lock().unwrap();
        let record =
            state.docs.get(&handle).ok_or(DecodeError::InvalidHandle(handle.raw()))?;
        let size = record.page_sizes.get(page_index as usize).copied().ok_or(
            DecodeError::PageOutOfRange {
                page: page_index,
                page_count: record.page_sizes.len() as u32,
            },
        )?;

        let scale = if scale <= 0.0 { 1.0 } else { scale };
        let (width_pt, height_pt) = if rotation.is_sideways() {
            (size.height_pt, size.width_pt)
        } else {
            (size.width_pt, size.height_pt)
        };
        let aspect = height_pt / width_pt.max(1.0);

        let width = (target_width as f32 * scale).round().max(1.0) as u32;
        let height = (width as f32 * aspect).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(Bitmap::new(width, height, image.into_raw()))
    }

    fn close_document(&self, handle: DocumentHandle) -> Result<(), DecodeError> {
        let mut state = self.state.lock().unwrap();
        state
            .docs
            .remove(&handle)
            .map(|_| ())
            .ok_or(DecodeError::InvalidHandle(handle.raw()))
    }
}
