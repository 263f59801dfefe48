//! Page accounting shared between caches.
//!
//! A [`PagePool`] does no allocation itself; it is a budget. Several
//! [`CacheStorage`](super::CacheStorage) instances (one per open table)
//! can share one pool so that their combined footprint stays bounded,
//! while each cache keeps ownership of its own page buffers and decides
//! locally which of them to evict when the pool runs dry.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::constants::DEFAULT_PAGE_SIZE;

/// The pool is exhausted and no resident page may be evicted.
///
/// Raised when every page the owning cache holds is dirty and
/// auto-commit of evicted pages is disabled. The caller can flush, grow
/// the pool, or enable auto-commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoPageAvailableError {
    pub max_page_count: usize,
}

impl fmt::Display for NoPageAvailableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page pool exhausted ({} pages) and no resident page is evictable",
            self.max_page_count
        )
    }
}

impl std::error::Error for NoPageAvailableError {}

#[derive(Debug, Default)]
struct Counters {
    allocated: usize,
    peak: usize,
}

/// Shared page budget.
#[derive(Debug)]
pub struct PagePool {
    page_size: usize,
    max_page_count: usize,
    counters: Mutex<Counters>,
}

impl Default for PagePool {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PagePool {
    /// An unbounded pool: reservations always succeed.
    pub fn new(page_size: usize) -> Self {
        Self::bounded(page_size, usize::MAX)
    }

    /// A pool capped at `max_page_count` concurrently reserved pages.
    pub fn bounded(page_size: usize, max_page_count: usize) -> Self {
        assert!(page_size > 0, "page size must be non-zero");
        Self {
            page_size,
            max_page_count,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn max_page_count(&self) -> usize {
        self.max_page_count
    }

    /// Pages currently reserved across all caches using this pool.
    pub fn allocated_pages(&self) -> usize {
        self.counters.lock().allocated
    }

    /// High-water mark of reserved pages.
    pub fn peak_pages(&self) -> usize {
        self.counters.lock().peak
    }

    /// Tries to reserve one page, returning `false` at the cap.
    pub(crate) fn try_reserve(&self) -> bool {
        let mut counters = self.counters.lock();
        if counters.allocated >= self.max_page_count {
            return false;
        }
        counters.allocated += 1;
        counters.peak = counters.peak.max(counters.allocated);
        true
    }

    /// Returns `count` reservations to the pool.
    pub(crate) fn release(&self, count: usize) {
        let mut counters = self.counters.lock();
        debug_assert!(counters.allocated >= count, "pool release underflow");
        counters.allocated = counters.allocated.saturating_sub(count);
    }
}

/// A resident page buffer plus its dirty-range bookkeeping.
///
/// The dirty range is the union of all writes since the last flush,
/// tracked as a single `[written_start, written_end)` span. A clean page
/// has `written_start == page_size` and `written_end == 0`, so the first
/// write always narrows the start and widens the end.
#[derive(Debug)]
pub(crate) struct Page {
    buf: Box<[u8]>,
    written_start: usize,
    written_end: usize,
    /// Whether the owning cache may drop this page to satisfy the pool.
    pub can_evict: bool,
}

impl Page {
    pub fn new(page_size: usize) -> Self {
        Self {
            buf: vec![0u8; page_size].into_boxed_slice(),
            written_start: page_size,
            written_end: 0,
            can_evict: false,
        }
    }

    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn dirty(&self) -> bool {
        self.written_end > 0
    }

    pub fn dirty_range(&self) -> Option<(usize, usize)> {
        self.dirty().then_some((self.written_start, self.written_end))
    }

    pub fn record_write(&mut self, start: usize, end: usize) {
        debug_assert!(start < end && end <= self.buf.len());
        self.written_start = self.written_start.min(start);
        self.written_end = self.written_end.max(end);
    }

    pub fn reset_dirty(&mut self) {
        self.written_start = self.buf.len();
        self.written_end = 0;
    }

    /// Clips the dirty range to the first `len` bytes, used when the
    /// storage shrinks into the middle of this page.
    pub fn clip_dirty(&mut self, len: usize) {
        if self.written_end > len {
            self.written_end = len;
        }
        if self.written_start >= self.written_end {
            self.reset_dirty();
        }
    }
}
